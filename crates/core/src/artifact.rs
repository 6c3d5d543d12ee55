//! Artifacts and compression requests.
//!
//! An `Artifact` is a finished payload ready for delivery. It is immutable
//! once built: renaming produces a new value.

use serde::{Deserialize, Serialize};

/// A finished byte payload plus its declared media type and filename.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    bytes: Vec<u8>,
    mime_type: String,
    suggested_filename: String,
}

impl Artifact {
    pub fn new(
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
        suggested_filename: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            suggested_filename: suggested_filename.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn suggested_filename(&self) -> &str {
        &self.suggested_filename
    }

    /// Consume the artifact, yielding its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Same payload under a different filename.
    pub fn renamed(self, suggested_filename: impl Into<String>) -> Self {
        Self {
            suggested_filename: suggested_filename.into(),
            ..self
        }
    }
}

// Payloads are large; keep Debug output to the metadata.
impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("size_bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("suggested_filename", &self.suggested_filename)
            .finish()
    }
}

/// Read-only input to the orchestrator.
#[derive(Clone, PartialEq, Eq)]
pub struct CompressionRequest {
    pub input_bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

impl CompressionRequest {
    pub fn new(
        input_bytes: Vec<u8>,
        mime_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            input_bytes,
            mime_type: mime_type.into(),
            filename: filename.into(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.input_bytes.len() as u64
    }

    /// Wrap the untouched input as an artifact.
    pub fn to_artifact(&self) -> Artifact {
        Artifact::new(
            self.input_bytes.clone(),
            self.mime_type.clone(),
            self.filename.clone(),
        )
    }
}

impl std::fmt::Debug for CompressionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionRequest")
            .field("size_bytes", &self.input_bytes.len())
            .field("mime_type", &self.mime_type)
            .field("filename", &self.filename)
            .finish()
    }
}

/// Build `<stem><suffix>.<extension>` from an original filename.
///
/// `"scan.final.pdf"` with suffix `_compressed` and extension `pdf` becomes
/// `"scan.final_compressed.pdf"`. Empty names fall back to `file`.
pub fn derive_filename(original: &str, suffix: &str, extension: &str) -> String {
    let stem = file_stem(original);
    format!("{stem}{suffix}.{extension}")
}

/// The filename without directories and without its last extension.
pub fn file_stem(original: &str) -> &str {
    let base = original
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(original)
        .trim();
    let stem = match base.rfind('.') {
        Some(0) | None => base,
        Some(idx) => &base[..idx],
    };
    if stem.is_empty() { "file" } else { stem }
}

/// Guess a MIME type from a filename's extension.
pub fn guess_mime_type(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    let mime = match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "txt" => "text/plain",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(mime)
}
