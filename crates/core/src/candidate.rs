//! Candidate descriptors: one parameter set to try against the input.
//!
//! Descriptors are generated fresh per request and never mutated. Lower
//! `priority` values are tried first and correspond to higher quality.

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::error::EncodeError;

/// The broad kind of an input artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Document,
}

impl MediaKind {
    /// Classify a MIME type. Parameters (`; charset=...`) and case are ignored.
    pub fn classify(mime_type: &str) -> Option<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == "application/pdf" {
            Some(Self::Document)
        } else if essence.starts_with("image/") && essence.len() > "image/".len() {
            Some(Self::Image)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Document => write!(f, "document"),
        }
    }
}

/// Ghostscript `-dPDFSETTINGS` presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetProfile {
    Prepress,
    Printer,
    Ebook,
    Screen,
}

impl PresetProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepress => "prepress",
            Self::Printer => "printer",
            Self::Ebook => "ebook",
            Self::Screen => "screen",
        }
    }
}

/// The parameter bag carried by a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "codec", rename_all = "snake_case")]
pub enum CandidateParams {
    /// Lossy raster re-encode.
    Image {
        /// Encoder quality, 1–100.
        quality: u8,
        /// Linear scale factor in `(0, 1]`; `None` keeps the dimensions.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        downscale_factor: Option<f32>,
    },
    /// Library-only document rewrite, no resampling.
    Structural,
    /// External document codec run.
    Document {
        preset: PresetProfile,
        image_resolution_dpi: u32,
        auto_rotate: bool,
    },
}

impl CandidateParams {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            Self::Image { .. } => MediaKind::Image,
            Self::Structural | Self::Document { .. } => MediaKind::Document,
        }
    }
}

/// One attempted re-encoding recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDescriptor {
    pub name: String,
    pub params: CandidateParams,
    /// Ascending = tried first.
    pub priority: u32,
}

impl CandidateDescriptor {
    pub fn new(name: impl Into<String>, params: CandidateParams, priority: u32) -> Self {
        Self {
            name: name.into(),
            params,
            priority,
        }
    }
}

/// The outcome of applying one descriptor to the input.
///
/// Exactly one of artifact / error exists, by construction.
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub descriptor: CandidateDescriptor,
    pub outcome: Result<Artifact, EncodeError>,
}

impl CandidateResult {
    pub fn success(descriptor: CandidateDescriptor, artifact: Artifact) -> Self {
        Self {
            descriptor,
            outcome: Ok(artifact),
        }
    }

    pub fn failure(descriptor: CandidateDescriptor, error: EncodeError) -> Self {
        Self {
            descriptor,
            outcome: Err(error),
        }
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&EncodeError> {
        self.outcome.as_ref().err()
    }
}
