//! Ghostscript `pdfwrite` adapter.
//!
//! Each run writes the input into a fresh scratch directory, spawns `gs` with
//! the preset and resolution from the descriptor, and reads the result back.
//! Staging, the process and the read-back share one deadline, raced against
//! the cancel token. The child is killed when the wait is abandoned.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use tightfit_config::EncoderConfig;
use tightfit_core::{
    CancelToken, CandidateDescriptor, CandidateParams, CandidateResult, EncodeError, Encoder,
    PresetProfile,
};

use crate::output::accept_output;
use crate::scratch::ScratchSpace;
use crate::structural::PDF_MIME;

/// Longest stderr excerpt carried in a failure reason.
const STDERR_EXCERPT_CHARS: usize = 300;

const MAX_MONO_DPI: u32 = 1200;

pub struct GhostscriptEncoder {
    program: String,
    timeout: Duration,
    corruption_floor: u64,
    scratch_root: PathBuf,
}

impl GhostscriptEncoder {
    pub fn new(
        program: impl Into<String>,
        timeout: Duration,
        corruption_floor: u64,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            timeout,
            corruption_floor,
            scratch_root: scratch_root.into(),
        }
    }

    pub fn from_config(config: &EncoderConfig) -> Self {
        Self::new(
            config.ghostscript_path.clone(),
            Duration::from_secs(config.timeout_secs),
            config.corruption_floor_bytes,
            config.scratch_dir.clone(),
        )
    }

    /// Run `gs --version`, returning the trimmed version string.
    pub async fn probe_version(&self) -> Result<String, EncodeError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--version").stdin(Stdio::null()).kill_on_drop(true);

        let output = match tokio::time::timeout(Duration::from_secs(10), cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(EncodeError::unavailable("ghostscript", e.to_string())),
            Err(_) => {
                return Err(EncodeError::unavailable(
                    "ghostscript",
                    "--version did not answer within 10s",
                ));
            }
        };

        if !output.status.success() {
            return Err(EncodeError::unavailable(
                "ghostscript",
                format!("--version exited with {}", output.status),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run(
        &self,
        input: &[u8],
        descriptor: &CandidateDescriptor,
        preset: PresetProfile,
        dpi: u32,
        auto_rotate: bool,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, EncodeError> {
        let scratch = ScratchSpace::create(&self.scratch_root).map_err(|e| {
            EncodeError::unavailable(
                "ghostscript",
                format!("scratch directory {}: {e}", self.scratch_root.display()),
            )
        })?;

        // Dropping the convert future drops the child, which kills it.
        let converted = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(candidate = %descriptor.name, "Ghostscript run cancelled");
                return Err(EncodeError::Cancelled);
            }
            converted = tokio::time::timeout(
                self.timeout,
                self.convert(&scratch, input, descriptor, preset, dpi, auto_rotate),
            ) => converted,
        };

        converted.unwrap_or_else(|_| {
            warn!(
                candidate = %descriptor.name,
                timeout_secs = self.timeout.as_secs(),
                "Ghostscript run timed out"
            );
            Err(EncodeError::TimedOut {
                candidate: descriptor.name.clone(),
                timeout_secs: self.timeout.as_secs(),
            })
        })
    }

    /// Stage, run and read back one candidate inside `scratch`.
    async fn convert(
        &self,
        scratch: &ScratchSpace,
        input: &[u8],
        descriptor: &CandidateDescriptor,
        preset: PresetProfile,
        dpi: u32,
        auto_rotate: bool,
    ) -> Result<Vec<u8>, EncodeError> {
        let input_path = scratch.file("input.pdf");
        let output_path = scratch.file("output.pdf");

        tokio::fs::write(&input_path, input).await.map_err(|e| {
            EncodeError::candidate_failed(&descriptor.name, format!("failed to stage input: {e}"))
        })?;

        let args = ghostscript_args(preset, dpi, auto_rotate, &input_path, &output_path);
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    EncodeError::unavailable("ghostscript", format!("{}: {e}", self.program))
                }
                _ => EncodeError::candidate_failed(&descriptor.name, format!("spawn failed: {e}")),
            })?;

        let output = child.wait_with_output().await.map_err(|e| {
            EncodeError::candidate_failed(&descriptor.name, format!("wait failed: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EncodeError::candidate_failed(
                &descriptor.name,
                format!("{} {}", output.status, stderr_excerpt(&stderr)),
            ));
        }

        tokio::fs::read(&output_path).await.map_err(|e| {
            EncodeError::candidate_failed(&descriptor.name, format!("no output file: {e}"))
        })
    }
}

#[async_trait]
impl Encoder for GhostscriptEncoder {
    fn name(&self) -> &str {
        "ghostscript"
    }

    async fn invoke(
        &self,
        input: &[u8],
        descriptor: &CandidateDescriptor,
        cancel: &CancelToken,
    ) -> CandidateResult {
        let &CandidateParams::Document {
            preset,
            image_resolution_dpi,
            auto_rotate,
        } = &descriptor.params
        else {
            return CandidateResult::failure(
                descriptor.clone(),
                EncodeError::candidate_failed(&descriptor.name, "not a document candidate"),
            );
        };

        if cancel.is_cancelled() {
            return CandidateResult::failure(descriptor.clone(), EncodeError::Cancelled);
        }

        match self
            .run(input, descriptor, preset, image_resolution_dpi, auto_rotate, cancel)
            .await
        {
            Ok(bytes) => {
                debug!(
                    candidate = %descriptor.name,
                    preset = preset.as_str(),
                    dpi = image_resolution_dpi,
                    size_bytes = bytes.len(),
                    "Ghostscript candidate encoded"
                );
                accept_output(descriptor, bytes, PDF_MIME, "pdf", self.corruption_floor)
            }
            Err(e) => CandidateResult::failure(descriptor.clone(), e),
        }
    }
}

/// The full `gs` argument list for one candidate.
pub fn ghostscript_args(
    preset: PresetProfile,
    dpi: u32,
    auto_rotate: bool,
    input: &Path,
    output: &Path,
) -> Vec<String> {
    let mono_dpi = dpi.saturating_mul(2).min(MAX_MONO_DPI);
    let rotate = if auto_rotate { "/PageByPage" } else { "/None" };
    vec![
        "-sDEVICE=pdfwrite".into(),
        "-dCompatibilityLevel=1.4".into(),
        format!("-dPDFSETTINGS=/{}", preset.as_str()),
        "-dDownsampleColorImages=true".into(),
        "-dDownsampleGrayImages=true".into(),
        "-dDownsampleMonoImages=true".into(),
        format!("-dColorImageResolution={dpi}"),
        format!("-dGrayImageResolution={dpi}"),
        format!("-dMonoImageResolution={mono_dpi}"),
        format!("-dAutoRotatePages={rotate}"),
        "-dNOPAUSE".into(),
        "-dQUIET".into(),
        "-dBATCH".into(),
        format!("-sOutputFile={}", output.display()),
        input.display().to_string(),
    ]
}

fn stderr_excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let tail: String = trimmed.chars().skip(count - STDERR_EXCERPT_CHARS).collect();
    format!("...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_carry_preset_and_resolutions() {
        let args = ghostscript_args(
            PresetProfile::Ebook,
            120,
            false,
            Path::new("/s/input.pdf"),
            Path::new("/s/output.pdf"),
        );
        assert_eq!(args[0], "-sDEVICE=pdfwrite");
        assert!(args.contains(&"-dPDFSETTINGS=/ebook".to_string()));
        assert!(args.contains(&"-dColorImageResolution=120".to_string()));
        assert!(args.contains(&"-dGrayImageResolution=120".to_string()));
        assert!(args.contains(&"-dMonoImageResolution=240".to_string()));
        assert!(args.contains(&"-dAutoRotatePages=/None".to_string()));
        assert!(args.contains(&"-sOutputFile=/s/output.pdf".to_string()));
        assert_eq!(args.last().unwrap(), "/s/input.pdf");
    }

    #[test]
    fn mono_resolution_is_capped() {
        let args = ghostscript_args(
            PresetProfile::Prepress,
            700,
            true,
            Path::new("i"),
            Path::new("o"),
        );
        assert!(args.contains(&"-dMonoImageResolution=1200".to_string()));
        assert!(args.contains(&"-dAutoRotatePages=/PageByPage".to_string()));
    }

    #[test]
    fn stderr_excerpt_keeps_tail() {
        let long = "e".repeat(1000) + "TAIL";
        let excerpt = stderr_excerpt(&long);
        assert!(excerpt.starts_with("..."));
        assert!(excerpt.ends_with("TAIL"));
        assert_eq!(excerpt.chars().count(), STDERR_EXCERPT_CHARS + 3);
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let root = tempfile::tempdir().unwrap();
        let gs = GhostscriptEncoder::new(
            "/nonexistent/tightfit-gs",
            Duration::from_secs(5),
            512,
            root.path(),
        );
        let d = CandidateDescriptor::new(
            "printer-200",
            CandidateParams::Document {
                preset: PresetProfile::Printer,
                image_resolution_dpi: 200,
                auto_rotate: false,
            },
            1,
        );
        let result = gs.invoke(b"%PDF-1.4", &d, &CancelToken::never()).await;
        let err = result.error().expect("should fail");
        assert!(err.aborts_selection());
        // Scratch directories are gone even on failure.
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn staging_counts_against_the_deadline() {
        let root = tempfile::tempdir().unwrap();
        // The deadline lapses while the input is still being written, before
        // any attempt to spawn the missing binary.
        let gs = GhostscriptEncoder::new(
            "/nonexistent/tightfit-gs",
            Duration::from_millis(1),
            512,
            root.path(),
        );
        let d = CandidateDescriptor::new(
            "ebook-150",
            CandidateParams::Document {
                preset: PresetProfile::Ebook,
                image_resolution_dpi: 150,
                auto_rotate: false,
            },
            2,
        );
        let input = vec![b'%'; 64 * 1024 * 1024];
        let result = gs.invoke(&input, &d, &CancelToken::never()).await;
        assert!(matches!(
            result.error(),
            Some(EncodeError::TimedOut { candidate, .. }) if candidate == "ebook-150"
        ));
    }

    #[tokio::test]
    async fn probe_reports_missing_binary() {
        let gs = GhostscriptEncoder::new("/nonexistent/tightfit-gs", Duration::from_secs(1), 512, "/tmp");
        assert!(gs.probe_version().await.is_err());
    }
}
