//! Orchestrator: the single entry point for a compression request.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{info, warn};

use tightfit_config::{AppConfig, ConfigError};
use tightfit_core::artifact::derive_filename;
use tightfit_core::{
    Artifact, CancelToken, CompressError, CompressionRequest, Encoder, MediaKind, SizePolicy,
};

use crate::fallback::{FallbackChain, FallbackReason};
use crate::generator::CandidateGenerator;
use crate::selection::{SelectionEngine, StopReason};

/// Suffix added to the original stem of every re-encoded artifact.
pub const COMPRESSED_SUFFIX: &str = "_compressed";

pub struct Compressor {
    policy: SizePolicy,
    generator: CandidateGenerator,
    encoder: Arc<dyn Encoder>,
    fallback: FallbackChain,
}

impl Compressor {
    pub fn new(policy: SizePolicy, generator: CandidateGenerator, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            fallback: FallbackChain::new(&policy),
            policy,
            generator,
            encoder,
        }
    }

    pub fn from_config(config: &AppConfig, encoder: Arc<dyn Encoder>) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.size_policy()?,
            CandidateGenerator::from_config(config),
            encoder,
        ))
    }

    pub fn policy(&self) -> &SizePolicy {
        &self.policy
    }

    pub async fn compress(&self, request: &CompressionRequest) -> Result<Artifact, CompressError> {
        self.compress_with_cancel(request, &CancelToken::never()).await
    }

    /// Compress `request`, returning an artifact within the hard ceiling.
    ///
    /// Inputs already within the ceiling come back byte-identical. Only an
    /// unsupported media kind is an error; every other failure resolves to a
    /// fallback placeholder.
    pub async fn compress_with_cancel(
        &self,
        request: &CompressionRequest,
        cancel: &CancelToken,
    ) -> Result<Artifact, CompressError> {
        let input_size = request.size_bytes();

        if self.policy.is_valid(input_size) {
            info!(
                filename = %request.filename,
                size_bytes = input_size,
                "Input already within limit, returning unchanged"
            );
            return Ok(request.to_artifact());
        }

        let kind = MediaKind::classify(&request.mime_type).ok_or_else(|| {
            CompressError::UnsupportedMediaKind {
                mime_type: request.mime_type.clone(),
            }
        })?;

        info!(
            filename = %request.filename,
            kind = %kind,
            size_bytes = input_size,
            hard_max = self.policy.hard_max(),
            "Compressing"
        );

        let guarded = AssertUnwindSafe(self.dispatch(request, kind, cancel))
            .catch_unwind()
            .await;

        Ok(match guarded {
            Ok(artifact) => artifact,
            Err(panic) => {
                let msg = panic_message(&*panic);
                warn!(filename = %request.filename, panic = %msg, "Compression panicked");
                self.fallback.fallback(request, &FallbackReason::Internal(msg))
            }
        })
    }

    async fn dispatch(
        &self,
        request: &CompressionRequest,
        kind: MediaKind,
        cancel: &CancelToken,
    ) -> Artifact {
        let plan = self.generator.generate(kind, &self.policy, request.size_bytes());
        let engine = SelectionEngine::new(self.encoder.as_ref());
        let report = engine
            .select(&request.input_bytes, plan, &self.policy, cancel)
            .await;

        let stop = report.stop;
        match report.into_best_artifact() {
            // Re-checked here so a misbehaving selection can never leak an oversized file.
            Some(best) if self.policy.is_valid(best.size_bytes()) => {
                let ext = extension_of(best.suggested_filename(), kind);
                let name = derive_filename(&request.filename, COMPRESSED_SUFFIX, ext);
                info!(
                    filename = %name,
                    size_bytes = best.size_bytes(),
                    input_bytes = request.size_bytes(),
                    "Compression succeeded"
                );
                best.renamed(name)
            }
            Some(best) => {
                warn!(size_bytes = best.size_bytes(), "Selected artifact over ceiling, discarding");
                self.fallback
                    .fallback(request, &FallbackReason::Internal("selected artifact over ceiling".into()))
            }
            None => self.fallback.fallback(request, &fallback_reason(stop)),
        }
    }
}

fn fallback_reason(stop: StopReason) -> FallbackReason {
    match stop {
        StopReason::EncoderUnavailable => FallbackReason::EncoderUnavailable,
        StopReason::Cancelled => FallbackReason::Cancelled,
        StopReason::Exhausted | StopReason::IdealFound => FallbackReason::AllCandidatesExhausted,
    }
}

fn extension_of(filename: &str, kind: MediaKind) -> &str {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => match kind {
            MediaKind::Image => "jpg",
            MediaKind::Document => "pdf",
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
