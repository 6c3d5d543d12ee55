//! The production encoder: one entry point, three codecs behind it.

use std::time::Duration;

use async_trait::async_trait;

use tightfit_config::AppConfig;
use tightfit_core::{CancelToken, CandidateDescriptor, CandidateParams, CandidateResult, Encoder};

use crate::ghostscript::GhostscriptEncoder;
use crate::raster::ImageCodec;
use crate::structural::StructuralOptimizer;

/// Routes each descriptor to the codec its parameters name.
pub struct CodecRouter {
    image: ImageCodec,
    structural: StructuralOptimizer,
    ghostscript: GhostscriptEncoder,
}

impl CodecRouter {
    pub fn new(
        image: ImageCodec,
        structural: StructuralOptimizer,
        ghostscript: GhostscriptEncoder,
    ) -> Self {
        Self {
            image,
            structural,
            ghostscript,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let floor = config.encoder.corruption_floor_bytes;
        let timeout = Duration::from_secs(config.encoder.timeout_secs);
        Self::new(
            ImageCodec::new(floor, timeout),
            StructuralOptimizer::new(floor, timeout),
            GhostscriptEncoder::from_config(&config.encoder),
        )
    }

    pub fn ghostscript(&self) -> &GhostscriptEncoder {
        &self.ghostscript
    }
}

#[async_trait]
impl Encoder for CodecRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn invoke(
        &self,
        input: &[u8],
        descriptor: &CandidateDescriptor,
        cancel: &CancelToken,
    ) -> CandidateResult {
        let encoder: &dyn Encoder = match descriptor.params {
            CandidateParams::Image { .. } => &self.image,
            CandidateParams::Structural => &self.structural,
            CandidateParams::Document { .. } => &self.ghostscript,
        };
        tracing::trace!(candidate = %descriptor.name, encoder = encoder.name(), "Dispatching candidate");
        encoder.invoke(input, descriptor, cancel).await
    }
}
