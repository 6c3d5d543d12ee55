//! Library-only PDF optimisation.
//!
//! Drops unreachable objects and empty streams, renumbers, Flate-compresses
//! every stream and re-serialises. Images are left untouched, so the result is
//! lossless and is usually the best candidate when it already fits.

use std::time::Duration;

use async_trait::async_trait;
use lopdf::Document;
use tracing::debug;

use tightfit_core::{
    CancelToken, CandidateDescriptor, CandidateParams, CandidateResult, EncodeError, Encoder,
};

use crate::blocking::run_bounded;
use crate::output::accept_output;

pub const PDF_MIME: &str = "application/pdf";

pub struct StructuralOptimizer {
    corruption_floor: u64,
    timeout: Duration,
}

impl StructuralOptimizer {
    pub fn new(corruption_floor: u64, timeout: Duration) -> Self {
        Self {
            corruption_floor,
            timeout,
        }
    }
}

#[async_trait]
impl Encoder for StructuralOptimizer {
    fn name(&self) -> &str {
        "structural"
    }

    async fn invoke(
        &self,
        input: &[u8],
        descriptor: &CandidateDescriptor,
        cancel: &CancelToken,
    ) -> CandidateResult {
        if !matches!(descriptor.params, CandidateParams::Structural) {
            return CandidateResult::failure(
                descriptor.clone(),
                EncodeError::candidate_failed(&descriptor.name, "not a structural candidate"),
            );
        }

        if cancel.is_cancelled() {
            return CandidateResult::failure(descriptor.clone(), EncodeError::Cancelled);
        }

        let data = input.to_vec();
        let outcome = run_bounded(&descriptor.name, self.timeout, cancel, move || optimize(&data)).await;

        match outcome {
            Ok(Ok(bytes)) => {
                debug!(
                    candidate = %descriptor.name,
                    input_bytes = input.len(),
                    size_bytes = bytes.len(),
                    "Structural rewrite complete"
                );
                accept_output(descriptor, bytes, PDF_MIME, "pdf", self.corruption_floor)
            }
            Ok(Err(reason)) => CandidateResult::failure(
                descriptor.clone(),
                EncodeError::candidate_failed(&descriptor.name, reason),
            ),
            Err(e) => CandidateResult::failure(descriptor.clone(), e),
        }
    }
}

fn optimize(input: &[u8]) -> Result<Vec<u8>, String> {
    let mut doc = Document::load_mem(input).map_err(|e| format!("failed to parse PDF: {e}"))?;

    let pruned = doc.prune_objects();
    let empty = doc.delete_zero_length_streams();
    doc.renumber_objects();
    doc.compress();

    let mut out = Vec::with_capacity(input.len());
    doc.save_to(&mut out)
        .map_err(|e| format!("failed to write PDF: {e}"))?;

    tracing::trace!(
        pruned = pruned.len(),
        empty_streams = empty.len(),
        "Structural pass"
    );
    Ok(out)
}
