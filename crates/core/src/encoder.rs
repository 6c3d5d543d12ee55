//! Encoder trait: the capability boundary around external codecs.
//!
//! The selection engine only knows how to call `invoke`, measure the output
//! and judge it. Real implementations live in `tightfit-encoders`; tests use
//! scripted fakes.

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::candidate::{CandidateDescriptor, CandidateResult};

/// Materializes one candidate from the input bytes.
///
/// Implementations must release any temporary storage on every exit path and
/// report failures through `CandidateResult::outcome` rather than panicking.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Short name used in logs (e.g., "ghostscript", "image").
    fn name(&self) -> &str;

    /// Apply `descriptor` to `input`.
    async fn invoke(
        &self,
        input: &[u8],
        descriptor: &CandidateDescriptor,
        cancel: &CancelToken,
    ) -> CandidateResult;
}
