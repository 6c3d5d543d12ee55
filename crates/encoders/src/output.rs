//! Output acceptance shared by every adapter.

use tightfit_core::{Artifact, CandidateDescriptor, CandidateResult, EncodeError};

/// Wrap raw codec output as a candidate result.
///
/// Empty output, or output under `corruption_floor` bytes, is a failed
/// candidate: real encoders never legitimately produce payloads that small.
pub fn accept_output(
    descriptor: &CandidateDescriptor,
    bytes: Vec<u8>,
    mime_type: &str,
    extension: &str,
    corruption_floor: u64,
) -> CandidateResult {
    let size = bytes.len() as u64;
    if size == 0 || size < corruption_floor {
        return CandidateResult::failure(
            descriptor.clone(),
            EncodeError::candidate_failed(
                &descriptor.name,
                format!("output too small ({size} bytes, floor {corruption_floor})"),
            ),
        );
    }

    let filename = format!("{}.{extension}", descriptor.name);
    CandidateResult::success(descriptor.clone(), Artifact::new(bytes, mime_type, filename))
}
