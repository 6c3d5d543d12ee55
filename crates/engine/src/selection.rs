//! Selection Engine: drive the encoder over a plan and keep the best result.
//!
//! Scoring:
//! - over `hard_max`: invalid, never selected
//! - inside `[ideal_min, ideal_max]`: `IDEAL_BONUS - (ideal_max - size)`
//! - valid but under `ideal_min`: `size`
//!
//! The first ideal candidate ends the loop. Plans are ordered best quality
//! first, so nothing later can beat it.

use tightfit_core::{
    Artifact, CancelToken, CandidateDescriptor, EncodeError, Encoder, SizeBand, SizePolicy,
};
use tracing::{debug, info, warn};

/// Added to every ideal score so it outranks any non-ideal one.
pub const IDEAL_BONUS: i64 = 1 << 40;

/// Score an output size. `None` means invalid.
pub fn score(size_bytes: u64, policy: &SizePolicy) -> Option<i64> {
    match policy.classify(size_bytes) {
        SizeBand::Oversized => None,
        SizeBand::Ideal => {
            let shortfall = policy.ideal_max().saturating_sub(size_bytes);
            Some(IDEAL_BONUS - saturating_i64(shortfall))
        }
        SizeBand::Acceptable => Some(saturating_i64(size_bytes)),
    }
}

fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// Why the candidate loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    IdealFound,
    Exhausted,
    EncoderUnavailable,
    Cancelled,
}

/// The winning candidate.
#[derive(Debug, Clone)]
pub struct Selected {
    pub descriptor: CandidateDescriptor,
    pub artifact: Artifact,
    pub score: i64,
}

#[derive(Debug, Clone)]
pub struct SelectionReport {
    pub best: Option<Selected>,
    /// Number of descriptors handed to the encoder.
    pub tried: usize,
    pub stop: StopReason,
}

impl SelectionReport {
    pub fn into_best_artifact(self) -> Option<Artifact> {
        self.best.map(|s| s.artifact)
    }
}

/// Sequential, per-request selection over one encoder.
pub struct SelectionEngine<'a> {
    encoder: &'a dyn Encoder,
}

impl<'a> SelectionEngine<'a> {
    pub fn new(encoder: &'a dyn Encoder) -> Self {
        Self { encoder }
    }

    pub async fn select<I>(
        &self,
        input: &[u8],
        candidates: I,
        policy: &SizePolicy,
        cancel: &CancelToken,
    ) -> SelectionReport
    where
        I: IntoIterator<Item = CandidateDescriptor>,
    {
        let mut best: Option<Selected> = None;
        let mut tried = 0usize;

        for descriptor in candidates {
            if cancel.is_cancelled() {
                return Self::finish(best, tried, StopReason::Cancelled);
            }

            tried += 1;
            let result = self.encoder.invoke(input, &descriptor, cancel).await;

            let artifact = match result.outcome {
                Ok(artifact) => artifact,
                Err(EncodeError::Cancelled) => {
                    return Self::finish(best, tried, StopReason::Cancelled);
                }
                Err(e @ EncodeError::Unavailable { .. }) => {
                    warn!(candidate = %descriptor.name, error = %e, "Encoder unavailable, stopping");
                    return Self::finish(best, tried, StopReason::EncoderUnavailable);
                }
                Err(e) => {
                    debug!(candidate = %descriptor.name, error = %e, "Candidate skipped");
                    continue;
                }
            };

            let size = artifact.size_bytes();
            let Some(candidate_score) = score(size, policy) else {
                debug!(
                    candidate = %descriptor.name,
                    size_bytes = size,
                    hard_max = policy.hard_max(),
                    "Candidate over ceiling"
                );
                continue;
            };

            let ideal = policy.is_ideal(size);
            debug!(
                candidate = %descriptor.name,
                size_bytes = size,
                score = candidate_score,
                ideal,
                "Candidate scored"
            );

            if best.as_ref().is_none_or(|b| candidate_score > b.score) {
                best = Some(Selected {
                    descriptor,
                    artifact,
                    score: candidate_score,
                });
            }

            if ideal {
                return Self::finish(best, tried, StopReason::IdealFound);
            }
        }

        Self::finish(best, tried, StopReason::Exhausted)
    }

    fn finish(best: Option<Selected>, tried: usize, stop: StopReason) -> SelectionReport {
        match &best {
            Some(b) => info!(
                winner = %b.descriptor.name,
                size_bytes = b.artifact.size_bytes(),
                tried,
                stop = ?stop,
                "Selection finished"
            ),
            None => info!(tried, stop = ?stop, "Selection finished without a valid candidate"),
        }
        SelectionReport { best, tried, stop }
    }
}
