//! Error types for the tightfit domain.
//!
//! Each bounded context has its own `thiserror` enum. Callers that cross
//! contexts box the error.

use thiserror::Error;

/// Failure of a single encoder invocation.
///
/// Only `Unavailable` and `Cancelled` stop the candidate loop; the other
/// variants skip the current candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Encoder '{encoder}' unavailable: {reason}")]
    Unavailable { encoder: String, reason: String },

    #[error("Candidate '{candidate}' failed: {reason}")]
    CandidateFailed { candidate: String, reason: String },

    #[error("Candidate '{candidate}' timed out after {timeout_secs}s")]
    TimedOut { candidate: String, timeout_secs: u64 },

    #[error("Encoding cancelled")]
    Cancelled,
}

impl EncodeError {
    /// Whether this failure should stop the remaining candidate sequence.
    pub fn aborts_selection(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Cancelled)
    }

    pub fn candidate_failed(candidate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CandidateFailed {
            candidate: candidate.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(encoder: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            encoder: encoder.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the orchestrator to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressError {
    #[error("Unsupported file type: {mime_type}")]
    UnsupportedMediaKind { mime_type: String },

    #[error("Invalid size policy: {0}")]
    InvalidPolicy(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session storage error: {0}")]
    Storage(String),
}
