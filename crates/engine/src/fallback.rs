//! Fallback Chain: the guaranteed-compliant substitute.
//!
//! Tier 1 is a plain-text summary of the file that could not be compressed,
//! delivered in its place. Tier 2 is a one-line error note, used only when
//! tier 1 cannot be built within budget. Both stay below `ideal_min`.

use chrono::{DateTime, Utc};
use tightfit_core::artifact::derive_filename;
use tightfit_core::{Artifact, CompressionRequest, SizePolicy};

/// Upper bound on any fallback payload, independent of the policy.
const MAX_PLACEHOLDER_BYTES: u64 = 64 * 1024;

const TIER2_MAX_BYTES: usize = 256;
const FILENAME_MAX_CHARS: usize = 120;
const MIME_MAX_CHARS: usize = 80;
const REASON_MAX_CHARS: usize = 200;

pub const SUMMARY_MIME: &str = "text/plain; charset=utf-8";
pub const FAILURE_FILENAME: &str = "compression_failed.txt";

/// Why the fallback chain was engaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    AllCandidatesExhausted,
    EncoderUnavailable,
    Cancelled,
    Internal(String),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllCandidatesExhausted => {
                write!(f, "no compression setting produced a file under the size limit")
            }
            Self::EncoderUnavailable => write!(f, "the compression tool is not available"),
            Self::Cancelled => write!(f, "compression was cancelled"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("summary is {size} bytes, budget is {budget}")]
    OverBudget { size: u64, budget: u64 },
}

#[derive(Debug, Clone)]
pub struct FallbackChain {
    hard_max: u64,
    /// Strictly below `ideal_min`.
    budget: u64,
}

impl FallbackChain {
    pub fn new(policy: &SizePolicy) -> Self {
        Self {
            hard_max: policy.hard_max(),
            budget: policy.ideal_min().saturating_sub(1).min(MAX_PLACEHOLDER_BYTES),
        }
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Always returns an artifact no larger than the budget.
    pub fn fallback(&self, request: &CompressionRequest, reason: &FallbackReason) -> Artifact {
        self.fallback_at(request, reason, Utc::now())
    }

    pub fn fallback_at(
        &self,
        request: &CompressionRequest,
        reason: &FallbackReason,
        now: DateTime<Utc>,
    ) -> Artifact {
        match self.summary(request, reason, now) {
            Ok(artifact) => {
                tracing::info!(
                    filename = %request.filename,
                    reason = %reason,
                    size_bytes = artifact.size_bytes(),
                    "Delivering summary placeholder"
                );
                artifact
            }
            Err(e) => {
                tracing::warn!(error = %e, "Summary placeholder failed, using minimal note");
                self.minimal(reason)
            }
        }
    }

    /// Tier 1.
    pub fn summary(
        &self,
        request: &CompressionRequest,
        reason: &FallbackReason,
        now: DateTime<Utc>,
    ) -> Result<Artifact, FallbackError> {
        let filename = if request.filename.trim().is_empty() {
            "Unknown".to_string()
        } else {
            truncate_chars(&request.filename, FILENAME_MAX_CHARS)
        };

        let text = format!(
            "FILE TOO LARGE - SUMMARY DOCUMENT\n\
             \n\
             Original File: {filename}\n\
             Original Size: {size}\n\
             File Type: {mime}\n\
             Date: {date}\n\
             Reason: {reason}\n\
             \n\
             This file could not be compressed to {limit}.\n\
             \n\
             Options to access the full file:\n\
             1. Use a file compression app before sending\n\
             2. Upload it to cloud storage and share the link\n\
             3. Split the file into smaller parts\n\
             4. Reduce quality or resolution before sending\n",
            size = format_mb(request.size_bytes()),
            mime = truncate_chars(&request.mime_type, MIME_MAX_CHARS),
            date = now.format("%Y-%m-%d %H:%M UTC"),
            reason = truncate_chars(&reason.to_string(), REASON_MAX_CHARS),
            limit = format_mb(self.hard_max),
        );

        let size = text.len() as u64;
        if size > self.budget {
            return Err(FallbackError::OverBudget {
                size,
                budget: self.budget,
            });
        }

        Ok(Artifact::new(
            text.into_bytes(),
            SUMMARY_MIME,
            derive_filename(&request.filename, "_SUMMARY", "txt"),
        ))
    }

    /// Tier 2. Pure truncation, cannot fail.
    pub fn minimal(&self, reason: &FallbackReason) -> Artifact {
        let cap = usize::try_from(self.budget)
            .unwrap_or(TIER2_MAX_BYTES)
            .min(TIER2_MAX_BYTES);
        let text = truncate_bytes(&format!("Compression failed: {reason}\n"), cap);
        Artifact::new(text.into_bytes(), SUMMARY_MIME, FAILURE_FILENAME)
    }
}

fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Longest prefix of `s` within `max` bytes, on a char boundary.
fn truncate_bytes(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
