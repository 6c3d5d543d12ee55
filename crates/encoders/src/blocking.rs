//! Bounded waits on CPU-bound codec work.
//!
//! In-process codecs run on the blocking pool. The wait is raced against the
//! per-candidate timeout and the cancel token; a blocking task cannot be
//! interrupted, so either one only stops waiting for it.

use std::time::Duration;

use tracing::warn;

use tightfit_core::{CancelToken, EncodeError};

/// Run `work` on the blocking pool for one candidate.
///
/// Expiry is `TimedOut` (skip the candidate), cancellation is `Cancelled`.
pub(crate) async fn run_bounded<T, F>(
    candidate: &str,
    timeout: Duration,
    cancel: &CancelToken,
    work: F,
) -> Result<T, EncodeError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let job = tokio::task::spawn_blocking(work);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EncodeError::Cancelled),
        joined = tokio::time::timeout(timeout, job) => match joined {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join_err)) => Err(EncodeError::candidate_failed(
                candidate,
                format!("encoder task failed: {join_err}"),
            )),
            Err(_) => {
                warn!(candidate, timeout_ms = timeout.as_millis() as u64, "Codec run timed out");
                Err(EncodeError::TimedOut {
                    candidate: candidate.to_string(),
                    timeout_secs: timeout.as_secs(),
                })
            }
        },
    }
}
