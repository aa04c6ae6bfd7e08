//! Retry with exponential backoff, dead-lettering on exhaustion
//!
//! Transient persistence failures get four attempts with 1s/2s/4s/8s
//! waits between them. An operation that exhausts all attempts is appended
//! to the dead-letter sink — original payload plus `_error`, `_stream_id`,
//! `_failed_at` — and the failure is surfaced to the caller *after* the
//! sink write, so nothing is silently lost.

use crate::cancel::CancelFlag;
use crate::storage::{DeadLetterRecord, DeadLetterSink};
use crate::{AegisError, AegisResult};
use std::time::Duration;

/// Backoff schedule. The number of delays fixes the attempt count:
/// `delays.len()` attempts, waiting `delays[i]` after failed attempt `i`
/// (no wait after the last).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: [1, 2, 4, 8].map(Duration::from_secs).to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// A policy that never waits, for tests.
    pub fn immediate(attempts: usize) -> Self {
        Self {
            delays: vec![Duration::ZERO; attempts],
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len()
    }

    /// Run `op` until it succeeds or attempts are exhausted.
    ///
    /// On exhaustion the original `payload` is dead-lettered under
    /// `stream_id` and the last error is returned. Cancellation is checked
    /// before every attempt and instead of sleeping; a cancelled operation
    /// is *not* dead-lettered (nothing failed, the caller walked away).
    pub fn run<T>(
        &self,
        op_name: &str,
        stream_id: &str,
        payload: &serde_json::Map<String, serde_json::Value>,
        sink: &dyn DeadLetterSink,
        cancel: &CancelFlag,
        mut op: impl FnMut() -> AegisResult<T>,
    ) -> AegisResult<T> {
        let mut last_err = AegisError::Persistence(format!("{op_name}: no attempts configured"));

        for attempt in 0..self.max_attempts() {
            if cancel.is_cancelled() {
                return Err(AegisError::Cancelled);
            }

            match op() {
                Ok(value) => return Ok(value),
                Err(e) => last_err = e,
            }

            if attempt + 1 < self.max_attempts() {
                let delay = self.delays[attempt];
                tracing::warn!(
                    error = %last_err,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    op = op_name,
                    stream_id = stream_id,
                    "retrying after delay"
                );
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
        }

        tracing::error!(
            error = %last_err,
            op = op_name,
            stream_id = stream_id,
            "all retries failed, sending to dead-letter sink"
        );

        let record = DeadLetterRecord::new(stream_id, payload.clone(), last_err.to_string());
        if let Err(sink_err) = sink.append(&record) {
            tracing::error!(error = %sink_err, stream_id = stream_id, "dead-letter append failed");
        } else {
            tracing::info!(stream_id = stream_id, "message sent to dead-letter sink");
        }

        Err(last_err)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn payload_for(attempt_id: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut payload = serde_json::Map::new();
        payload.insert("attemptId".into(), serde_json::json!(attempt_id));
        payload
    }

    #[test]
    fn test_first_try_success_never_sleeps_or_sinks() {
        let sink = MemoryStore::new();
        let policy = RetryPolicy::default();
        let result = policy.run(
            "op",
            "s-1",
            &payload_for("att-1"),
            &sink,
            &CancelFlag::new(),
            || Ok(42),
        );
        assert_eq!(result.unwrap(), 42);
        assert!(sink.dead_letters().is_empty());
    }

    #[test]
    fn test_recovers_after_transient_failures() {
        let sink = MemoryStore::new();
        let policy = RetryPolicy::immediate(4);
        let calls = AtomicU32::new(0);
        let result = policy.run(
            "op",
            "s-1",
            &payload_for("att-1"),
            &sink,
            &CancelFlag::new(),
            || {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AegisError::Persistence("connection reset".into()))
                } else {
                    Ok("done")
                }
            },
        );
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(sink.dead_letters().is_empty());
    }

    #[test]
    fn test_exhaustion_dead_letters_with_original_payload() {
        let sink = MemoryStore::new();
        let policy = RetryPolicy::immediate(4);
        let calls = AtomicU32::new(0);
        let result: AegisResult<()> = policy.run(
            "update_candidate_result",
            "s-99",
            &payload_for("att-7"),
            &sink,
            &CancelFlag::new(),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AegisError::Persistence("broker down".into()))
            },
        );
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let letters = sink.dead_letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].stream_id, "s-99");
        assert!(letters[0].error.contains("broker down"));
        assert!(letters[0].failed_at > 0);
        assert_eq!(letters[0].payload["attemptId"], "att-7");
    }

    #[test]
    fn test_cancellation_short_circuits_without_dead_letter() {
        let sink = MemoryStore::new();
        let policy = RetryPolicy::immediate(4);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result: AegisResult<()> = policy.run(
            "op",
            "s-1",
            &payload_for("att-1"),
            &sink,
            &cancel,
            || Err(AegisError::Persistence("never reached".into())),
        );
        assert!(matches!(result, Err(AegisError::Cancelled)));
        assert!(sink.dead_letters().is_empty());
    }
}
