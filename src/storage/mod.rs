//! Persistence contract — the only thing the engine knows about storage
//!
//! Three narrow traits: artifacts in, results and reports out, failures to
//! the dead-letter sink. Production wires these to the MongoDB collections
//! and the Redis stream; tests wire them to [`memory::MemoryStore`]. All
//! writes are idempotent upserts keyed by `driveId` / `(attemptId, driveId)`
//! so a re-run converges to identical persisted state.

pub mod memory;

use crate::model::{AnalysisStatus, Artifact, CandidateRisk, TestReport};
use crate::AegisResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub use memory::MemoryStore;

// ─── Read side ─────────────────────────────────────────────────────

/// Read access to the artifact collection. Artifacts are produced by the
/// preprocess stage and are read-only to the engine.
pub trait ArtifactStore: Send + Sync {
    fn list_artifacts_by_drive(&self, drive_id: &str) -> AegisResult<Vec<Artifact>>;
}

// ─── Write side ────────────────────────────────────────────────────

/// Outcome of a candidate-result update. The engine never inserts result
/// rows; a missing row is reported, not created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
}

/// The fields the engine writes onto an existing candidate-result row.
/// Field names match the persisted document schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateUpdate {
    pub risk: CandidateRisk,
    pub code_similarity: u32,
    pub algo_similarity: u32,
    pub plagiarism_status: AnalysisStatus,
    pub flagged_qns: BTreeSet<String>,
    pub plagiarism_peers: BTreeMap<String, BTreeSet<String>>,
}

/// Write access to the `results` and `plagiarism_reports` collections.
pub trait ResultsStore: Send + Sync {
    /// Upsert the per-drive report, replacing any previous row.
    fn upsert_drive_report(&self, drive_id: &str, report: &TestReport) -> AegisResult<()>;

    /// Update an existing candidate-result row. Returns
    /// [`UpdateOutcome::NotFound`] when no row matches — the verdict is
    /// then discarded by the caller.
    fn update_candidate_result(
        &self,
        attempt_id: &str,
        drive_id: &str,
        update: &CandidateUpdate,
    ) -> AegisResult<UpdateOutcome>;

    /// The most recently persisted report for a drive, if any.
    fn latest_drive_report(&self, drive_id: &str) -> AegisResult<Option<TestReport>>;
}

// ─── Dead letters ──────────────────────────────────────────────────

/// One dead-lettered operation: the original payload plus the failure
/// metadata fields the recovery tooling keys on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    #[serde(rename = "_error")]
    pub error: String,
    #[serde(rename = "_stream_id")]
    pub stream_id: String,
    /// Epoch seconds at the moment retries were exhausted.
    #[serde(rename = "_failed_at")]
    pub failed_at: i64,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl DeadLetterRecord {
    pub fn new(
        stream_id: impl Into<String>,
        payload: serde_json::Map<String, serde_json::Value>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            stream_id: stream_id.into(),
            failed_at: Utc::now().timestamp(),
            payload,
        }
    }
}

/// Append-only sink for operations that exhausted their retries.
pub trait DeadLetterSink: Send + Sync {
    fn append(&self, record: &DeadLetterRecord) -> AegisResult<()>;
}

// ─── Tests ─────────────────────────────────────────────────────────
