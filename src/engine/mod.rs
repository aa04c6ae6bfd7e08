//! # Aegis Engine — drive-run orchestrator
//!
//! One `analyze_drive` call is one run:
//!
//! - `classify` — per-candidate tallies and risk labels
//! - `aggregate` — drive-level roll-up
//! - `retry` — backoff + dead-letter for persistence writes
//!
//! The compute-heavy middle (GII → worthy pairs → pair scores) lives in
//! `crate::analysis` and runs per question on the rayon pool, which is
//! also the bound on in-flight work. The engine itself only suspends at
//! persistence boundaries and checks the caller's cancel flag between
//! questions and before every write.

pub mod aggregate;
pub mod classify;
pub mod retry;

use crate::analysis::{score_pair, worthy_pairs, GlobalInvertedIndex, OverlapThresholds};
use crate::cancel::CancelFlag;
use crate::metrics::{reason, AegisMetrics};
use crate::model::{AnalysisStatus, Artifact, CandidateRisk, TestReport};
use crate::storage::{
    ArtifactStore, CandidateUpdate, DeadLetterSink, ResultsStore, UpdateOutcome,
};
use crate::{AegisError, AegisResult};
use aggregate::{aggregate_drive, DriveRiskBands};
use classify::{classify_candidates, CandidateVerdict, RiskThresholds, ScoredPair};
use rayon::prelude::*;
use retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// ─── Configuration ─────────────────────────────────────────────────

/// Engine configuration. Every threshold the risk model uses is a field
/// here rather than a constant, so deployments can tune the bars without
/// a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Worthy-pair overlap bars, keyed by question difficulty.
    #[serde(default)]
    pub overlap_thresholds: OverlapThresholds,
    /// Per-candidate risk bars on `max(code, algo)`.
    #[serde(default)]
    pub risk_thresholds: RiskThresholds,
    /// Drive-verdict bands on the flagged fraction.
    #[serde(default)]
    pub drive_risk_bands: DriveRiskBands,
    /// Postings longer than this are treated as boilerplate and skipped
    /// during pair expansion.
    #[serde(default = "default_posting_cap")]
    pub boilerplate_posting_cap: usize,
    /// Backoff schedule for persistence writes, one delay per attempt.
    #[serde(default = "default_retry_delays_ms")]
    pub retry_delays_ms: Vec<u64>,
}

fn default_posting_cap() -> usize {
    64
}

fn default_retry_delays_ms() -> Vec<u64> {
    vec![1_000, 2_000, 4_000, 8_000]
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            overlap_thresholds: OverlapThresholds::default(),
            risk_thresholds: RiskThresholds::default(),
            drive_risk_bands: DriveRiskBands::default(),
            boilerplate_posting_cap: default_posting_cap(),
            retry_delays_ms: default_retry_delays_ms(),
        }
    }
}

impl AnalysisConfig {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}

// ─── Run summary ───────────────────────────────────────────────────

/// What one drive run did, for logging and the trigger acknowledgement.
#[derive(Debug, Clone)]
pub struct DriveRunSummary {
    pub drive_id: String,
    pub report: TestReport,
    pub questions_analyzed: usize,
    pub worthy_pairs: usize,
    pub candidates_written: usize,
    pub candidates_not_found: usize,
    pub candidates_failed: usize,
    pub duration_ms: u64,
}

// ─── Engine ────────────────────────────────────────────────────────

/// The plagiarism analysis engine.
pub struct AegisEngine {
    artifacts: Arc<dyn ArtifactStore>,
    results: Arc<dyn ResultsStore>,
    dead_letters: Arc<dyn DeadLetterSink>,
    config: AnalysisConfig,
    metrics: Arc<AegisMetrics>,
}

impl AegisEngine {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        results: Arc<dyn ResultsStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
        config: AnalysisConfig,
        metrics: Arc<AegisMetrics>,
    ) -> Self {
        Self {
            artifacts,
            results,
            dead_letters,
            config,
            metrics,
        }
    }

    /// Run the full analysis for one drive.
    ///
    /// Per-candidate persistence failures are isolated: a candidate whose
    /// update exhausts retries is dead-lettered and counted failed without
    /// sinking the drive report. Cancellation abandons in-flight work and
    /// leaves the report `pending` for the next run to overwrite.
    pub fn analyze_drive(
        &self,
        drive_id: &str,
        cancel: &CancelFlag,
    ) -> AegisResult<DriveRunSummary> {
        if drive_id.trim().is_empty() {
            self.metrics.record_invalid(reason::MISSING_DRIVE_ID);
            return Err(AegisError::InvalidInput("driveId must not be empty".into()));
        }

        self.metrics.compute_requests_total.inc();
        let _timer = self
            .metrics
            .plagiarism_computation_duration_seconds
            .start_timer();
        let start = std::time::Instant::now();
        let retry = self.config.retry_policy();

        tracing::info!(drive_id = drive_id, "═══ aegis drive analysis ═══");

        // ── Step 1: Load artifacts. Store down at the start is fatal and
        // the previous report stays untouched. ──
        let artifacts = self
            .artifacts
            .list_artifacts_by_drive(drive_id)
            .map_err(|e| AegisError::Fatal(e.to_string()))?;

        if artifacts.is_empty() {
            tracing::info!(drive_id = drive_id, "no artifacts, emitting safe report");
            self.metrics.record_invalid(reason::NO_ARTIFACTS);
            let mut report = TestReport::pending(drive_id);
            report.status = AnalysisStatus::Completed;
            self.upsert_report(&retry, drive_id, &report, cancel)?;
            return Ok(DriveRunSummary {
                drive_id: drive_id.to_string(),
                report,
                questions_analyzed: 0,
                worthy_pairs: 0,
                candidates_written: 0,
                candidates_not_found: 0,
                candidates_failed: 0,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        // ── Step 2: Mark the run pending. ──
        self.upsert_report(&retry, drive_id, &TestReport::pending(drive_id), cancel)?;

        // ── Step 3: Partition by question and score each in parallel. ──
        let artifact_count = artifacts.len();
        let mut by_question: BTreeMap<i64, Vec<Artifact>> = BTreeMap::new();
        for artifact in artifacts {
            by_question.entry(artifact.q_id).or_default().push(artifact);
        }
        let questions_analyzed = by_question.len();
        tracing::info!(
            drive_id = drive_id,
            artifacts = artifact_count,
            questions = questions_analyzed,
            "artifacts loaded"
        );

        let question_scores: Vec<AegisResult<Vec<ScoredPair>>> = by_question
            .par_iter()
            .map(|(q_id, question_artifacts)| {
                if cancel.is_cancelled() {
                    return Err(AegisError::Cancelled);
                }
                Ok(self.analyze_question(*q_id, question_artifacts))
            })
            .collect();

        let mut scored_pairs: Vec<ScoredPair> = Vec::new();
        for result in question_scores {
            scored_pairs.extend(result?);
        }

        // ── Step 4: Fold into per-candidate verdicts. ──
        let verdicts = classify_candidates(
            by_question.values().flatten(),
            &scored_pairs,
            &self.config.risk_thresholds,
        );

        for verdict in &verdicts {
            if verdict.risk >= CandidateRisk::HighlySuspicious {
                self.metrics.record_high_plagiarism(drive_id);
            }
        }

        // ── Step 5: Persist candidate verdicts, isolating failures. ──
        let mut written = 0usize;
        let mut not_found = 0usize;
        let mut failed = 0usize;

        for verdict in &verdicts {
            if cancel.is_cancelled() {
                return Err(AegisError::Cancelled);
            }
            match self.write_candidate(&retry, drive_id, verdict, cancel) {
                Ok(UpdateOutcome::Updated) => written += 1,
                Ok(UpdateOutcome::NotFound) => {
                    tracing::warn!(
                        attempt_id = %verdict.attempt_id,
                        drive_id = drive_id,
                        "candidate result not found, discarding verdict"
                    );
                    self.metrics
                        .record_invalid(reason::FAILED_TO_UPDATE_CANDIDATE_RESULT);
                    not_found += 1;
                }
                Err(AegisError::Cancelled) => return Err(AegisError::Cancelled),
                Err(e) => {
                    // Already dead-lettered by the retry policy.
                    tracing::error!(
                        attempt_id = %verdict.attempt_id,
                        error = %e,
                        "candidate update exhausted retries"
                    );
                    failed += 1;
                }
            }
        }

        // ── Step 6: Aggregate and persist the drive report. ──
        let status = if written > 0 {
            AnalysisStatus::Completed
        } else {
            AnalysisStatus::Failed
        };
        let report = aggregate_drive(drive_id, &verdicts, &self.config.drive_risk_bands, status);
        self.upsert_report(&retry, drive_id, &report, cancel)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            drive_id = drive_id,
            risk = %report.risk,
            flagged = report.flagged_candidates,
            total = report.total_analyzed,
            pairs = scored_pairs.len(),
            written = written,
            not_found = not_found,
            failed = failed,
            duration_ms = duration_ms,
            "═══ drive analysis complete ═══"
        );

        Ok(DriveRunSummary {
            drive_id: drive_id.to_string(),
            report,
            questions_analyzed,
            worthy_pairs: scored_pairs.len(),
            candidates_written: written,
            candidates_not_found: not_found,
            candidates_failed: failed,
            duration_ms,
        })
    }

    /// GII → worthy pairs → scores for one question's artifacts.
    fn analyze_question(&self, q_id: i64, question_artifacts: &[Artifact]) -> Vec<ScoredPair> {
        let difficulty = question_artifacts[0].difficulty;
        if question_artifacts.iter().any(|a| a.difficulty != difficulty) {
            tracing::warn!(
                q_id = q_id,
                "artifacts disagree on question difficulty, using the first"
            );
        }

        let gii = GlobalInvertedIndex::build(question_artifacts);
        let pairs = worthy_pairs(
            &gii,
            question_artifacts,
            difficulty,
            &self.config.overlap_thresholds,
            self.config.boilerplate_posting_cap,
        );

        tracing::debug!(
            q_id = q_id,
            candidates = question_artifacts.len(),
            shared_hashes = gii.len(),
            worthy_pairs = pairs.len(),
            difficulty = %difficulty,
            "question analyzed"
        );

        pairs
            .par_iter()
            .map(|pair| ScoredPair {
                q_id,
                attempt_a: pair.a.attempt_id.clone(),
                attempt_b: pair.b.attempt_id.clone(),
                score: score_pair(pair),
            })
            .collect()
    }

    fn write_candidate(
        &self,
        retry: &RetryPolicy,
        drive_id: &str,
        verdict: &CandidateVerdict,
        cancel: &CancelFlag,
    ) -> AegisResult<UpdateOutcome> {
        let update = CandidateUpdate {
            risk: verdict.risk,
            code_similarity: verdict.code_similarity,
            algo_similarity: verdict.algo_similarity,
            plagiarism_status: AnalysisStatus::Completed,
            flagged_qns: verdict.flagged_qns.clone(),
            plagiarism_peers: verdict.plagiarism_peers.clone(),
        };

        let mut payload = to_payload(&update)?;
        payload.insert("attemptId".into(), serde_json::json!(verdict.attempt_id));
        payload.insert("driveId".into(), serde_json::json!(drive_id));

        retry.run(
            "update_candidate_result",
            &Uuid::new_v4().to_string(),
            &payload,
            self.dead_letters.as_ref(),
            cancel,
            || {
                self.results
                    .update_candidate_result(&verdict.attempt_id, drive_id, &update)
            },
        )
    }

    fn upsert_report(
        &self,
        retry: &RetryPolicy,
        drive_id: &str,
        report: &TestReport,
        cancel: &CancelFlag,
    ) -> AegisResult<()> {
        let payload = to_payload(report)?;
        retry.run(
            "upsert_drive_report",
            &Uuid::new_v4().to_string(),
            &payload,
            self.dead_letters.as_ref(),
            cancel,
            || self.results.upsert_drive_report(drive_id, report),
        )
    }
}

fn to_payload<T: Serialize>(value: &T) -> AegisResult<serde_json::Map<String, serde_json::Value>> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("payload".into(), other);
            Ok(map)
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn make_engine(store: Arc<MemoryStore>) -> AegisEngine {
        let config = AnalysisConfig {
            retry_delays_ms: vec![0, 0, 0, 0],
            ..AnalysisConfig::default()
        };
        AegisEngine::new(
            store.clone(),
            store.clone(),
            store,
            config,
            Arc::new(AegisMetrics::new().unwrap()),
        )
    }

    #[test]
    fn test_empty_drive_id_is_invalid_input() {
        let store = Arc::new(MemoryStore::new());
        let engine = make_engine(store);
        let result = engine.analyze_drive("  ", &CancelFlag::new());
        assert!(matches!(result, Err(AegisError::InvalidInput(_))));
    }

    #[test]
    fn test_store_down_at_start_is_fatal_and_leaves_no_report() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_lists(1);
        let engine = make_engine(store.clone());
        let result = engine.analyze_drive("d-1", &CancelFlag::new());
        assert!(matches!(result, Err(AegisError::Fatal(_))));
        assert!(store.report("d-1").is_none());
    }

    #[test]
    fn test_config_defaults_round_trip_from_empty_json() {
        let config: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.boilerplate_posting_cap, 64);
        assert_eq!(config.retry_delays_ms, vec![1_000, 2_000, 4_000, 8_000]);
        assert_eq!(config.risk_thresholds.suspicious, 40);
        assert!((config.overlap_thresholds.hard - 0.05).abs() < 1e-9);
        assert!((config.drive_risk_bands.critical - 0.30).abs() < 1e-9);
    }
}
