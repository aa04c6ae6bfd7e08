//! In-memory store — tests, demos, and failure injection
//!
//! Implements all three persistence traits over mutexed maps. Failure
//! counters let tests make the next N calls of an operation fail with a
//! transient error, which is how the retry/dead-letter paths get exercised
//! without a real broker.

use super::{
    ArtifactStore, CandidateUpdate, DeadLetterRecord, DeadLetterSink, ResultsStore, UpdateOutcome,
};
use crate::model::{AnalysisStatus, Artifact, CandidateResult, CandidateRisk, TestReport};
use crate::{AegisError, AegisResult};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    artifacts: Mutex<Vec<Artifact>>,
    /// `(attemptId, driveId)` → result row.
    results: Mutex<HashMap<(String, String), CandidateResult>>,
    reports: Mutex<HashMap<String, TestReport>>,
    dead_letters: Mutex<Vec<DeadLetterRecord>>,
    fail_next_lists: Mutex<u32>,
    fail_next_updates: Mutex<u32>,
    fail_next_upserts: Mutex<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an artifact and seed the matching `pending` result row, the
    /// way the preprocess stage does before analysis ever runs.
    pub fn insert_artifact(&self, artifact: Artifact) {
        self.seed_pending_result(&artifact);
        self.artifacts.lock().unwrap().push(artifact);
    }

    /// Insert an artifact without a result row, to model a submission the
    /// preprocess stage never registered.
    pub fn insert_artifact_without_result(&self, artifact: Artifact) {
        self.artifacts.lock().unwrap().push(artifact);
    }

    fn seed_pending_result(&self, artifact: &Artifact) {
        let key = (artifact.attempt_id.clone(), artifact.drive_id.clone());
        self.results
            .lock()
            .unwrap()
            .entry(key)
            .or_insert_with(|| CandidateResult {
                email: artifact.email.clone(),
                attempt_id: artifact.attempt_id.clone(),
                drive_id: artifact.drive_id.clone(),
                risk: CandidateRisk::Clean,
                flagged_qns: BTreeSet::new(),
                plagiarism_peers: BTreeMap::new(),
                code_similarity: 0,
                algo_similarity: 0,
                status: AnalysisStatus::Pending,
                created_at: Utc::now(),
            });
    }

    pub fn candidate_result(&self, attempt_id: &str, drive_id: &str) -> Option<CandidateResult> {
        self.results
            .lock()
            .unwrap()
            .get(&(attempt_id.to_string(), drive_id.to_string()))
            .cloned()
    }

    pub fn report(&self, drive_id: &str) -> Option<TestReport> {
        self.reports.lock().unwrap().get(drive_id).cloned()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetterRecord> {
        self.dead_letters.lock().unwrap().clone()
    }

    /// Make the next `n` artifact listings fail with a transient error.
    pub fn fail_next_lists(&self, n: u32) {
        *self.fail_next_lists.lock().unwrap() = n;
    }

    /// Make the next `n` candidate updates fail with a transient error.
    pub fn fail_next_updates(&self, n: u32) {
        *self.fail_next_updates.lock().unwrap() = n;
    }

    /// Make the next `n` report upserts fail with a transient error.
    pub fn fail_next_upserts(&self, n: u32) {
        *self.fail_next_upserts.lock().unwrap() = n;
    }

    fn consume_failure(counter: &Mutex<u32>, op: &str) -> AegisResult<()> {
        let mut remaining = counter.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(AegisError::Persistence(format!(
                "injected transient failure: {op}"
            )));
        }
        Ok(())
    }
}

impl ArtifactStore for MemoryStore {
    fn list_artifacts_by_drive(&self, drive_id: &str) -> AegisResult<Vec<Artifact>> {
        Self::consume_failure(&self.fail_next_lists, "list_artifacts_by_drive")?;
        Ok(self
            .artifacts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.drive_id == drive_id)
            .cloned()
            .collect())
    }
}

impl ResultsStore for MemoryStore {
    fn upsert_drive_report(&self, drive_id: &str, report: &TestReport) -> AegisResult<()> {
        Self::consume_failure(&self.fail_next_upserts, "upsert_drive_report")?;
        self.reports
            .lock()
            .unwrap()
            .insert(drive_id.to_string(), report.clone());
        Ok(())
    }

    fn update_candidate_result(
        &self,
        attempt_id: &str,
        drive_id: &str,
        update: &CandidateUpdate,
    ) -> AegisResult<UpdateOutcome> {
        Self::consume_failure(&self.fail_next_updates, "update_candidate_result")?;
        let mut results = self.results.lock().unwrap();
        match results.get_mut(&(attempt_id.to_string(), drive_id.to_string())) {
            Some(row) => {
                row.risk = update.risk;
                row.code_similarity = update.code_similarity;
                row.algo_similarity = update.algo_similarity;
                row.status = update.plagiarism_status;
                row.flagged_qns = update.flagged_qns.clone();
                row.plagiarism_peers = update.plagiarism_peers.clone();
                Ok(UpdateOutcome::Updated)
            }
            None => Ok(UpdateOutcome::NotFound),
        }
    }

    fn latest_drive_report(&self, drive_id: &str) -> AegisResult<Option<TestReport>> {
        Ok(self.reports.lock().unwrap().get(drive_id).cloned())
    }
}

impl DeadLetterSink for MemoryStore {
    fn append(&self, record: &DeadLetterRecord) -> AegisResult<()> {
        self.dead_letters.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Fingerprints};

    fn make_artifact(attempt_id: &str, drive_id: &str) -> Artifact {
        Artifact {
            email: format!("{attempt_id}@example.com"),
            attempt_id: attempt_id.into(),
            test_id: "t-1".into(),
            drive_id: drive_id.into(),
            difficulty: Difficulty::Medium,
            source_code: String::new(),
            q_id: 1,
            language: "python".into(),
            lang_code: "py".into(),
            tokens: vec![],
            normalized_tokens: vec![],
            ast: None,
            cfg: None,
            fingerprints: Some(Fingerprints::default()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_seeds_pending_result_row() {
        let store = MemoryStore::new();
        store.insert_artifact(make_artifact("att-1", "d-1"));
        let row = store.candidate_result("att-1", "d-1").unwrap();
        assert_eq!(row.status, AnalysisStatus::Pending);
        assert_eq!(row.risk, CandidateRisk::Clean);
    }

    #[test]
    fn test_list_filters_by_drive() {
        let store = MemoryStore::new();
        store.insert_artifact(make_artifact("att-1", "d-1"));
        store.insert_artifact(make_artifact("att-2", "d-2"));
        let listed = store.list_artifacts_by_drive("d-1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].attempt_id, "att-1");
    }

    #[test]
    fn test_update_without_row_reports_not_found() {
        let store = MemoryStore::new();
        let update = CandidateUpdate {
            risk: CandidateRisk::Clean,
            code_similarity: 0,
            algo_similarity: 0,
            plagiarism_status: AnalysisStatus::Completed,
            flagged_qns: BTreeSet::new(),
            plagiarism_peers: BTreeMap::new(),
        };
        let outcome = store
            .update_candidate_result("ghost", "d-1", &update)
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[test]
    fn test_injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.insert_artifact(make_artifact("att-1", "d-1"));
        store.fail_next_lists(2);
        assert!(store.list_artifacts_by_drive("d-1").is_err());
        assert!(store.list_artifacts_by_drive("d-1").is_err());
        assert!(store.list_artifacts_by_drive("d-1").is_ok());
    }

    #[test]
    fn test_report_upsert_replaces() {
        let store = MemoryStore::new();
        store
            .upsert_drive_report("d-1", &TestReport::pending("d-1"))
            .unwrap();
        let mut finished = TestReport::pending("d-1");
        finished.status = AnalysisStatus::Completed;
        store.upsert_drive_report("d-1", &finished).unwrap();
        assert_eq!(
            store.report("d-1").unwrap().status,
            AnalysisStatus::Completed
        );
        assert_eq!(
            store.latest_drive_report("d-1").unwrap().unwrap().status,
            AnalysisStatus::Completed
        );
    }
}
