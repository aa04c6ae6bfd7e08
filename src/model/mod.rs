//! Canonical data model — artifacts in, verdicts out
//!
//! Everything the engine reads or writes crosses this module. `Artifact` is
//! the immutable, pre-parsed form of one candidate's answer to one question,
//! produced upstream and stored per drive. `CandidateResult` and `TestReport`
//! are the mutable rows the engine writes back.
//!
//! Field names follow the upstream document schema: identifiers are
//! camelCase (`attemptId`, `driveId`), analysis fields are snake_case
//! (`code_similarity`, `flagged_qns`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

// ─── Artifact ──────────────────────────────────────────────────────

/// One candidate's analyzable submission for one question.
///
/// `(attemptId, qId)` is unique within a drive; `attemptId` alone identifies
/// the candidate's submission across questions of the same drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub email: String,
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
    #[serde(rename = "testId")]
    pub test_id: String,
    #[serde(rename = "driveId")]
    pub drive_id: String,
    pub difficulty: Difficulty,
    #[serde(rename = "sourceCode")]
    pub source_code: String,
    #[serde(rename = "qId")]
    pub q_id: i64,
    pub language: String,
    #[serde(rename = "langCode")]
    pub lang_code: String,
    #[serde(default)]
    pub tokens: Vec<String>,
    #[serde(rename = "normalizedTokens", default)]
    pub normalized_tokens: Vec<String>,
    /// Syntactic skeleton. Absent when the upstream parser could not build one.
    #[serde(default)]
    pub ast: Option<AstNode>,
    /// Control-flow graph. Opaque to the engine; carried for future signals.
    #[serde(default)]
    pub cfg: Option<serde_json::Value>,
    #[serde(default)]
    pub fingerprints: Option<Fingerprints>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Deduplicated fingerprint hashes. A hash appearing twice within one
    /// submission counts once everywhere overlap is measured.
    pub fn fingerprint_hash_set(&self) -> HashSet<&str> {
        self.fingerprints
            .as_ref()
            .map(|f| f.hashes.iter().map(|h| h.hash.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Locality-sensitive fingerprints computed upstream from token windows.
/// Only hash equality matters to the engine; positions are informational.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fingerprints {
    #[serde(default)]
    pub hashes: Vec<FingerprintEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintEntry {
    pub hash: String,
    #[serde(default)]
    pub position: usize,
}

// ─── AST ───────────────────────────────────────────────────────────

/// A node of the pre-parsed syntactic skeleton. Owned children make the
/// tree acyclic by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "returnType", default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<AstParameter>,
    #[serde(default)]
    pub children: Vec<AstNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstParameter {
    #[serde(rename = "type")]
    pub param_kind: String,
    pub name: String,
    #[serde(rename = "paramType", default)]
    pub param_type: Option<String>,
}

// ─── Difficulty ────────────────────────────────────────────────────

/// Question difficulty, keyed into the worthy-pair overlap thresholds.
/// Unrecognized values fall back to `Unknown` (treated as medium).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ─── Risk labels ───────────────────────────────────────────────────

/// Per-candidate verdict, ordered from benign to damning so `max` picks
/// the highest level any pair contributed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum CandidateRisk {
    #[default]
    Clean,
    Suspicious,
    HighlySuspicious,
    NearCopy,
}

impl std::fmt::Display for CandidateRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Suspicious => write!(f, "suspicious"),
            Self::HighlySuspicious => write!(f, "highly_suspicious"),
            Self::NearCopy => write!(f, "near_copy"),
        }
    }
}

/// Drive-level verdict from the flagged-candidate fraction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum DriveRisk {
    #[default]
    Safe,
    Moderate,
    High,
    Critical,
}

impl std::fmt::Display for DriveRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Moderate => write!(f, "moderate"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Lifecycle status shared by candidate results and drive reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

// ─── Result rows ───────────────────────────────────────────────────

/// Per-candidate, per-drive result row. Created `pending` by the preprocess
/// stage; the engine updates the analysis fields and flips the status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub email: String,
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
    #[serde(rename = "driveId")]
    pub drive_id: String,
    pub risk: CandidateRisk,
    /// Questions on which this candidate was implicated, as `qId` strings.
    #[serde(default)]
    pub flagged_qns: BTreeSet<String>,
    /// `qId` → peers whose pair with this candidate crossed the flag bar.
    #[serde(default)]
    pub plagiarism_peers: BTreeMap<String, BTreeSet<String>>,
    /// Maximum observed per-question percentages, [0, 100].
    pub code_similarity: u32,
    pub algo_similarity: u32,
    pub status: AnalysisStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Per-drive plagiarism report, upserted `pending` when a run starts and
/// replaced when it finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    #[serde(rename = "driveId")]
    pub drive_id: String,
    pub risk: DriveRisk,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub flagged_qns: BTreeSet<String>,
    pub flagged_candidates: usize,
    pub total_analyzed: usize,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl TestReport {
    /// A fresh `pending` report for a drive run that is starting.
    pub fn pending(drive_id: &str) -> Self {
        Self {
            drive_id: drive_id.to_string(),
            risk: DriveRisk::Safe,
            status: AnalysisStatus::Pending,
            flagged_qns: BTreeSet::new(),
            flagged_candidates: 0,
            total_analyzed: 0,
            created_at: Utc::now(),
        }
    }
}

// ─── Trigger boundary ──────────────────────────────────────────────

/// Drive-analysis trigger payload, as received by the front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeRequest {
    #[serde(rename = "driveId")]
    pub drive_id: String,
}

/// Synchronous acknowledgement; analysis proceeds in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeResponse {
    pub message: String,
    pub test_id: String,
}

// ─── Tests ─────────────────────────────────────────────────────────
