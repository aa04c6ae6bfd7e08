//! Risk classification — fold pair scores into per-candidate verdicts
//!
//! Every candidate in the drive gets a verdict, even if no pair ever
//! involved them (they stay `clean` at 0/0). For candidates that did pair
//! up, the tally keeps running maxima over both signals plus the flagged
//! questions and peer clusters, all in BTree collections so the persisted
//! output comes out in one deterministic order.

use crate::analysis::scoring::PairScore;
use crate::model::{Artifact, CandidateRisk};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ─── Thresholds ────────────────────────────────────────────────────

/// Per-pair contribution bars on `max(code, algo)`. A candidate's label is
/// the highest level any of their pairs reached. Taking the stronger of the
/// two signals means a structural match alone (obfuscated renames) is
/// enough to flag, and likewise a token-level match alone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// At or above: the pair flags the question and both peers.
    #[serde(default = "default_suspicious")]
    pub suspicious: u32,
    #[serde(default = "default_highly_suspicious")]
    pub highly_suspicious: u32,
    #[serde(default = "default_near_copy")]
    pub near_copy: u32,
}

fn default_suspicious() -> u32 {
    40
}
fn default_highly_suspicious() -> u32 {
    65
}
fn default_near_copy() -> u32 {
    85
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            suspicious: default_suspicious(),
            highly_suspicious: default_highly_suspicious(),
            near_copy: default_near_copy(),
        }
    }
}

impl RiskThresholds {
    /// Label for a single observed percentage.
    pub fn classify(&self, strongest: u32) -> CandidateRisk {
        if strongest >= self.near_copy {
            CandidateRisk::NearCopy
        } else if strongest >= self.highly_suspicious {
            CandidateRisk::HighlySuspicious
        } else if strongest >= self.suspicious {
            CandidateRisk::Suspicious
        } else {
            CandidateRisk::Clean
        }
    }
}

// ─── Scored pairs ──────────────────────────────────────────────────

/// A scored worthy pair, detached from artifact borrows so question
/// results can cross thread boundaries.
#[derive(Debug, Clone)]
pub struct ScoredPair {
    pub q_id: i64,
    pub attempt_a: String,
    pub attempt_b: String,
    pub score: PairScore,
}

// ─── Verdicts ──────────────────────────────────────────────────────

/// Final per-candidate verdict for one drive run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateVerdict {
    pub attempt_id: String,
    pub email: String,
    pub risk: CandidateRisk,
    /// Maximum observed percentages across all the candidate's pairs.
    pub code_similarity: u32,
    pub algo_similarity: u32,
    pub flagged_qns: BTreeSet<String>,
    pub plagiarism_peers: BTreeMap<String, BTreeSet<String>>,
}

/// Classify every candidate in the drive.
///
/// `artifacts` seeds one tally per distinct `attemptId` (so pairless
/// candidates still produce a `clean` verdict); `pairs` then folds in via
/// commutative max / set-union, so fold order never shows in the output.
/// Verdicts come back sorted by `attemptId`.
pub fn classify_candidates<'a>(
    artifacts: impl IntoIterator<Item = &'a Artifact>,
    pairs: &[ScoredPair],
    thresholds: &RiskThresholds,
) -> Vec<CandidateVerdict> {
    let mut tallies: BTreeMap<String, CandidateVerdict> = BTreeMap::new();

    for artifact in artifacts {
        tallies
            .entry(artifact.attempt_id.clone())
            .or_insert_with(|| CandidateVerdict {
                attempt_id: artifact.attempt_id.clone(),
                email: artifact.email.clone(),
                risk: CandidateRisk::Clean,
                code_similarity: 0,
                algo_similarity: 0,
                flagged_qns: BTreeSet::new(),
                plagiarism_peers: BTreeMap::new(),
            });
    }

    for pair in pairs {
        apply_to_side(&mut tallies, &pair.attempt_a, &pair.attempt_b, pair, thresholds);
        apply_to_side(&mut tallies, &pair.attempt_b, &pair.attempt_a, pair, thresholds);
    }

    let mut verdicts: Vec<CandidateVerdict> = tallies.into_values().collect();
    for verdict in &mut verdicts {
        verdict.risk = thresholds.classify(verdict.code_similarity.max(verdict.algo_similarity));
    }
    verdicts
}

/// Fold one pair into one side's tally: running maxima always, flagged
/// question and peer only when the pair clears the suspicious bar.
fn apply_to_side(
    tallies: &mut BTreeMap<String, CandidateVerdict>,
    candidate: &str,
    peer: &str,
    pair: &ScoredPair,
    thresholds: &RiskThresholds,
) {
    let Some(tally) = tallies.get_mut(candidate) else {
        // GII-derived pairs always reference seeded attempts; a stray pair
        // is dropped rather than inventing a candidate.
        tracing::warn!(attempt_id = %candidate, "pair references unknown attempt, skipping");
        return;
    };

    tally.code_similarity = tally.code_similarity.max(pair.score.code_similarity);
    tally.algo_similarity = tally.algo_similarity.max(pair.score.algo_similarity);

    if pair.score.strongest() >= thresholds.suspicious {
        let qn = pair.q_id.to_string();
        tally.flagged_qns.insert(qn.clone());
        tally.plagiarism_peers.entry(qn).or_default().insert(peer.to_string());
    }
}

// ─── Tests ─────────────────────────────────────────────────────────
