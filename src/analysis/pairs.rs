//! Worthy-pair selection — which pairs are worth scoring at all
//!
//! Walks the inverted index and counts, for every unordered attempt pair,
//! how many fingerprint hashes they share. A pair graduates to *worthy*
//! when the shared count covers enough of the smaller submission's
//! fingerprint set, with the bar keyed by question difficulty: easy
//! questions produce convergent solutions, so they need more overlap to
//! look suspicious; hard questions almost never collide by accident.

use super::gii::GlobalInvertedIndex;
use crate::model::{Artifact, Difficulty};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─── Thresholds ────────────────────────────────────────────────────

/// Minimum fraction of the smaller fingerprint set that must be shared,
/// per difficulty. `unknown` difficulties use the medium bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OverlapThresholds {
    #[serde(default = "default_easy")]
    pub easy: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
    #[serde(default = "default_hard")]
    pub hard: f64,
}

fn default_easy() -> f64 {
    0.15
}
fn default_medium() -> f64 {
    0.10
}
fn default_hard() -> f64 {
    0.05
}

impl Default for OverlapThresholds {
    fn default() -> Self {
        Self {
            easy: default_easy(),
            medium: default_medium(),
            hard: default_hard(),
        }
    }
}

impl OverlapThresholds {
    pub fn for_difficulty(&self, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium | Difficulty::Unknown => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

// ─── Pairs ─────────────────────────────────────────────────────────

/// An unordered pair of artifacts whose fingerprint overlap cleared the
/// difficulty threshold, with the overlap fraction that got it here.
#[derive(Debug, Clone, Copy)]
pub struct CandidatePair<'a> {
    pub a: &'a Artifact,
    pub b: &'a Artifact,
    /// Count of fingerprint hashes the two attempts share.
    pub shared: usize,
    /// `shared / min(|fingerprints_a|, |fingerprints_b|)` over deduplicated
    /// hash sets, in `[0.0, 1.0]`.
    pub overlap: f64,
}

/// Canonical key for an unordered attempt pair: `min(id):max(id)`.
fn pair_key(id_a: &str, id_b: &str) -> String {
    if id_a < id_b {
        format!("{id_a}:{id_b}")
    } else {
        format!("{id_b}:{id_a}")
    }
}

/// Enumerate worthy pairs for one question.
///
/// `posting_cap` is the boilerplate safety valve: a hash held by more than
/// that many attempts (think starter-template code) is skipped rather than
/// expanded into `O(k²)` pair increments. Results are sorted by pair key so
/// downstream folds see a stable order.
pub fn worthy_pairs<'a>(
    gii: &GlobalInvertedIndex,
    artifacts: &'a [Artifact],
    difficulty: Difficulty,
    thresholds: &OverlapThresholds,
    posting_cap: usize,
) -> Vec<CandidatePair<'a>> {
    let by_attempt: HashMap<&str, &'a Artifact> = artifacts
        .iter()
        .map(|a| (a.attempt_id.as_str(), a))
        .collect();

    // Deduplicated set sizes, computed once per artifact instead of per pair.
    let set_sizes: HashMap<&str, usize> = artifacts
        .iter()
        .map(|a| (a.attempt_id.as_str(), a.fingerprint_hash_set().len()))
        .collect();

    let threshold = thresholds.for_difficulty(difficulty);

    let mut shared_counts: HashMap<String, usize> = HashMap::new();
    let mut pair_artifacts: HashMap<String, (&'a Artifact, &'a Artifact)> = HashMap::new();
    let mut boilerplate_skipped = 0usize;

    for (hash, attempts) in gii.postings() {
        if attempts.len() > posting_cap {
            tracing::trace!(
                hash = %hash,
                posting_len = attempts.len(),
                "posting over cap, treating as boilerplate"
            );
            boilerplate_skipped += 1;
            continue;
        }

        for i in 0..attempts.len() {
            for j in (i + 1)..attempts.len() {
                let (Some(&artifact_a), Some(&artifact_b)) = (
                    by_attempt.get(attempts[i].as_str()),
                    by_attempt.get(attempts[j].as_str()),
                ) else {
                    continue;
                };

                let key = pair_key(&artifact_a.attempt_id, &artifact_b.attempt_id);
                *shared_counts.entry(key.clone()).or_insert(0) += 1;
                pair_artifacts
                    .entry(key)
                    .or_insert((artifact_a, artifact_b));
            }
        }
    }

    if boilerplate_skipped > 0 {
        tracing::debug!(
            skipped = boilerplate_skipped,
            cap = posting_cap,
            "boilerplate hashes excluded from pair expansion"
        );
    }

    let mut pairs: Vec<CandidatePair<'a>> = Vec::new();
    for (key, shared) in &shared_counts {
        let (a, b) = pair_artifacts[key];
        let overlap = overlap_fraction(&set_sizes, a, b, *shared);
        if overlap >= threshold {
            pairs.push(CandidatePair {
                a,
                b,
                shared: *shared,
                overlap,
            });
        }
    }

    pairs.sort_by(|x, y| {
        pair_key(&x.a.attempt_id, &x.b.attempt_id).cmp(&pair_key(&y.a.attempt_id, &y.b.attempt_id))
    });
    pairs
}

/// Shared count over the smaller deduplicated fingerprint set. Zero when
/// either side has no fingerprints at all.
fn overlap_fraction(
    set_sizes: &HashMap<&str, usize>,
    a: &Artifact,
    b: &Artifact,
    shared: usize,
) -> f64 {
    let total_a = set_sizes.get(a.attempt_id.as_str()).copied().unwrap_or(0);
    let total_b = set_sizes.get(b.attempt_id.as_str()).copied().unwrap_or(0);

    if total_a == 0 || total_b == 0 {
        return 0.0;
    }

    shared as f64 / total_a.min(total_b) as f64
}

// ─── Tests ─────────────────────────────────────────────────────────
