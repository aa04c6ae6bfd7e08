//! Global Inverted Index — fingerprint hash → attempts that contain it
//!
//! Built once per question. Inverting the fingerprint relation means pair
//! enumeration only ever walks hashes that at least two attempts share,
//! which is what keeps a 500-candidate question from devolving into a
//! quarter-million blind pairwise comparisons.

use crate::model::Artifact;
use std::collections::{HashMap, HashSet};

/// Inverted index over one question's artifacts, restricted to hashes that
/// appear in at least two distinct attempts.
#[derive(Debug, Default)]
pub struct GlobalInvertedIndex {
    postings: HashMap<String, Vec<String>>,
}

impl GlobalInvertedIndex {
    /// Build the index from the artifacts of a single question.
    ///
    /// Each attempt is added to a hash's posting list at most once — a hash
    /// repeating inside one submission counts once toward that attempt.
    /// Postings with fewer than two attempts are dropped after the pass.
    pub fn build(artifacts: &[Artifact]) -> Self {
        let mut postings: HashMap<String, Vec<String>> = HashMap::new();

        for artifact in artifacts {
            let Some(fingerprints) = &artifact.fingerprints else {
                continue;
            };

            let mut seen: HashSet<&str> = HashSet::new();
            for entry in &fingerprints.hashes {
                if seen.insert(entry.hash.as_str()) {
                    let posting = postings.entry(entry.hash.clone()).or_default();
                    posting.push(artifact.attempt_id.clone());
                    tracing::trace!(
                        hash = %entry.hash,
                        attempt_id = %artifact.attempt_id,
                        posting_len = posting.len(),
                        "gii hash"
                    );
                }
            }
        }

        postings.retain(|_, attempts| attempts.len() >= 2);

        Self { postings }
    }

    /// Iterate `(hash, posting list)` entries. Order is unspecified.
    pub fn postings(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.postings
            .iter()
            .map(|(hash, attempts)| (hash.as_str(), attempts.as_slice()))
    }

    /// Number of shared hashes in the index.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

// ─── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, FingerprintEntry, Fingerprints};
    use chrono::Utc;

    fn make_artifact(attempt_id: &str, hashes: &[&str]) -> Artifact {
        Artifact {
            email: format!("{attempt_id}@example.com"),
            attempt_id: attempt_id.into(),
            test_id: "t-1".into(),
            drive_id: "d-1".into(),
            difficulty: Difficulty::Medium,
            source_code: String::new(),
            q_id: 1,
            language: "python".into(),
            lang_code: "py".into(),
            tokens: vec![],
            normalized_tokens: vec![],
            ast: None,
            cfg: None,
            fingerprints: Some(Fingerprints {
                hashes: hashes
                    .iter()
                    .enumerate()
                    .map(|(i, h)| FingerprintEntry {
                        hash: (*h).into(),
                        position: i,
                    })
                    .collect(),
            }),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unshared_hashes_are_dropped() {
        let artifacts = vec![
            make_artifact("a1", &["h1", "h2"]),
            make_artifact("a2", &["h2", "h3"]),
        ];
        let gii = GlobalInvertedIndex::build(&artifacts);
        assert_eq!(gii.len(), 1);
        let (hash, attempts) = gii.postings().next().unwrap();
        assert_eq!(hash, "h2");
        assert_eq!(attempts, ["a1".to_string(), "a2".to_string()]);
    }

    #[test]
    fn test_repeated_hash_counts_once_per_attempt() {
        // "h1" appears twice in a1's submission; the posting must still
        // only list a1 once, and the entry survives because a2 has it too.
        let artifacts = vec![
            make_artifact("a1", &["h1", "h1", "h1"]),
            make_artifact("a2", &["h1"]),
        ];
        let gii = GlobalInvertedIndex::build(&artifacts);
        let (_, attempts) = gii.postings().next().unwrap();
        assert_eq!(attempts.len(), 2);
    }

    #[test]
    fn test_missing_fingerprints_are_skipped() {
        let mut bare = make_artifact("a1", &[]);
        bare.fingerprints = None;
        let artifacts = vec![bare, make_artifact("a2", &["h1"])];
        let gii = GlobalInvertedIndex::build(&artifacts);
        assert!(gii.is_empty());
    }

    #[test]
    fn test_three_way_posting() {
        let artifacts = vec![
            make_artifact("a1", &["shared"]),
            make_artifact("a2", &["shared"]),
            make_artifact("a3", &["shared"]),
        ];
        let gii = GlobalInvertedIndex::build(&artifacts);
        let (_, attempts) = gii.postings().next().unwrap();
        assert_eq!(attempts.len(), 3);
    }
}
