//! Pair scoring — two independent signals per worthy pair
//!
//! - **Code similarity** comes straight from the fingerprint overlap that
//!   made the pair worthy: token-window matches, cheap and rename-blind.
//! - **Algo similarity** is the Merkle subtree overlap: structure matches
//!   that survive aggressive renaming and reformatting.
//!
//! Both are integer percentages so persisted rows compare exactly across
//! re-runs. Either signal alone can carry a pair over the risk bars.

use super::ast::ast_similarity;
use super::pairs::CandidatePair;
use serde::{Deserialize, Serialize};

/// Scores for one worthy pair, both in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairScore {
    pub code_similarity: u32,
    pub algo_similarity: u32,
}

impl PairScore {
    /// The stronger of the two signals, used for risk classification.
    pub fn strongest(&self) -> u32 {
        self.code_similarity.max(self.algo_similarity)
    }
}

/// Score a worthy pair on both axes.
///
/// Code similarity is the pair's overlap fraction scaled to a percentage;
/// algo similarity is the AST subtree overlap, `0` when either side has no
/// usable skeleton.
pub fn score_pair(pair: &CandidatePair<'_>) -> PairScore {
    PairScore {
        code_similarity: to_percent(pair.overlap),
        algo_similarity: to_percent(ast_similarity(pair.a.ast.as_ref(), pair.b.ast.as_ref())),
    }
}

fn to_percent(fraction: f64) -> u32 {
    (fraction * 100.0).round().clamp(0.0, 100.0) as u32
}

// ─── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Artifact, AstNode, Difficulty, FingerprintEntry, Fingerprints};
    use chrono::Utc;

    fn leaf(node_type: &str) -> AstNode {
        AstNode {
            node_type: node_type.into(),
            name: None,
            return_type: None,
            operator: None,
            modifiers: vec![],
            parameters: vec![],
            children: vec![],
        }
    }

    fn make_artifact(attempt_id: &str, hashes: &[&str], ast: Option<AstNode>) -> Artifact {
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
            ast,
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
    fn test_identical_pair_scores_100_on_both_axes() {
        let tree = AstNode {
            children: vec![leaf("IfStmt"), leaf("ReturnStmt")],
            ..leaf("FunctionDecl")
        };
        let a = make_artifact("a1", &["h1", "h2"], Some(tree.clone()));
        let b = make_artifact("a2", &["h1", "h2"], Some(tree));
        let pair = CandidatePair {
            a: &a,
            b: &b,
            shared: 2,
            overlap: 1.0,
        };
        let score = score_pair(&pair);
        assert_eq!(score.code_similarity, 100);
        assert_eq!(score.algo_similarity, 100);
    }

    #[test]
    fn test_symmetry() {
        let tree_a = AstNode {
            children: vec![leaf("IfStmt"), leaf("ReturnStmt")],
            ..leaf("FunctionDecl")
        };
        let tree_b = AstNode {
            children: vec![leaf("IfStmt"), leaf("ForLoop")],
            ..leaf("FunctionDecl")
        };
        let a = make_artifact("a1", &["h1", "h2", "h3"], Some(tree_a));
        let b = make_artifact("a2", &["h1", "h4", "h5"], Some(tree_b));
        let forward = score_pair(&CandidatePair {
            a: &a,
            b: &b,
            shared: 1,
            overlap: 1.0 / 3.0,
        });
        let backward = score_pair(&CandidatePair {
            a: &b,
            b: &a,
            shared: 1,
            overlap: 1.0 / 3.0,
        });
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_missing_ast_zeroes_algo_axis_only() {
        let a = make_artifact("a1", &["h1"], None);
        let b = make_artifact("a2", &["h1"], None);
        let score = score_pair(&CandidatePair {
            a: &a,
            b: &b,
            shared: 1,
            overlap: 0.10,
        });
        assert_eq!(score.code_similarity, 10);
        assert_eq!(score.algo_similarity, 0);
    }

    #[test]
    fn test_percent_rounds_to_nearest() {
        assert_eq!(to_percent(0.104), 10);
        assert_eq!(to_percent(0.105), 11);
        assert_eq!(to_percent(1.0 / 3.0), 33);
    }

    #[test]
    fn test_strongest_takes_either_axis() {
        let score = PairScore {
            code_similarity: 20,
            algo_similarity: 90,
        };
        assert_eq!(score.strongest(), 90);
    }
}
