//! Merkle AST hashing — structural code identity that survives renaming
//!
//! Token-level fingerprints catch copied text; subtree hashes catch copied
//! *structure*. Every node gets a deterministic digest of its own attributes
//! and its children's digests, so two submissions that share an algorithm
//! share subtree hashes even after every identifier is renamed.
//!
//! Canonicalization rules:
//!
//! - `modifiers` and `parameters` are sorted before hashing — declaration
//!   order there is irrelevant (`static final` ≡ `final static`)
//! - `children` keep their original order — if/else arm order matters
//! - duplicate subtrees collapse into one set entry (the similarity score
//!   measures *which* structures are shared, not how often they repeat)

use crate::model::AstNode;
use crate::{AegisError, AegisResult};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Recursion guard. Owned children make cycles impossible by construction,
/// so pathological depth is the remaining way a hostile artifact could blow
/// the stack.
pub const MAX_AST_DEPTH: usize = 512;

/// Compute the set of subtree hashes for an AST, one per node, post-order.
///
/// Errors with [`AegisError::AstTooDeep`] past [`MAX_AST_DEPTH`] levels;
/// the scorer maps that to a zero structural score for the pair.
pub fn subtree_hashes(root: &AstNode) -> AegisResult<HashSet<String>> {
    let mut hashes = HashSet::new();
    hash_subtree(root, 0, &mut hashes)?;
    Ok(hashes)
}

/// Post-order walk: children first, then this node's digest over its own
/// attributes plus the child digests. Returns the node's hash so the parent
/// can fold it in.
fn hash_subtree(
    node: &AstNode,
    depth: usize,
    out: &mut HashSet<String>,
) -> AegisResult<String> {
    if depth >= MAX_AST_DEPTH {
        return Err(AegisError::AstTooDeep(MAX_AST_DEPTH));
    }

    let mut child_hashes = Vec::with_capacity(node.children.len());
    for child in &node.children {
        child_hashes.push(hash_subtree(child, depth + 1, out)?);
    }

    let hash = node_hash(node, &child_hashes);
    out.insert(hash.clone());
    Ok(hash)
}

/// Serialize a node into its canonical byte sequence and digest it.
///
/// Parts are `|`-joined; optional attributes are omitted entirely when
/// empty so `{name: ""}` and `{}` hash identically.
fn node_hash(node: &AstNode, child_hashes: &[String]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(7);

    parts.push(format!("type:{}", node.node_type));

    if let Some(name) = non_empty(&node.name) {
        parts.push(format!("name:{name}"));
    }
    if let Some(return_type) = non_empty(&node.return_type) {
        parts.push(format!("return:{return_type}"));
    }
    if let Some(operator) = non_empty(&node.operator) {
        parts.push(format!("op:{operator}"));
    }

    if !node.modifiers.is_empty() {
        let mut modifiers = node.modifiers.clone();
        modifiers.sort_unstable();
        parts.push(format!("modifiers:{}", modifiers.join(",")));
    }

    if !node.parameters.is_empty() {
        let mut params: Vec<String> = node
            .parameters
            .iter()
            .map(|p| match p.param_type.as_deref() {
                Some(pt) if !pt.is_empty() => format!("{}:{}:{}", p.param_kind, p.name, pt),
                _ => format!("{}:{}", p.param_kind, p.name),
            })
            .collect();
        params.sort_unstable();
        parts.push(format!("params:{}", params.join(",")));
    }

    // Child order is load-bearing: an if/else with swapped arms is a
    // different structure and must hash differently.
    if !child_hashes.is_empty() {
        parts.push(format!("children:{}", child_hashes.join(",")));
    }

    hex::encode(Sha256::digest(parts.join("|").as_bytes()))
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Structural similarity between two optional ASTs:
/// `|A ∩ B| / min(|A|, |B|)` over the subtree-hash sets, in `[0.0, 1.0]`.
///
/// Missing or empty ASTs score `0.0` — a submission without a skeleton
/// simply cannot match anyone on this axis. A depth-cap rejection is
/// logged and scored `0.0` the same way.
pub fn ast_similarity(a: Option<&AstNode>, b: Option<&AstNode>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };

    let hashes_a = match subtree_hashes(a) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!("AST rejected, scoring 0 on structural axis: {e}");
            return 0.0;
        }
    };
    let hashes_b = match subtree_hashes(b) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!("AST rejected, scoring 0 on structural axis: {e}");
            return 0.0;
        }
    };

    if hashes_a.is_empty() || hashes_b.is_empty() {
        return 0.0;
    }

    let common = hashes_a.intersection(&hashes_b).count();
    let min_total = hashes_a.len().min(hashes_b.len());
    common as f64 / min_total as f64
}

// ─── Tests ─────────────────────────────────────────────────────────
