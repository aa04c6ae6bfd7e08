//! # aegis — Drive-Level Plagiarism Analysis Engine
//!
//! Detects source-code plagiarism across a cohort of candidate submissions
//! belonging to a single *drive* (an examination event). Submissions arrive
//! pre-parsed as **artifacts** — syntactic skeleton, token streams, and
//! locality-sensitive fingerprints — produced by an upstream preprocess
//! service. The engine never touches raw source.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      AegisEngine                            │
//! │  ┌───────────┐ ┌───────────┐ ┌──────────┐ ┌─────────────┐  │
//! │  │ Artifact  │ │ Per-qId   │ │ Retry +  │ │  Metrics    │  │
//! │  │ Store     │ │ Pipeline  │ │ DeadLtr  │ │  Registry   │  │
//! │  └─────┬─────┘ └─────┬─────┘ └────┬─────┘ └──────┬──────┘  │
//! │        │             │            │              │          │
//! │  ┌─────▼─────────────▼────────────▼──────────────▼───────┐  │
//! │  │  GII → Worthy Pairs → Pair Scoring (rayon parallel)   │  │
//! │  │       Merkle AST hashing │ Fingerprint overlap        │  │
//! │  └────────────────────────┬──────────────────────────────┘  │
//! │                           │                                 │
//! │  ┌────────────────────────▼──────────────────────────────┐  │
//! │  │ Candidate Tally → Risk Labels → Drive Report → Store  │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Capabilities
//!
//! - **Global Inverted Index**: fingerprint hash → posting list, pruned to
//!   hashes shared by ≥2 attempts, avoiding the naive O(N²) sweep
//! - **Worthy-pair selection**: difficulty-keyed overlap thresholds gate
//!   which pairs are worth scoring
//! - **Merkle AST hashing**: deterministic subtree fingerprints, insensitive
//!   to modifier/parameter declaration order, sensitive to child order
//! - **Dual-signal scoring**: token-level (code) and structural (algo)
//!   percentages per pair; a strong match on either axis is enough to flag
//! - **Risk classification**: per-candidate labels with peer clusters,
//!   rolled up into a per-drive verdict
//! - **Failure isolation**: per-candidate persistence failures retry with
//!   exponential backoff and dead-letter on exhaustion without sinking the
//!   drive report

pub mod model;
pub mod analysis;
pub mod engine;
pub mod storage;
pub mod metrics;
pub mod cancel;

// Re-exports for convenience
pub use model::{
    AnalysisStatus, Artifact, AstNode, CandidateResult, CandidateRisk, Difficulty, DriveRisk,
    TestReport,
};
pub use engine::{AegisEngine, AnalysisConfig, DriveRunSummary};
pub use storage::{ArtifactStore, DeadLetterSink, ResultsStore};
pub use metrics::AegisMetrics;
pub use cancel::CancelFlag;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AegisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("AST exceeds maximum depth of {0}")]
    AstTooDeep(usize),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("artifact store unavailable: {0}")]
    Fatal(String),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type AegisResult<T> = Result<T, AegisError>;
