//! Drive aggregation — roll candidate verdicts into one report
//!
//! The drive verdict is a step function of the flagged fraction: what
//! share of analyzed candidates ended up with any non-clean label. An
//! empty drive is `safe` by definition.

use super::classify::CandidateVerdict;
use crate::model::{AnalysisStatus, CandidateRisk, DriveRisk, TestReport};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Flagged-fraction band edges for the drive verdict.
///
/// `f = 0` is `safe`; `0 < f < high` is `moderate`; `high ≤ f < critical`
/// is `high`; `f ≥ critical` is `critical`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriveRiskBands {
    #[serde(default = "default_high_fraction")]
    pub high: f64,
    #[serde(default = "default_critical_fraction")]
    pub critical: f64,
}

fn default_high_fraction() -> f64 {
    0.10
}
fn default_critical_fraction() -> f64 {
    0.30
}

impl Default for DriveRiskBands {
    fn default() -> Self {
        Self {
            high: default_high_fraction(),
            critical: default_critical_fraction(),
        }
    }
}

impl DriveRiskBands {
    pub fn classify(&self, flagged: usize, total: usize) -> DriveRisk {
        if total == 0 || flagged == 0 {
            return DriveRisk::Safe;
        }
        let fraction = flagged as f64 / total as f64;
        if fraction >= self.critical {
            DriveRisk::Critical
        } else if fraction >= self.high {
            DriveRisk::High
        } else {
            DriveRisk::Moderate
        }
    }
}

/// Build the drive report from every classified candidate. `status` is the
/// caller's call — `completed` only if at least one candidate verdict
/// actually landed in the results store.
pub fn aggregate_drive(
    drive_id: &str,
    verdicts: &[CandidateVerdict],
    bands: &DriveRiskBands,
    status: AnalysisStatus,
) -> TestReport {
    let flagged_candidates = verdicts
        .iter()
        .filter(|v| v.risk != CandidateRisk::Clean)
        .count();

    let flagged_qns: BTreeSet<String> = verdicts
        .iter()
        .flat_map(|v| v.flagged_qns.iter().cloned())
        .collect();

    TestReport {
        drive_id: drive_id.to_string(),
        risk: bands.classify(flagged_candidates, verdicts.len()),
        status,
        flagged_qns,
        flagged_candidates,
        total_analyzed: verdicts.len(),
        created_at: Utc::now(),
    }
}

// ─── Tests ─────────────────────────────────────────────────────────
