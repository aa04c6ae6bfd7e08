//! Prometheus instruments for the analysis surface
//!
//! All instruments live on one explicit [`Registry`] owned by
//! [`AegisMetrics`] — nothing registers globally, so tests can build as
//! many registries as they like and process bootstrap decides what gets
//! exposed on `/metrics`.

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
};

/// `reason` label values for `aegis_invalid_submissions_total`.
pub mod reason {
    pub const INVALID_REQUEST_BODY: &str = "invalid_request_body";
    pub const MISSING_DRIVE_ID: &str = "missing_drive_id";
    pub const NO_ARTIFACTS: &str = "no_artifacts";
    pub const ASTRA_PREPROCESS_ERROR: &str = "astra_preprocess_error";
    pub const MONGO_NO_CANDIDATE_REPORTS: &str = "mongo_no_candidate_reports";
    pub const MONGO_NO_DOCUMENT_PLAGIARISM_REPORTS: &str = "mongo_no_document_plagiarism_reports";
    pub const FAILED_TO_UPDATE_CANDIDATE_RESULT: &str = "failed_to_update_candidate_result";
}

pub struct AegisMetrics {
    registry: Registry,
    /// Requests to the /compute API.
    pub compute_requests_total: IntCounter,
    /// Requests to the /api/v1/preprocess API (bumped by the front-end).
    pub preprocess_requests_total: IntCounter,
    /// Invalid submissions, labelled by reason.
    pub invalid_submissions_total: IntCounterVec,
    /// Candidates at `highly_suspicious` or above, labelled by drive.
    pub high_plagiarisms_detected_total: IntCounterVec,
    /// Wall time of one drive analysis.
    pub plagiarism_computation_duration_seconds: Histogram,
}

impl AegisMetrics {
    /// Build the instruments and register them on a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let compute_requests_total = IntCounter::new(
            "aegis_compute_requests_total",
            "Total number of requests to /compute API",
        )?;
        let preprocess_requests_total = IntCounter::new(
            "aegis_preprocess_requests_total",
            "Total number of requests to /api/v1/preprocess API",
        )?;
        let invalid_submissions_total = IntCounterVec::new(
            Opts::new(
                "aegis_invalid_submissions_total",
                "Total number of invalid submissions",
            ),
            &["reason"],
        )?;
        let high_plagiarisms_detected_total = IntCounterVec::new(
            Opts::new(
                "aegis_high_plagiarisms_detected_total",
                "Total number of high plagiarisms detected (candidates at \
                 highly_suspicious or near_copy) per /compute request",
            ),
            &["drive_id"],
        )?;
        let plagiarism_computation_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "aegis_plagiarism_computation_duration_seconds",
            "Time taken to compute plagiarism for each request",
        ))?;

        registry.register(Box::new(compute_requests_total.clone()))?;
        registry.register(Box::new(preprocess_requests_total.clone()))?;
        registry.register(Box::new(invalid_submissions_total.clone()))?;
        registry.register(Box::new(high_plagiarisms_detected_total.clone()))?;
        registry.register(Box::new(plagiarism_computation_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            compute_requests_total,
            preprocess_requests_total,
            invalid_submissions_total,
            high_plagiarisms_detected_total,
            plagiarism_computation_duration_seconds,
        })
    }

    /// The registry carrying every instrument, for the exposition endpoint.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_invalid(&self, reason: &str) {
        self.invalid_submissions_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_high_plagiarism(&self, drive_id: &str) {
        self.high_plagiarisms_detected_total
            .with_label_values(&[drive_id])
            .inc();
    }
}

// ─── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder as _;

    #[test]
    fn test_instrument_names_are_exact() {
        let metrics = AegisMetrics::new().unwrap();
        metrics.compute_requests_total.inc();
        metrics.record_invalid(reason::NO_ARTIFACTS);
        metrics.record_high_plagiarism("d-1");
        metrics.plagiarism_computation_duration_seconds.observe(0.25);

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&metrics.registry().gather(), &mut buffer)
            .unwrap();
        let exposition = String::from_utf8(buffer).unwrap();

        for expected in [
            "aegis_compute_requests_total 1",
            "aegis_invalid_submissions_total{reason=\"no_artifacts\"} 1",
            "aegis_high_plagiarisms_detected_total{drive_id=\"d-1\"} 1",
            "aegis_plagiarism_computation_duration_seconds_count 1",
        ] {
            assert!(exposition.contains(expected), "missing {expected}");
        }
    }

    #[test]
    fn test_reason_labels_partition_counts() {
        let metrics = AegisMetrics::new().unwrap();
        metrics.record_invalid(reason::MISSING_DRIVE_ID);
        metrics.record_invalid(reason::MISSING_DRIVE_ID);
        metrics.record_invalid(reason::NO_ARTIFACTS);

        assert_eq!(
            metrics
                .invalid_submissions_total
                .with_label_values(&[reason::MISSING_DRIVE_ID])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .invalid_submissions_total
                .with_label_values(&[reason::NO_ARTIFACTS])
                .get(),
            1
        );
    }

    #[test]
    fn test_registries_are_independent() {
        // Two instances must not collide — nothing is global.
        let first = AegisMetrics::new().unwrap();
        let second = AegisMetrics::new().unwrap();
        first.compute_requests_total.inc();
        assert_eq!(second.compute_requests_total.get(), 0);
    }
}
