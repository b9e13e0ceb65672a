//! Bridge from [`PipelineMetrics`] to the `metrics` facade.
//!
//! Install any `metrics` recorder (Prometheus exporter, statsd, ...) in the
//! application and attach a [`MetricsRecorder`] to each pipeline with
//! [`Pipeline::with_metrics`](pipeline::Pipeline::with_metrics).

use std::time::Duration;

use metrics::{counter, histogram};
use pipeline::{GenerationStrategy, PipelineMetrics, StageError};

pub const GENERATION_SECONDS: &str = "erflow_generation_seconds";
pub const STAGE_SECONDS: &str = "erflow_stage_seconds";
pub const MATCHING_SECONDS: &str = "erflow_matching_seconds";
pub const CANDIDATE_PAIRS_TOTAL: &str = "erflow_candidate_pairs_total";
pub const MATCHED_PAIRS_TOTAL: &str = "erflow_matched_pairs_total";
pub const STAGE_FAILURES_TOTAL: &str = "erflow_stage_failures_total";

/// Records pipeline timings and counts, labelled by table.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    table: String,
}

impl MetricsRecorder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl PipelineMetrics for MetricsRecorder {
    fn record_generation(&self, strategy: GenerationStrategy, latency: Duration, output_count: usize) {
        let labels = [
            ("table", self.table.clone()),
            ("strategy", strategy.as_str().to_string()),
        ];
        histogram!(GENERATION_SECONDS, &labels).record(latency.as_secs_f64());
        if strategy == GenerationStrategy::Join {
            counter!(CANDIDATE_PAIRS_TOTAL, &labels).increment(output_count as u64);
        }
    }

    fn record_stage(&self, stage: &str, latency: Duration, result: Result<usize, &StageError>) {
        let labels = [("table", self.table.clone()), ("stage", stage.to_string())];
        histogram!(STAGE_SECONDS, &labels).record(latency.as_secs_f64());
        if result.is_err() {
            counter!(STAGE_FAILURES_TOTAL, &labels).increment(1);
        }
    }

    fn record_matching(&self, latency: Duration, _stage_count: usize, pair_count: usize) {
        histogram!(MATCHING_SECONDS, "table" => self.table.clone()).record(latency.as_secs_f64());
        counter!(MATCHED_PAIRS_TOTAL, "table" => self.table.clone()).increment(pair_count as u64);
    }
}
