// Observability hooks for pipeline runs.
//
// A `PipelineMetrics` sink is injected per pipeline. Every timing and count
// reported here is informational; the pipeline never branches on it.
use std::fmt;
use std::time::Duration;

use crate::error::StageError;

/// How candidates were generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStrategy {
    Blocking,
    Join,
}

impl GenerationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStrategy::Blocking => "blocking",
            GenerationStrategy::Join => "join",
        }
    }
}

impl fmt::Display for GenerationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics observer for pipeline runs.
pub trait PipelineMetrics: Send + Sync {
    /// `output_count` is the number of candidate pairs for a join and the
    /// number of blocks for a blocker.
    fn record_generation(&self, strategy: GenerationStrategy, latency: Duration, output_count: usize);

    /// One matcher invocation. `Ok` carries the number of pairs it returned.
    fn record_stage(&self, stage: &str, latency: Duration, result: Result<usize, &StageError>);

    /// The whole matching phase, recorded only when it completes.
    fn record_matching(&self, latency: Duration, stage_count: usize, pair_count: usize);
}
