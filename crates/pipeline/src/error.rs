use similarity::SimilarityError;
use thiserror::Error;

/// Failure reported by a generator or matcher implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("stage failed: {0}")]
    Failed(String),
    #[error("invalid stage input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
}

/// Errors surfaced by [`Pipeline`](crate::Pipeline) operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The pipeline, or a requested reconfiguration, is not valid. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A generator or matcher failed during `run_pipeline`; propagated as-is.
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, PipelineError::Configuration(_))
    }
}
