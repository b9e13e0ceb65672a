use thiserror::Error;

use tokenize::TokenizeError;

/// Errors raised while configuring a similarity feature.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimilarityError {
    #[error("unknown similarity metric '{0}'")]
    UnknownMetric(String),
    #[error("unsupported similarity metric '{metric}' for {context}")]
    UnsupportedMetric { metric: String, context: String },
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
}
