use thiserror::Error;

/// Errors that can occur when selecting a tokenizer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("unknown tokenizer '{0}' (expected WhiteSpace or WhiteSpaceAndPunc)")]
    UnknownTokenizer(String),
}
