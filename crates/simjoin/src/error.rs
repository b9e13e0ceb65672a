use thiserror::Error;

/// Errors raised while building a similarity join.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JoinError {
    #[error("join threshold must be within [0.0, 1.0], got {0}")]
    InvalidThreshold(f64),
    #[error("length-partition join requires the Jaccard metric, got {0}")]
    UnsupportedMetric(String),
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<(), JoinError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(JoinError::InvalidThreshold(threshold))
    }
}
