use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("malformed snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
