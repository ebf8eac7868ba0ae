use thiserror::Error;

/// Errors raised while loading data or driving an evaluation session.
///
/// Numeric degeneracies (no ground truth, zero elapsed time) are not errors;
/// they surface as NaN or infinity in the report.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("evaluation session not started, call reset() first")]
    NotStarted,
    #[error("batch has {inputs} inputs but {outputs} outputs")]
    LengthMismatch { inputs: usize, outputs: usize },
    #[error("image {0} not found in ground truth")]
    UnknownImage(u64),
    #[error(
        "parent id {parent_id} out of range for {instances} instances (parent ids must be dense from 0)"
    )]
    SparseParentId { parent_id: u64, instances: usize },
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error("cannot merge sessions evaluated at different thresholds")]
    IncompatibleThresholds,
    #[error("mask has {actual} pixels, expected {expected}")]
    MaskShape { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
