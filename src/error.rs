use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Dimension must be at least 1")]
    ZeroDimension,

    #[error("Worker count {workers} must be between 1 and the dimension {dimension}")]
    InvalidWorkerCount { workers: usize, dimension: usize },

    #[error("Vector has length {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Collective buffer size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Count {0} does not fit the communicator's count type")]
    CountOverflow(usize),

    #[error("Communicator poisoned: a peer panicked during a collective")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, Error>;
