use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConceptReviewError {
    #[error("phase {requested} cannot run yet: {current} phase(s) completed, next runnable phase is {}", current + 1)]
    Sequencing { requested: u8, current: u8 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unknown phase number {0}: must be between 1 and 4")]
    UnknownPhase(u8),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConceptReviewError>;
