use thiserror::Error;
use ulid::Ulid;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or out-of-range request field. Raised before any lock is taken.
    #[error("invalid request: {0}")]
    Validation(String),
    /// The slot key is already held by the given booking.
    #[error("slot already held by booking {0}")]
    Conflict(Ulid),
    #[error("{0} not found")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    /// A state-machine guard refused the transition.
    #[error("not allowed: {0}")]
    Guard(String),
    /// Journal failure or lock timeout. Nothing was persisted; the caller may retry.
    #[error("store error: {0}")]
    Store(String),
}

impl EngineError {
    pub(crate) fn booking_not_found(id: Ulid) -> Self {
        EngineError::NotFound(format!("booking {id}"))
    }

    pub(crate) fn court_not_found(id: Ulid) -> Self {
        EngineError::NotFound(format!("court {id}"))
    }
}
