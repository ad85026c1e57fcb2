use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The row does not exist, or the caller's scope cannot see it.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The write contradicts current state (occupied unit, settled
    /// payment, duplicate filing).
    #[error("{0}")]
    Conflict(String),
    /// The row exists and is visible, but this actor may not mutate it.
    #[error("{0}")]
    Denied(&'static str),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store connection lock poisoned")]
    LockPoisoned,
}

/// Map a unique/check constraint violation to a domain conflict; pass
/// everything else through as a database error.
pub(crate) fn constraint_to_conflict(err: rusqlite::Error, conflict: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(conflict.to_string())
        }
        _ => StoreError::from(err),
    }
}
