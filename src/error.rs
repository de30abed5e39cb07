use std::collections::TryReserveError;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexStatError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexStatError {
    // API misuse: query before publish, double bind, malformed bounds
    #[error("usage error: {0}")]
    Usage(String),

    // A generation failed its invariant checks and was discarded
    #[error("invalid cache: {0}")]
    InvalidCache(String),

    // Codec contract violations (overflow, component count, type mismatch)
    #[error("internal error: {0}")]
    Internal(String),

    #[error("out of memory: {0}")]
    NoMem(String),
}

impl IndexStatError {
    pub fn usage(msg: impl Into<String>) -> Self {
        IndexStatError::Usage(msg.into())
    }

    pub fn invalid_cache(msg: impl Into<String>) -> Self {
        IndexStatError::InvalidCache(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        IndexStatError::Internal(msg.into())
    }

    pub fn no_mem(msg: impl Into<String>) -> Self {
        IndexStatError::NoMem(msg.into())
    }
}

impl From<TryReserveError> for IndexStatError {
    fn from(err: TryReserveError) -> Self {
        IndexStatError::NoMem(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_reserve_maps_to_no_mem() {
        let mut v: Vec<u8> = Vec::new();
        let err: IndexStatError = v.try_reserve_exact(usize::MAX).unwrap_err().into();
        assert!(matches!(err, IndexStatError::NoMem(_)));
    }

    #[test]
    fn test_display() {
        let err = IndexStatError::usage("no index bound");
        assert_eq!(err.to_string(), "usage error: no index bound");
    }
}
