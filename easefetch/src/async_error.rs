use thiserror::Error;

/// Represents the ways a tracked invocation can fail.
///
/// Producer rejections are carried verbatim in [`AsyncError::Rejected`], so a
/// caller can always get back the exact reason its producer returned. A value
/// that resolved but was refused by the configured type check is reported as
/// [`AsyncError::TypeCheck`] instead, which keeps validation failures
/// distinguishable from producer failures.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum AsyncError<E> {
    /// The producer rejected with this reason.
    #[error("producer rejected: {0:?}")]
    Rejected(E),

    /// The producer resolved, but the value failed the type check.
    #[error("resolved value failed the type check")]
    TypeCheck,

    /// The producer or the type check panicked before the invocation settled.
    #[error("invocation panicked: {0}")]
    Panicked(String),
}

impl<E> AsyncError<E> {
    /// Returns true if the producer itself rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(self, AsyncError::Rejected(_))
    }

    /// Returns true if the failure came from the type check.
    pub fn is_type_check(&self) -> bool {
        matches!(self, AsyncError::TypeCheck)
    }

    pub fn is_panicked(&self) -> bool {
        matches!(self, AsyncError::Panicked(_))
    }

    /// Returns the producer's rejection reason, if that is what this is.
    pub fn rejection(&self) -> Option<&E> {
        match self {
            AsyncError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn into_rejection(self) -> Option<E> {
        match self {
            AsyncError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Failures of a storage backend.
///
/// These never leave the cache layer: every one of them degrades to a cache
/// miss or a skipped write.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend is disabled or absent in this host.
    #[error("storage backend is unavailable")]
    Unavailable,

    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Invalid cache configuration.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
    #[error("cache key must not be empty when caching is configured")]
    EmptyCacheKey,

    #[error("invalid cache configuration: {0}")]
    Parse(String),
}
