//! Cachine error types

use std::fmt;
use std::io;

/// Which of the two wired stores an operation was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreRole {
    /// Source of truth holding the untransformed resource.
    Origin,
    /// Store holding previously derived artifacts.
    Cache,
}

impl StoreRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreRole::Origin => "origin",
            StoreRole::Cache => "cache",
        }
    }
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by a store backend.
///
/// Backends do not know which role they play; the orchestrator attaches a
/// [`StoreRole`] when the error crosses into a request (see
/// [`CachineError::Store`]).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("store is read-only")]
    ReadOnly,
}

impl StoreError {
    /// Classify an I/O error, mapping `ErrorKind::NotFound` to [`StoreError::NotFound`].
    pub fn io(key: impl Into<String>, source: io::Error) -> Self {
        let key = key.into();
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(key)
        } else {
            StoreError::Io { key, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Cachine error types
#[derive(Debug, thiserror::Error)]
pub enum CachineError {
    /// A store operation failed. `role` is set where the failure was observed.
    #[error("{role} store: {source}")]
    Store {
        role: StoreRole,
        #[source]
        source: StoreError,
    },

    // Processing errors
    #[error("transform error: {0}")]
    Transform(String),

    // Input errors
    #[error("invalid properties: {0}")]
    InvalidProperties(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CachineError {
    pub fn store(role: StoreRole, source: StoreError) -> Self {
        CachineError::Store { role, source }
    }

    /// The store the failure is attributed to, if any.
    pub fn role(&self) -> Option<StoreRole> {
        match self {
            CachineError::Store { role, .. } => Some(*role),
            _ => None,
        }
    }

    /// Whether a store reported the key as absent, regardless of role.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CachineError::Store { source, .. } if source.is_not_found())
    }

    /// Whether this is a "not found" raised by the cache store.
    ///
    /// This is the only condition the orchestrator recovers from locally.
    pub fn is_cache_miss(&self) -> bool {
        matches!(
            self,
            CachineError::Store {
                role: StoreRole::Cache,
                source: StoreError::NotFound(_),
            }
        )
    }
}

/// Result type alias for Cachine operations
pub type Result<T> = std::result::Result<T, CachineError>;

/// Result type alias for store backend operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_is_classified() {
        let err = StoreError::io("a/b", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: a/b");
    }

    #[test]
    fn other_io_errors_keep_source() {
        let err = StoreError::io("a/b", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn only_cache_not_found_is_a_miss() {
        let miss = CachineError::store(StoreRole::Cache, StoreError::NotFound("k".into()));
        let origin = CachineError::store(StoreRole::Origin, StoreError::NotFound("k".into()));
        let broken = CachineError::store(StoreRole::Cache, StoreError::Http("503".into()));

        assert!(miss.is_cache_miss());
        assert!(!origin.is_cache_miss());
        assert!(origin.is_not_found());
        assert!(!broken.is_cache_miss());
        assert_eq!(broken.role(), Some(StoreRole::Cache));
    }

    #[test]
    fn display_names_the_store() {
        let err = CachineError::store(StoreRole::Origin, StoreError::NotFound("/x.jpg".into()));
        assert_eq!(err.to_string(), "origin store: not found: /x.jpg");
    }
}
