use thiserror::Error;

use crate::types::{CollectionKind, EntityId, RemoteId};

/// Failures surfaced by a remote store implementation.
///
/// "Not found" is an explicit variant, dispatched by type at call sites:
/// deletes treat it as success, reads and updates downgrade it to a skip.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("remote transport failure: {0}")]
    Transport(String),

    #[error("remote authentication failed: {0}")]
    Auth(String),

    #[error("remote rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("remote record not found: {0}")]
    NotFound(String),

    #[error("remote container not found: {0}")]
    ContainerNotFound(RemoteId),

    #[error("remote payload malformed: {0}")]
    Malformed(String),
}

impl RemoteError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ContainerNotFound(_))
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited { .. })
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failures surfaced by the local store.
#[derive(Debug, Clone, Error)]
pub enum LocalError {
    #[error("entity not found: {collection} {ref_id}")]
    NotFound {
        collection: CollectionKind,
        ref_id: EntityId,
    },

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("corrupt stored payload: {0}")]
    Corrupt(String),
}

impl LocalError {
    pub fn not_found(collection: CollectionKind, ref_id: &EntityId) -> Self {
        Self::NotFound {
            collection,
            ref_id: ref_id.clone(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn corrupt(err: impl std::fmt::Display) -> Self {
        Self::Corrupt(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type LocalResult<T> = Result<T, LocalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_retryability() {
        assert!(RemoteError::transport("connection reset").is_retryable());
        assert!(RemoteError::RateLimited { retry_after_secs: 30 }.is_retryable());
        assert!(!RemoteError::NotFound("r-9".to_string()).is_retryable());
        assert!(!RemoteError::Auth("bad token".to_string()).is_retryable());
    }

    #[test]
    fn test_local_not_found_display() {
        let err = LocalError::not_found(CollectionKind::Projects, &EntityId::from_index(12));
        assert_eq!(err.to_string(), "entity not found: projects 12");
        assert!(err.is_not_found());
    }
}
