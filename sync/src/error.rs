//! Error types for the reconciliation engine.

use alm_core::{CollectionKind, LocalError, RemoteError, RemoteId};
use thiserror::Error;

/// Failures that can surface from a sync run.
///
/// Only a subset of these ever reaches the caller as `Err`: bad requests,
/// violated invariants, lock file trouble and local storage trouble. Remote
/// transport failures abort the run but are reported on the [`SyncReport`]
/// instead, so the committed prefix of the run stays visible to the caller.
///
/// [`SyncReport`]: crate::report::SyncReport
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote store failure while syncing {collection}: {source}")]
    Remote {
        collection: CollectionKind,
        #[source]
        source: RemoteError,
    },

    #[error("local store failure: {0}")]
    Local(#[from] LocalError),

    #[error("record {remote_id} in {collection} does not fit the schema: {detail}")]
    SchemaMismatch {
        collection: CollectionKind,
        remote_id: RemoteId,
        detail: String,
    },

    #[error("invalid sync request: {0}")]
    InvalidRequest(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("lock file failure: {0}")]
    Lock(String),
}

impl SyncError {
    pub fn remote(collection: CollectionKind, source: RemoteError) -> Self {
        Self::Remote { collection, source }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }

    pub fn lock(message: impl std::fmt::Display) -> Self {
        Self::Lock(message.to_string())
    }

    /// True for failures that abort the run but should be reported on the
    /// sync report rather than returned as `Err`.
    pub fn is_reportable_abort(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
