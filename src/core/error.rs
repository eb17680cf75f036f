//! Typed errors for the job store
//!
//! # Error Categories
//!
//! - [`ClientError`]: failures reported by a [`RecordStoreClient`](crate::core::RecordStoreClient)
//! - [`LoadError`]: bulk load failures; these invalidate the session
//! - [`DeliveryError`]: a single pushed event could not be decoded
//! - [`SyncError`]: the top-level error returned by [`JobsStore`](crate::store::JobsStore)
//!
//! # Example
//!
//! ```rust,ignore
//! match store.load().await {
//!     Ok(jobs) => render(jobs),
//!     Err(SyncError::Load(e)) if e.invalidates_session() => auth.clear(),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use thiserror::Error;

/// Errors surfaced by the remote record store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The request carried no valid credentials
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The record does not exist remotely
    #[error("{collection} record '{id}' not found")]
    NotFound { collection: String, id: String },

    /// The remote store could not be reached
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The remote store refused the request
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl ClientError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Unauthorized { .. } => "CLIENT_UNAUTHORIZED",
            ClientError::NotFound { .. } => "CLIENT_NOT_FOUND",
            ClientError::Transport { .. } => "CLIENT_TRANSPORT",
            ClientError::Rejected { .. } => "CLIENT_REJECTED",
        }
    }
}

/// Bulk load failures
///
/// Every variant is treated as fail-closed: the caller drops its stored
/// credentials rather than retrying.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Cannot load jobs without a valid identity")]
    Unauthenticated,

    #[error("Failed to fetch jobs: {0}")]
    Remote(#[source] ClientError),
}

impl LoadError {
    pub fn invalidates_session(&self) -> bool {
        matches!(self, LoadError::Unauthenticated | LoadError::Remote(_))
    }
}

/// A pushed event that could not be applied
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Malformed change event: {message}")]
    Malformed { message: String },
}

/// The main error type returned by the store
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The id is not in the local collection
    #[error("Job '{id}' not found in local collection")]
    NotFound { id: String },

    #[error(transparent)]
    Remote(#[from] ClientError),

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl SyncError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Load(LoadError::Unauthenticated) => "LOAD_UNAUTHENTICATED",
            SyncError::Load(LoadError::Remote(_)) => "LOAD_FAILED",
            SyncError::NotFound { .. } => "JOB_NOT_FOUND",
            SyncError::Remote(e) => e.error_code(),
            SyncError::Config { .. } => "CONFIG_ERROR",
        }
    }

    /// Whether the caller should drop stored credentials
    pub fn invalidates_session(&self) -> bool {
        match self {
            SyncError::Load(e) => e.invalidates_session(),
            _ => false,
        }
    }

    /// Errors that leave all state untouched and need no recovery
    pub fn is_local_noop(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
