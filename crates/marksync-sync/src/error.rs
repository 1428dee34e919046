//! Error types for the sync module.

use std::fmt;

use thiserror::Error;

use marksync_core::CoreError;
use marksync_store::StoreError;

/// Why a device may not sync right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    /// Connectivity reports no network.
    Offline,
    /// No valid credential is held.
    Unauthenticated,
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligibility::Offline => write!(f, "offline"),
            Ineligibility::Unauthenticated => write!(f, "not logged in"),
        }
    }
}

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Offline or unauthenticated. Only surfaced for forced syncs.
    #[error("cannot sync: {0}")]
    NotEligible(Ineligibility),

    /// Another round trip is already in flight.
    #[error("a sync is already in progress")]
    AlreadySyncing,

    /// The network exchange failed (connection, timeout, encoding).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected the credential. It has been invalidated locally.
    #[error("unauthorized: credential rejected by server")]
    Unauthorized,

    /// The server answered with a non-success status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The server answered with a body that is not a sync response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Coarse classification of [`SyncError`] for callers that only need to
/// decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Ineligible,
    ConcurrentSync,
    Transport,
    Unauthorized,
    Storage,
}

impl SyncError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::NotEligible(_) => ErrorKind::Ineligible,
            SyncError::AlreadySyncing => ErrorKind::ConcurrentSync,
            SyncError::Transport(_) | SyncError::Server { .. } | SyncError::InvalidResponse(_) => {
                ErrorKind::Transport
            }
            SyncError::Unauthorized => ErrorKind::Unauthorized,
            SyncError::Store(_) => ErrorKind::Storage,
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Decoding(msg) => SyncError::InvalidResponse(msg),
            CoreError::Encoding(msg) => SyncError::Transport(msg),
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
