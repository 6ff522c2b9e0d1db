//! Error types for the sync engine.

use stepsync_ledger::LedgerError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during discovery and sync.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error talking to the remote sink.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote sink answered with a non-2xx status.
    #[error("remote sink returned {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error text from the `{"error": ...}` body, or the raw body.
        message: String,
    },

    /// Protocol error (response body could not be decoded).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A source oracle failed.
    #[error("source error: {0}")]
    Source(String),

    /// An oracle failed while partitioning. The ledger has already been
    /// cleared; discovery must be restarted.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// A chunk transfer failed. Chunks synced before the failure are untouched.
    #[error("sync failed: {reason}")]
    SyncFailure {
        /// What went wrong.
        reason: String,
        /// Whether retrying the sync can succeed.
        retryable: bool,
    },

    /// Ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Invalid caller input (inverted range, zero budget, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation observed cancellation.
    #[error("sync cancelled")]
    Cancelled,

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// Not connected.
    #[error("not connected to remote sink")]
    NotConnected,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a source error.
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::SyncFailure { retryable, .. } => *retryable,
            SyncError::Server { status, .. } => *status >= 500 || *status == 429,
            SyncError::Timeout => true,
            SyncError::NotConnected => true,
            SyncError::Source(_) => true,
            _ => false,
        }
    }

    /// Returns true if this is a [`SyncError::Discovery`] failure.
    pub fn is_discovery_failure(&self) -> bool {
        matches!(self, SyncError::Discovery(_))
    }
}
