//! Orchestrator state machine.

use std::fmt;
use std::time::Instant;

use stepsync_ledger::SyncProgress;

/// The current state of the sync orchestrator.
///
/// ```text
/// Idle ─► Discovering ─► ReadyToSync ─► Syncing ⇄ Paused
///              │                           │  └─► Completed
///              └────────► Failed ◄─────────┘
/// ```
///
/// Any non-active state can be reset back to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// No chunks discovered.
    Idle,
    /// Discovery is running.
    Discovering,
    /// Chunks are discovered and none is synced.
    ReadyToSync {
        /// Ledger progress.
        progress: SyncProgress,
    },
    /// The worker pool is draining unsynced chunks.
    Syncing {
        /// Ledger progress, refreshed after every chunk.
        progress: SyncProgress,
    },
    /// Sync stopped with work remaining.
    Paused {
        /// Ledger progress at the time of pausing.
        progress: SyncProgress,
    },
    /// Every chunk is synced.
    Completed {
        /// Ledger progress.
        progress: SyncProgress,
    },
    /// Discovery or sync failed.
    Failed {
        /// Error description.
        reason: String,
        /// Whether retrying can succeed without a new discovery.
        retryable: bool,
    },
}

impl SyncState {
    /// Derives the resting state from ledger progress.
    pub fn from_progress(progress: SyncProgress) -> Self {
        if progress.total_count == 0 {
            SyncState::Idle
        } else if progress.synced_count == 0 {
            SyncState::ReadyToSync { progress }
        } else if progress.is_complete() {
            SyncState::Completed { progress }
        } else {
            SyncState::Paused { progress }
        }
    }

    /// Returns true while discovery or sync is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Discovering | SyncState::Syncing { .. })
    }

    /// Returns true if a sync run may start.
    pub fn can_start_sync(&self) -> bool {
        matches!(
            self,
            SyncState::ReadyToSync { .. }
                | SyncState::Paused { .. }
                | SyncState::Completed { .. }
                | SyncState::Failed {
                    retryable: true,
                    ..
                }
        )
    }

    /// Returns true if discovery may start.
    pub fn can_discover(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if the ledger and the remote sink may be reset.
    pub fn can_reset(&self) -> bool {
        !self.is_active()
    }

    /// Returns the progress carried by the state, if any.
    pub fn progress(&self) -> Option<SyncProgress> {
        match self {
            SyncState::ReadyToSync { progress }
            | SyncState::Syncing { progress }
            | SyncState::Paused { progress }
            | SyncState::Completed { progress } => Some(*progress),
            SyncState::Idle | SyncState::Discovering | SyncState::Failed { .. } => None,
        }
    }

    /// Returns a short lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Discovering => "discovering",
            SyncState::ReadyToSync { .. } => "ready",
            SyncState::Syncing { .. } => "syncing",
            SyncState::Paused { .. } => "paused",
            SyncState::Completed { .. } => "completed",
            SyncState::Failed { .. } => "failed",
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState::Idle
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Failed { reason, retryable } => {
                let kind = if *retryable { "retryable" } else { "fatal" };
                write!(f, "failed ({kind}): {reason}")
            }
            other => match other.progress() {
                Some(progress) => write!(f, "{} {}", other.name(), progress),
                None => f.write_str(other.name()),
            },
        }
    }
}

/// Counters about sync runs since the orchestrator was created.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Sync runs that drained every chunk.
    pub runs_completed: u64,
    /// Chunks acknowledged by the remote sink.
    pub chunks_synced: u64,
    /// Chunk transfers that failed.
    pub chunks_failed: u64,
    /// Samples accepted by the remote sink.
    pub samples_sent: u64,
    /// Last run end.
    pub last_run: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}
