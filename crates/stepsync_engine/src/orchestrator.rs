//! Sync orchestrator.
//!
//! Owns the state machine and drives discovery and sync against the injected
//! oracles, ledger and remote sink.
//!
//! ## Sync run
//!
//! Unsynced chunks are read from the ledger and drained by a pool of at most
//! `max_concurrent_chunks` tasks. Whenever one finishes, the next queued
//! chunk starts immediately. Workers observe cancellation at the fetch and
//! append boundaries and never mark a chunk they did not see acknowledged.
//!
//! A run ends in one of three ways:
//!
//! - every chunk synced: `Completed`
//! - [`pause`](SyncOrchestrator::pause) was called: `Paused`
//! - a chunk failed: siblings are cancelled, `Failed { retryable: true }`

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use stepsync_ledger::{Chunk, ChunkId, DateRange, Ledger, SyncProgress};
use stepsync_protocol::Sample;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::marks::{MarkHandle, MarkWriter};
use crate::partition::Partitioner;
use crate::source::{AggregateOracle, RawEvent, RawFetchOracle};
use crate::state::{SyncState, SyncStats};
use crate::transport::RemoteSink;

type ChunkOutcome = Result<(ChunkId, usize), (ChunkId, SyncError)>;

/// Fetches, converts and appends a single chunk.
struct ChunkWorker<R, S> {
    raw: Arc<R>,
    sink: Arc<S>,
}

impl<R, S> Clone for ChunkWorker<R, S> {
    fn clone(&self) -> Self {
        Self {
            raw: Arc::clone(&self.raw),
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<R: RawFetchOracle, S: RemoteSink> ChunkWorker<R, S> {
    async fn transfer(&self, chunk: &Chunk, cancel: &CancellationToken) -> SyncResult<usize> {
        let range = chunk.range().ok_or_else(|| {
            SyncError::InvalidArgument(format!("chunk {} has an empty window", chunk.id))
        })?;

        let events = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SyncError::Cancelled),
            fetched = self.raw.fetch(range) => fetched?,
        };

        let samples: Vec<Sample> = events.iter().map(RawEvent::to_sample).collect();
        let sent = samples.len();

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SyncError::Cancelled),
            appended = self.sink.append(samples) => appended?,
        };

        debug!(chunk = %chunk.id, %range, sent, saved = response.saved, "chunk transferred");
        Ok(response.saved)
    }
}

/// Drives discovery and resumable sync.
///
/// # Example
///
/// ```no_run
/// use stepsync_engine::{MockSink, SyncConfig, SyncOrchestrator, SyntheticConfig, SyntheticSource};
/// use stepsync_ledger::{DateRange, InMemoryLedger};
/// use std::sync::Arc;
///
/// # async fn demo(history: DateRange) -> stepsync_engine::SyncResult<()> {
/// let source = Arc::new(SyntheticSource::new(SyntheticConfig::new(7, history))?);
/// let orchestrator = SyncOrchestrator::new(
///     SyncConfig::default(),
///     Arc::clone(&source),
///     source,
///     MockSink::new(),
///     InMemoryLedger::new(),
/// );
///
/// orchestrator.discover(history).await?;
/// let progress = orchestrator.sync().await?;
/// assert!(progress.is_complete());
/// # Ok(())
/// # }
/// ```
pub struct SyncOrchestrator<A, R, S, L> {
    config: SyncConfig,
    partitioner: Partitioner,
    aggregate: Arc<A>,
    worker: ChunkWorker<R, S>,
    ledger: Arc<L>,
    state: watch::Sender<SyncState>,
    run: Mutex<Option<CancellationToken>>,
    stats: RwLock<SyncStats>,
}

impl<A, R, S, L> SyncOrchestrator<A, R, S, L>
where
    A: AggregateOracle + 'static,
    R: RawFetchOracle + 'static,
    S: RemoteSink + 'static,
    L: Ledger + 'static,
{
    /// Creates an orchestrator in the `Idle` state.
    ///
    /// Call [`restore`](Self::restore) to pick up a persisted ledger.
    pub fn new(config: SyncConfig, aggregate: A, raw: R, sink: S, ledger: L) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            partitioner: Partitioner::new(config.partition.clone()),
            config,
            aggregate: Arc::new(aggregate),
            worker: ChunkWorker {
                raw: Arc::new(raw),
                sink: Arc::new(sink),
            },
            ledger: Arc::new(ledger),
            state,
            run: Mutex::new(None),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the current state.
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Returns progress computed from the ledger.
    pub fn progress(&self) -> SyncResult<SyncProgress> {
        Ok(self.ledger.progress()?)
    }

    /// Returns run statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Returns the remote sink.
    pub fn sink(&self) -> &S {
        &self.worker.sink
    }

    /// Rederives the state from the ledger.
    ///
    /// # Errors
    ///
    /// Refused while discovery or sync is running.
    pub fn restore(&self) -> SyncResult<SyncState> {
        let next = SyncState::from_progress(self.ledger.progress()?);
        self.begin("restored", |state| !state.is_active(), next.clone())?;
        info!(state = %next, "state restored from ledger");
        Ok(next)
    }

    /// Replaces the ledger with a fresh partition of `range`.
    ///
    /// The ledger is cleared before the first oracle call; a failed run
    /// leaves it empty and the state `Failed { retryable: false }`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Discovery`] if an oracle call fails.
    pub async fn discover(&self, range: DateRange) -> SyncResult<SyncProgress> {
        self.begin("discovering", SyncState::can_discover, SyncState::Discovering)?;
        info!(%range, budget = self.config.partition.budget, "discovery started");
        let started = Instant::now();

        match self.run_discovery(range).await {
            Ok(progress) => {
                info!(
                    chunks = progress.total_count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "discovery complete"
                );
                self.state.send_replace(SyncState::from_progress(progress));
                Ok(progress)
            }
            Err(e) => {
                warn!(error = %e, "discovery failed");
                self.stats.write().last_error = Some(e.to_string());
                self.state.send_replace(SyncState::Failed {
                    reason: e.to_string(),
                    retryable: false,
                });
                Err(e)
            }
        }
    }

    async fn run_discovery(&self, range: DateRange) -> SyncResult<SyncProgress> {
        self.ledger.delete_all()?;
        self.ledger.save()?;

        let partition = self
            .partitioner
            .partition(range, self.aggregate.as_ref())
            .await?;
        debug!(
            covered = %partition.covered,
            units = partition.total_units,
            queries = partition.oracle_queries,
            "partition ready"
        );

        for planned in &partition.chunks {
            self.ledger.insert(planned.range, planned.unit_count)?;
        }
        self.ledger.save()?;
        Ok(self.ledger.progress()?)
    }

    /// Drains every unsynced chunk.
    ///
    /// Returns once the run completed or was paused. Starting from
    /// `Completed` returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SyncFailure`] if a chunk failed, and
    /// [`SyncError::InvalidStateTransition`] unless the state is
    /// `ReadyToSync`, `Paused`, `Completed` or a retryable `Failed`.
    pub async fn sync(&self) -> SyncResult<SyncProgress> {
        let progress = self.ledger.progress()?;
        let cancel = {
            let mut slot = self.run.lock();
            self.begin(
                "syncing",
                SyncState::can_start_sync,
                SyncState::Syncing { progress },
            )?;
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };
        info!(%progress, workers = self.config.max_concurrent_chunks, "sync started");

        let outcome = self.drain(&cancel).await;
        self.run.lock().take();

        match outcome.and_then(|()| Ok(self.ledger.progress()?)) {
            Ok(progress) => {
                let next = if cancel.is_cancelled() && !progress.is_complete() {
                    SyncState::Paused { progress }
                } else {
                    SyncState::from_progress(progress)
                };
                {
                    let mut stats = self.stats.write();
                    stats.last_run = Some(Instant::now());
                    if progress.is_complete() {
                        stats.runs_completed += 1;
                    }
                }
                info!(state = %next, "sync stopped");
                self.state.send_replace(next);
                Ok(progress)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(error = %reason, "sync failed");
                {
                    let mut stats = self.stats.write();
                    stats.last_run = Some(Instant::now());
                    stats.last_error = Some(reason.clone());
                }
                self.state.send_replace(SyncState::Failed {
                    reason: reason.clone(),
                    retryable: true,
                });
                Err(SyncError::SyncFailure {
                    reason,
                    retryable: true,
                })
            }
        }
    }

    /// Resumes after a pause or a retryable failure.
    ///
    /// Only unsynced chunks are read back from the ledger. A chunk that was
    /// in flight when the previous run stopped is sent again.
    pub async fn resume(&self) -> SyncResult<SyncProgress> {
        self.sync().await
    }

    /// Requests the running sync to stop.
    ///
    /// In-flight chunks abort at their next fetch or append boundary; the
    /// running [`sync`](Self::sync) call then settles in `Paused`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidStateTransition`] if no sync is running.
    pub fn pause(&self) -> SyncResult<()> {
        let slot = self.run.lock();
        match slot.as_ref() {
            Some(token) => {
                token.cancel();
                info!("pause requested");
                Ok(())
            }
            None => Err(SyncError::InvalidStateTransition {
                from: self.state().name().into(),
                to: "paused".into(),
            }),
        }
    }

    /// Deletes all remote samples, then clears the ledger.
    ///
    /// # Errors
    ///
    /// Refused while discovery or sync is running. If the remote delete
    /// fails, the ledger is left untouched.
    pub async fn reset(&self) -> SyncResult<()> {
        let state = self.state();
        if !state.can_reset() {
            return Err(SyncError::InvalidStateTransition {
                from: state.name().into(),
                to: "idle".into(),
            });
        }

        let response = self.worker.sink.delete_all().await?;
        self.ledger.delete_all()?;
        self.ledger.save()?;
        info!(remote = %response.message, "reset complete");
        self.state.send_replace(SyncState::Idle);
        Ok(())
    }

    /// Transfers one chunk outside of a run and marks it synced.
    ///
    /// Failures are returned as is, without retry.
    pub async fn sync_chunk(&self, chunk: &Chunk) -> SyncResult<usize> {
        let saved = self
            .worker
            .transfer(chunk, &CancellationToken::new())
            .await?;
        self.ledger.mark_synced(chunk.id)?;
        self.ledger.save()?;
        Ok(saved)
    }

    /// Returns true if the remote sink answers its health probe.
    pub async fn check_health(&self) -> bool {
        match self.worker.sink.health().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "remote sink unreachable");
                false
            }
        }
    }

    async fn drain(&self, cancel: &CancellationToken) -> SyncResult<()> {
        let pending = self.ledger.query_unsynced()?;
        if pending.is_empty() {
            return Ok(());
        }

        // Child token: a chunk failure stops this run without looking like a pause.
        let run = cancel.child_token();
        let writer = MarkWriter::spawn(Arc::clone(&self.ledger), self.config.marks.clone());
        let mut queue = pending.into_iter();
        let mut in_flight = JoinSet::new();

        for chunk in queue.by_ref().take(self.config.max_concurrent_chunks.max(1)) {
            self.spawn_chunk(&mut in_flight, chunk, &run, writer.handle());
        }

        let mut failure = None;
        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok(Ok((id, saved))) => {
                    let mut stats = self.stats.write();
                    stats.chunks_synced += 1;
                    stats.samples_sent += saved as u64;
                    debug!(chunk = %id, saved, "chunk synced");
                }
                Ok(Err((id, SyncError::Cancelled))) => {
                    debug!(chunk = %id, "chunk cancelled");
                }
                Ok(Err((id, e))) => {
                    warn!(chunk = %id, error = %e, "chunk failed");
                    self.stats.write().chunks_failed += 1;
                    if failure.is_none() {
                        failure = Some(e);
                        run.cancel();
                    }
                }
                Err(join_error) => {
                    warn!(error = %join_error, "chunk worker aborted");
                    if failure.is_none() {
                        failure = Some(SyncError::SyncFailure {
                            reason: format!("chunk worker aborted: {join_error}"),
                            retryable: true,
                        });
                        run.cancel();
                    }
                }
            }

            if !run.is_cancelled() {
                if let Some(chunk) = queue.next() {
                    self.spawn_chunk(&mut in_flight, chunk, &run, writer.handle());
                }
            }
            self.publish_progress();
        }

        let flushed = writer.finish().await;
        self.publish_progress();
        if let Some(e) = failure {
            return Err(e);
        }
        flushed?;
        Ok(())
    }

    fn spawn_chunk(
        &self,
        in_flight: &mut JoinSet<ChunkOutcome>,
        chunk: Chunk,
        cancel: &CancellationToken,
        marks: MarkHandle,
    ) {
        let worker = self.worker.clone();
        let cancel = cancel.clone();
        in_flight.spawn(async move {
            match worker.transfer(&chunk, &cancel).await {
                Ok(saved) => acknowledge(&marks, chunk.id, saved),
                Err(e) => Err((chunk.id, e)),
            }
        });
    }

    fn publish_progress(&self) {
        let Ok(latest) = self.ledger.progress() else {
            return;
        };
        self.state.send_if_modified(|state| match state {
            SyncState::Syncing { progress } if *progress != latest => {
                *progress = latest;
                true
            }
            _ => false,
        });
    }

    fn begin<F>(&self, to: &str, allowed: F, next: SyncState) -> SyncResult<()>
    where
        F: FnOnce(&SyncState) -> bool,
    {
        let mut rejected = None;
        self.state.send_if_modified(|state| {
            if allowed(state) {
                *state = next;
                true
            } else {
                rejected = Some(state.name());
                false
            }
        });
        match rejected {
            Some(from) => Err(SyncError::InvalidStateTransition {
                from: from.into(),
                to: to.into(),
            }),
            None => Ok(()),
        }
    }
}

/// Queues the synced mark of an acknowledged chunk.
///
/// A stopped writer fails the chunk: the sink holds its samples but the
/// ledger would never learn it, so the next run sends it again.
fn acknowledge(marks: &MarkHandle, id: ChunkId, saved: usize) -> ChunkOutcome {
    if marks.mark(id) {
        Ok((id, saved))
    } else {
        warn!(chunk = %id, "mark writer stopped, chunk left unsynced");
        Err((
            id,
            SyncError::SyncFailure {
                reason: format!("synced mark for chunk {id} was dropped"),
                retryable: true,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkPolicy;
    use crate::synthetic::{SyntheticConfig, SyntheticSource};
    use crate::transport::MockSink;
    use chrono::{Duration, TimeZone, Utc};
    use stepsync_ledger::InMemoryLedger;

    type TestOrchestrator =
        SyncOrchestrator<Arc<SyntheticSource>, Arc<SyntheticSource>, MockSink, InMemoryLedger>;

    fn history() -> DateRange {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        DateRange::new(start, start + Duration::days(20)).unwrap()
    }

    fn orchestrator() -> TestOrchestrator {
        let source = Arc::new(SyntheticSource::new(SyntheticConfig::new(11, history())).unwrap());
        let config = SyncConfig::new()
            .with_budget(5_000)
            .with_marks(MarkPolicy::immediate());
        SyncOrchestrator::new(
            config,
            Arc::clone(&source),
            source,
            MockSink::new(),
            InMemoryLedger::new(),
        )
    }

    #[tokio::test]
    async fn discover_then_sync_completes() {
        let orchestrator = orchestrator();
        assert_eq!(orchestrator.state(), SyncState::Idle);

        let discovered = orchestrator.discover(history()).await.unwrap();
        assert!(discovered.total_count > 1);
        assert!(matches!(orchestrator.state(), SyncState::ReadyToSync { .. }));

        let progress = orchestrator.sync().await.unwrap();
        assert!(progress.is_complete());
        assert!(matches!(orchestrator.state(), SyncState::Completed { .. }));
        assert_eq!(orchestrator.sink().append_calls(), progress.total_count);

        let stats = orchestrator.stats();
        assert_eq!(stats.runs_completed, 1);
        assert_eq!(stats.chunks_synced, progress.total_count as u64);
        assert_eq!(stats.samples_sent, orchestrator.sink().sample_count() as u64);
    }

    #[tokio::test]
    async fn sync_from_completed_sends_nothing() {
        let orchestrator = orchestrator();
        orchestrator.discover(history()).await.unwrap();
        orchestrator.sync().await.unwrap();
        let calls = orchestrator.sink().append_calls();

        orchestrator.resume().await.unwrap();
        assert_eq!(orchestrator.sink().append_calls(), calls);
    }

    #[tokio::test]
    async fn sync_refused_when_idle() {
        let orchestrator = orchestrator();
        let err = orchestrator.sync().await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidStateTransition { .. }));
        assert!(orchestrator.pause().is_err());
    }

    #[tokio::test]
    async fn chunk_failure_is_retryable() {
        let orchestrator = orchestrator();
        orchestrator.discover(history()).await.unwrap();
        orchestrator.sink().fail_next_appends(1);

        let err = orchestrator.sync().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::SyncFailure {
                retryable: true,
                ..
            }
        ));
        assert!(matches!(
            orchestrator.state(),
            SyncState::Failed {
                retryable: true,
                ..
            }
        ));
        let partial = orchestrator.progress().unwrap();
        assert!(!partial.is_complete());

        let progress = orchestrator.resume().await.unwrap();
        assert!(progress.is_complete());
        assert_eq!(orchestrator.stats().chunks_failed, 1);
    }

    #[tokio::test]
    async fn reset_clears_both_sides() {
        let orchestrator = orchestrator();
        orchestrator.discover(history()).await.unwrap();
        orchestrator.sync().await.unwrap();

        orchestrator.reset().await.unwrap();
        assert_eq!(orchestrator.state(), SyncState::Idle);
        assert_eq!(orchestrator.progress().unwrap().total_count, 0);
        assert_eq!(orchestrator.sink().sample_count(), 0);
    }

    #[tokio::test]
    async fn failed_remote_delete_keeps_ledger() {
        let orchestrator = orchestrator();
        let discovered = orchestrator.discover(history()).await.unwrap();
        orchestrator.sink().set_fail_deletes(true);

        assert!(orchestrator.reset().await.is_err());
        assert_eq!(orchestrator.progress().unwrap(), discovered);
        assert!(matches!(orchestrator.state(), SyncState::ReadyToSync { .. }));
    }

    #[test]
    fn dropped_mark_fails_the_chunk() {
        let id = ChunkId::new();
        let outcome = acknowledge(&MarkHandle::closed(), id, 12);
        let Err((failed, error)) = outcome else {
            panic!("expected a failure for a dropped mark");
        };
        assert_eq!(failed, id);
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn sync_chunk_marks_after_ack() {
        let orchestrator = orchestrator();
        orchestrator.discover(history()).await.unwrap();
        let chunk = orchestrator.ledger().query_unsynced().unwrap().remove(0);

        orchestrator.sink().set_connected(false);
        assert!(orchestrator.sync_chunk(&chunk).await.is_err());
        assert_eq!(orchestrator.progress().unwrap().synced_count, 0);

        orchestrator.sink().set_connected(true);
        orchestrator.sync_chunk(&chunk).await.unwrap();
        assert_eq!(orchestrator.progress().unwrap().synced_count, 1);
        assert!(orchestrator.check_health().await);
    }

    #[tokio::test]
    async fn restore_rederives_state() {
        let orchestrator = orchestrator();
        orchestrator.discover(history()).await.unwrap();
        let chunk = orchestrator.ledger().query_unsynced().unwrap().remove(0);
        orchestrator.ledger().mark_synced(chunk.id).unwrap();

        let state = orchestrator.restore().unwrap();
        assert!(matches!(state, SyncState::Paused { .. }));
        assert_eq!(orchestrator.state(), state);
    }

    #[tokio::test]
    async fn state_changes_are_published() {
        let orchestrator = orchestrator();
        let mut updates = orchestrator.subscribe();

        orchestrator.discover(history()).await.unwrap();
        assert!(updates.has_changed().unwrap());
        assert!(matches!(
            *updates.borrow_and_update(),
            SyncState::ReadyToSync { .. }
        ));
    }
}
