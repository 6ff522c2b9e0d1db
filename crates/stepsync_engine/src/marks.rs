//! Batched synced-mark writer.
//!
//! Workers report finished chunks through a cheap [`MarkHandle`]; a single
//! task owns the buffer and writes marks to the ledger in batches, followed
//! by a `save`. A batch is flushed when `max_pending` ids are buffered or
//! when no id arrived for `idle_flush`, whichever comes first.

use std::sync::Arc;

use stepsync_ledger::{ChunkId, Ledger, LedgerResult};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::MarkPolicy;

enum MarkCommand {
    Mark(ChunkId),
    Flush(oneshot::Sender<LedgerResult<()>>),
}

/// Sender side used by chunk workers.
#[derive(Clone)]
pub struct MarkHandle {
    tx: mpsc::UnboundedSender<MarkCommand>,
}

impl MarkHandle {
    /// Queues a synced mark. Returns false if the writer has stopped.
    pub fn mark(&self, id: ChunkId) -> bool {
        self.tx.send(MarkCommand::Mark(id)).is_ok()
    }

    /// A handle whose writer is already gone.
    #[cfg(test)]
    pub(crate) fn closed() -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self { tx }
    }
}

/// Owner of the mark-writing task.
pub struct MarkWriter {
    handle: MarkHandle,
    task: JoinHandle<LedgerResult<usize>>,
}

impl MarkWriter {
    /// Spawns the writer task on the current tokio runtime.
    pub fn spawn<L>(ledger: Arc<L>, policy: MarkPolicy) -> Self
    where
        L: Ledger + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(ledger, policy, rx));
        Self {
            handle: MarkHandle { tx },
            task,
        }
    }

    /// Returns a handle for queuing marks.
    pub fn handle(&self) -> MarkHandle {
        self.handle.clone()
    }

    /// Writes all buffered marks now.
    pub async fn flush(&self) -> LedgerResult<()> {
        let (reply, done) = oneshot::channel();
        if self.handle.tx.send(MarkCommand::Flush(reply)).is_err() {
            return Ok(());
        }
        done.await.unwrap_or(Ok(()))
    }

    /// Stops accepting marks, writes what is left and returns the number of
    /// marks written over the writer's lifetime.
    ///
    /// Outstanding [`MarkHandle`] clones keep the writer alive; drop them
    /// first.
    ///
    /// # Errors
    ///
    /// Returns the first flush error seen by the writer.
    pub async fn finish(self) -> LedgerResult<usize> {
        drop(self.handle);
        match self.task.await {
            Ok(result) => result,
            Err(join_error) => Err(std::io::Error::other(join_error.to_string()).into()),
        }
    }
}

async fn run<L>(
    ledger: Arc<L>,
    policy: MarkPolicy,
    mut rx: mpsc::UnboundedReceiver<MarkCommand>,
) -> LedgerResult<usize>
where
    L: Ledger + ?Sized,
{
    let mut pending: Vec<ChunkId> = Vec::with_capacity(policy.max_pending);
    let mut written = 0usize;
    let mut first_error = None;

    loop {
        let command = if pending.is_empty() {
            rx.recv().await
        } else {
            match tokio::time::timeout(policy.idle_flush, rx.recv()).await {
                Ok(command) => command,
                Err(_) => {
                    record(flush(ledger.as_ref(), &mut pending), &mut written, &mut first_error);
                    continue;
                }
            }
        };

        match command {
            Some(MarkCommand::Mark(id)) => {
                pending.push(id);
                if pending.len() >= policy.max_pending {
                    record(flush(ledger.as_ref(), &mut pending), &mut written, &mut first_error);
                }
            }
            Some(MarkCommand::Flush(reply)) => {
                let result = flush(ledger.as_ref(), &mut pending);
                let outcome = match &result {
                    Ok(_) => Ok(()),
                    Err(e) => Err(std::io::Error::other(e.to_string()).into()),
                };
                record(result, &mut written, &mut first_error);
                let _ = reply.send(outcome);
            }
            None => break,
        }
    }

    record(flush(ledger.as_ref(), &mut pending), &mut written, &mut first_error);
    debug!(written, "mark writer stopped");
    match first_error {
        Some(e) => Err(e),
        None => Ok(written),
    }
}

/// Writes and saves the buffered marks. The buffer is cleared either way:
/// the ledger applies every known id of a failing batch, and the save runs
/// regardless so those marks reach disk. Marks left dirty by a failed save
/// go out with the next successful one.
fn flush<L: Ledger + ?Sized>(ledger: &L, pending: &mut Vec<ChunkId>) -> LedgerResult<usize> {
    if pending.is_empty() {
        return Ok(0);
    }
    let count = pending.len();
    let marked = ledger.mark_synced_batch(pending);
    let saved = ledger.save();
    pending.clear();
    marked.and(saved).map(|()| count)
}

fn record(
    result: LedgerResult<usize>,
    written: &mut usize,
    first_error: &mut Option<stepsync_ledger::LedgerError>,
) {
    match result {
        Ok(count) => {
            if count > 0 {
                debug!(count, "synced marks flushed");
            }
            *written += count;
        }
        Err(e) => {
            warn!(error = %e, "failed to flush synced marks");
            if first_error.is_none() {
                *first_error = Some(e);
            }
        }
    }
}
