//! Delayed deletion of staged sources and artifacts
//!
//! Staging directories outlive the sandbox call that created them by a grace
//! window so they can be inspected. A single background task owns the deletion
//! schedule; callers only hand paths over.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
enum CleanupJob {
    Remove { path: PathBuf, due: Instant },
    Flush(oneshot::Sender<()>),
}

/// Handle to the cleanup task
///
/// Cloning is cheap; all clones feed the same schedule. When every handle is
/// dropped the task deletes whatever is still pending and exits.
#[derive(Debug, Clone)]
pub struct CleanupQueue {
    tx: mpsc::UnboundedSender<CleanupJob>,
    grace: Duration,
}

impl CleanupQueue {
    /// Spawn the cleanup task on the current tokio runtime
    pub fn spawn(grace: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_cleanup(rx));
        (Self { tx, grace }, handle)
    }

    /// Grace window applied to every scheduled path
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Schedule `path` for deletion once the grace window has passed
    pub fn schedule(&self, path: PathBuf) {
        let due = Instant::now() + self.grace;
        if let Err(mpsc::error::SendError(job)) = self.tx.send(CleanupJob::Remove { path, due }) {
            // The task is gone (runtime shutting down); delete inline so nothing leaks.
            if let CleanupJob::Remove { path, .. } = job {
                warn!(path = %path.display(), "cleanup task unavailable, removing immediately");
                if let Err(e) = remove_path_blocking(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove staged path");
                }
            }
        }
    }

    /// Delete everything currently scheduled without waiting for the grace window
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(CleanupJob::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

async fn run_cleanup(mut rx: mpsc::UnboundedReceiver<CleanupJob>) {
    let mut pending: BinaryHeap<Reverse<(Instant, u64, PathBuf)>> = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let next_due = pending.peek().map(|Reverse((due, _, _))| *due);

        tokio::select! {
            job = rx.recv() => match job {
                Some(CleanupJob::Remove { path, due }) => {
                    seq += 1;
                    pending.push(Reverse((due, seq, path)));
                }
                Some(CleanupJob::Flush(ack)) => {
                    drain(&mut pending, None).await;
                    let _ = ack.send(());
                }
                None => {
                    drain(&mut pending, None).await;
                    debug!("cleanup queue closed");
                    return;
                }
            },
            _ = tokio::time::sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                drain(&mut pending, Some(Instant::now())).await;
            }
        }
    }
}

/// Remove every pending path due at or before `now` (all of them when `None`)
async fn drain(pending: &mut BinaryHeap<Reverse<(Instant, u64, PathBuf)>>, now: Option<Instant>) {
    while let Some(Reverse((due, _, _))) = pending.peek() {
        if let Some(now) = now
            && *due > now
        {
            break;
        }
        let Some(Reverse((_, _, path))) = pending.pop() else {
            break;
        };
        match remove_path(&path).await {
            Ok(()) => debug!(path = %path.display(), "removed staged path"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staged path"),
        }
    }
}

async fn remove_path(path: &Path) -> io::Result<()> {
    let result = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn remove_path_blocking(path: &Path) -> io::Result<()> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
