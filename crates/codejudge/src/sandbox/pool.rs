use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, instrument, warn};

use crate::sandbox::SandboxError;

/// Bounded pool of toolchain invocation slots
///
/// A slot is held for the duration of one compile or run step. Callers wait up
/// to the queue timeout for a slot; a zero timeout rejects immediately when the
/// pool is saturated.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    queue_timeout: Duration,
}

impl WorkerPool {
    pub fn new(capacity: usize, queue_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            queue_timeout,
        }
    }

    /// Wait for a free slot
    #[instrument(skip(self), fields(available = self.available()))]
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, SandboxError> {
        if self.queue_timeout.is_zero() {
            return match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => Ok(permit),
                Err(TryAcquireError::NoPermits) => {
                    warn!(capacity = self.capacity, "worker pool saturated");
                    Err(SandboxError::Saturated(self.capacity))
                }
                Err(TryAcquireError::Closed) => Err(SandboxError::Saturated(self.capacity)),
            };
        }

        match tokio::time::timeout(self.queue_timeout, self.semaphore.clone().acquire_owned())
            .await
        {
            Ok(Ok(permit)) => {
                debug!("acquired worker slot");
                Ok(permit)
            }
            Ok(Err(_closed)) => Err(SandboxError::Saturated(self.capacity)),
            Err(_elapsed) => {
                warn!(
                    capacity = self.capacity,
                    timeout = ?self.queue_timeout,
                    "timed out waiting for a worker slot"
                );
                Err(SandboxError::Saturated(self.capacity))
            }
        }
    }

    /// Number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
