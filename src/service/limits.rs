//! Job-wide limit on simultaneous capability calls

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::service::capabilities::CapabilityError;

/// Bounds concurrent external calls and applies a per-call timeout
///
/// The timeout starts once a permit is held, so queueing behind other calls
/// never counts against a call's own time.
#[derive(Clone)]
pub struct CallLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
    call_timeout: Duration,
}

impl CallLimiter {
    pub fn new(limit: usize, call_timeout: Duration) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            call_timeout,
        }
    }

    /// Run a call under the limiter with the default call timeout
    pub async fn run<F, T>(&self, call: F) -> Result<T, CapabilityError>
    where
        F: Future<Output = T>,
    {
        self.run_with_timeout(self.call_timeout, call).await
    }

    /// Run a call under the limiter with an explicit timeout
    pub async fn run_with_timeout<F, T>(
        &self,
        timeout: Duration,
        call: F,
    ) -> Result<T, CapabilityError>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| CapabilityError::Unavailable("call limiter closed".to_string()))?;

        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| CapabilityError::Timeout(timeout))
    }

    /// Number of calls currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }
}
