//! Background tasks bound to the lifetime of their owner
//!
//! Every poller and event listener in the crate runs inside a `ScopedTask`.
//! Dropping the handle cancels the task; `shutdown` also waits for it to exit.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to a spawned task that is cancelled when the handle goes away
pub struct ScopedTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScopedTask {
    /// Spawn `body` with a cancellation token it must observe
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(body(cancel.clone()));
        debug!("Spawned background task {}", name);

        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancel the task and wait until it has exited
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::warn!("Background task {} panicked", self.name);
                }
            }
        }
        debug!("Background task {} stopped", self.name);
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn ticking_task(counter: Arc<AtomicUsize>) -> ScopedTask {
        ScopedTask::spawn("ticker", move |cancel| async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task = ticking_task(counter.clone());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        task.shutdown().await;
        let after = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task = ticking_task(counter.clone());
        tokio::time::sleep(Duration::from_millis(1500)).await;

        drop(task);
        // Give the task a chance to observe cancellation
        tokio::task::yield_now().await;
        let after = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after);
    }
}
