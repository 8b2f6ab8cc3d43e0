// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! A generic cancellable periodic task, used by the address-refresh
//! loop (§4.6) and anywhere else a background tick needs a clean
//! shutdown handle rather than an abandoned `tokio::spawn`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Handle to a running periodic task. Dropping it does not stop the
/// task — call [`PeriodicTask::cancel`] explicitly, mirroring the
/// resource manager's own explicit-stop steps elsewhere in the crate.
pub struct PeriodicTask {
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawns `tick` to run every `interval` until cancelled. `tick`
    /// receives the 0-based iteration count.
    pub fn spawn<F, Fut>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut(u64) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let stop = Arc::new(Notify::new());
        let stop_for_task = stop.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut iteration = 0u64;
            loop {
                tokio::select! {
                    _ = stop_for_task.notified() => break,
                    _ = ticker.tick() => {
                        tick(iteration).await;
                        iteration += 1;
                    }
                }
            }
        });
        Self { stop, handle }
    }

    /// Signals the task to stop and waits for it to finish.
    pub async fn cancel(self) {
        self.stop.notify_one();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn ticks_until_cancelled() {
        let count = Arc::new(AtomicU64::new(0));
        let count_for_task = count.clone();
        let task = PeriodicTask::spawn(Duration::from_millis(10), move |_iteration| {
            let count = count_for_task.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::advance(Duration::from_millis(35)).await;
        task.cancel().await;

        assert!(count.load(Ordering::SeqCst) >= 3);
    }
}
