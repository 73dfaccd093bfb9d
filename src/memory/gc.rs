//! Background sweep of expired in-memory sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::lifecycle::Shutdown;
use crate::memory::clock::Clock;
use crate::memory::manager::SessionManager;

/// Handle to a running sweep. Dropping it leaves the task running until the
/// runtime shuts down; call [`GcTask::stop`] to end it.
pub struct GcTask {
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl GcTask {
    /// Signal the sweep to exit and wait for it.
    pub async fn stop(self) {
        self.shutdown.trigger();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Session sweep task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<C: Clock> SessionManager<C> {
    /// Spawn a task calling [`SessionManager::gc`] every `max_lifetime`.
    pub fn start_gc(self: &Arc<Self>) -> GcTask {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        let handle = tokio::spawn(run(Arc::clone(self), self.max_lifetime(), rx));
        GcTask { shutdown, handle }
    }
}

async fn run<C: Clock>(
    manager: Arc<SessionManager<C>>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    // A zero period would spin.
    let period = period.max(Duration::from_secs(1));
    tracing::info!(period_secs = period.as_secs(), "Session sweep starting");

    let mut ticker = time::interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                manager.gc();
            }
            _ = shutdown.recv() => {
                tracing::info!("Session sweep received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::clock::ManualClock;
    use crate::session::cookie::ResponseCookies;

    #[tokio::test(start_paused = true)]
    async fn test_sweep_runs_every_lifetime() {
        let clock = Arc::new(ManualClock::default());
        let manager = Arc::new(SessionManager::with_clock(
            "sid",
            Duration::from_secs(10),
            clock.clone(),
        ));
        let task = manager.start_gc();

        manager.start_session(&mut ResponseCookies::new());
        clock.advance(Duration::from_secs(11));

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(manager.len(), 1);

        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(manager.len(), 0);

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_task() {
        let manager = Arc::new(SessionManager::with_clock(
            "sid",
            Duration::from_secs(60),
            ManualClock::default(),
        ));
        let task = manager.start_gc();
        assert!(!task.is_finished());
        task.stop().await;
    }
}
