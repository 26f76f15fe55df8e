//! Background scheduler driving the settlement passes.
//!
//! Four independent interval loops: score refresh, pick locking,
//! competition lifecycle, and the account deletion sweep. Each loop runs
//! one tick at a time with a hard per-tick timeout, skips ticks missed
//! while a slow tick runs, and drains cleanly on shutdown.

use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::coordination::ShutdownToken;
use crate::error::Result;

use super::settlement::SettlementService;

/// A spawned scheduler loop with its label for shutdown reporting
pub struct ScheduledTask {
    pub name: &'static str,
    pub handle: JoinHandle<()>,
}

pub struct SettlementScheduler {
    settlement: Arc<SettlementService>,
    config: SchedulerConfig,
}

impl SettlementScheduler {
    pub fn new(settlement: Arc<SettlementService>, config: SchedulerConfig) -> Self {
        Self { settlement, config }
    }

    /// Spawn every periodic pass. Loops stop once the shutdown token flips,
    /// finishing any in-flight tick first.
    pub fn start(&self, shutdown: &ShutdownToken) -> Vec<ScheduledTask> {
        info!(
            "Starting settlement scheduler (refresh {}s, pick locks {}s, lifecycle {}s, deletion sweep {}s)",
            self.config.score_refresh_secs,
            self.config.pick_lock_secs,
            self.config.lifecycle_secs,
            self.config.deletion_sweep_secs
        );

        let tick_timeout = Duration::from_secs(self.config.tick_timeout_secs);
        let mut tasks = Vec::new();

        {
            let settlement = self.settlement.clone();
            tasks.push(spawn_loop(
                "score_refresh",
                Duration::from_secs(self.config.score_refresh_secs),
                tick_timeout,
                shutdown.clone(),
                move || {
                    let settlement = settlement.clone();
                    async move { settlement.refresh_scores().await.map(|_| ()) }
                },
            ));
        }

        {
            let settlement = self.settlement.clone();
            tasks.push(spawn_loop(
                "pick_locking",
                Duration::from_secs(self.config.pick_lock_secs),
                tick_timeout,
                shutdown.clone(),
                move || {
                    let settlement = settlement.clone();
                    async move { settlement.lock_picks().await.map(|_| ()) }
                },
            ));
        }

        {
            let settlement = self.settlement.clone();
            tasks.push(spawn_loop(
                "lifecycle",
                Duration::from_secs(self.config.lifecycle_secs),
                tick_timeout,
                shutdown.clone(),
                move || {
                    let settlement = settlement.clone();
                    async move { settlement.run_lifecycle().await.map(|_| ()) }
                },
            ));
        }

        {
            let settlement = self.settlement.clone();
            let grace_days = self.config.deletion_grace_days;
            tasks.push(spawn_loop(
                "deletion_sweep",
                Duration::from_secs(self.config.deletion_sweep_secs),
                tick_timeout,
                shutdown.clone(),
                move || {
                    let settlement = settlement.clone();
                    async move { settlement.sweep_deletions(grace_days).await.map(|_| ()) }
                },
            ));
        }

        tasks
    }

    /// Wait for the spawned loops to finish, bounded by the configured
    /// grace period. Tasks still running past the bound are abandoned.
    pub async fn join(&self, tasks: Vec<ScheduledTask>) {
        let grace = Duration::from_secs(self.config.shutdown_grace_secs);

        for task in tasks {
            match timeout(grace, task.handle).await {
                Ok(Ok(())) => info!("{} loop stopped", task.name),
                Ok(Err(e)) => error!("{} loop panicked: {}", task.name, e),
                Err(_) => warn!("{} loop did not stop within {:?}, abandoning", task.name, grace),
            }
        }
    }
}

/// One interval loop around a tick body.
///
/// The shutdown check happens between ticks only: an in-flight tick runs
/// to completion (bounded by the tick timeout) so a half-applied pass is
/// never abandoned mid-transaction by shutdown itself.
fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    tick_timeout: Duration,
    mut shutdown: ShutdownToken,
    mut tick: F,
) -> ScheduledTask
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    let handle = tokio::spawn(async move {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.cancelled() => break,
            }

            match timeout(tick_timeout, tick()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("{} tick failed: {}", name, e),
                Err(_) => warn!(
                    "{} tick exceeded {:?} and was abandoned",
                    name, tick_timeout
                ),
            }
        }

        info!("{} loop exiting", name);
    });

    ScheduledTask { name, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::ShutdownController;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn loop_ticks_until_shutdown() {
        let controller = ShutdownController::new();
        let count = Arc::new(AtomicUsize::new(0));

        let task = {
            let count = count.clone();
            spawn_loop(
                "test_loop",
                Duration::from_millis(10),
                Duration::from_secs(1),
                controller.token(),
                move || {
                    let count = count.clone();
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.request_shutdown();
        task.handle.await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn tick_errors_do_not_stop_the_loop() {
        let controller = ShutdownController::new();
        let count = Arc::new(AtomicUsize::new(0));

        let task = {
            let count = count.clone();
            spawn_loop(
                "failing_loop",
                Duration::from_millis(10),
                Duration::from_secs(1),
                controller.token(),
                move || {
                    let count = count.clone();
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                        Err(crate::error::TallyError::Internal("boom".to_string()))
                    }
                },
            )
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.request_shutdown();
        task.handle.await.unwrap();

        // Kept ticking past the first failure
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn slow_tick_is_abandoned_by_timeout() {
        let controller = ShutdownController::new();
        let count = Arc::new(AtomicUsize::new(0));

        let task = {
            let count = count.clone();
            spawn_loop(
                "slow_loop",
                Duration::from_millis(10),
                Duration::from_millis(20),
                controller.token(),
                move || {
                    let count = count.clone();
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(())
                    }
                },
            )
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.request_shutdown();
        task.handle.await.unwrap();

        // The timeout released the loop for further ticks
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn shutdown_before_first_tick_exits_promptly() {
        let controller = ShutdownController::new();
        controller.request_shutdown();

        let task = spawn_loop(
            "idle_loop",
            Duration::from_secs(3600),
            Duration::from_secs(1),
            controller.token(),
            || async { Ok(()) },
        );

        // The first interval tick fires immediately, so at most one tick
        // runs before the token is observed.
        tokio::time::timeout(Duration::from_secs(1), task.handle)
            .await
            .expect("loop should exit")
            .unwrap();
    }
}
