//! Payout Worker
//!
//! Background loop that claims PENDING payout tasks and dispatches them to
//! the payout provider. Safe to run as several instances: claiming skips
//! rows another worker holds.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::provider::{PayoutProvider, ProviderError};
use super::queue::TaskQueue;
use super::types::{ClaimedTask, TaskId};
use crate::config::{STALE_RECLAIM_MARGIN, WorkerSettings};

/// Configuration for the payout worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between ticks
    pub poll_interval: Duration,
    /// Upper bound on one provider call
    pub provider_timeout: Duration,
    /// Reclaim PROCESSING tasks older than this. `None` leaves them stranded.
    pub stale_threshold: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            provider_timeout: Duration::from_secs(10),
            stale_threshold: None,
        }
    }
}

impl From<&WorkerSettings> for WorkerConfig {
    fn from(settings: &WorkerSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            provider_timeout: settings.provider_timeout(),
            stale_threshold: settings.stale_threshold(),
        }
    }
}

impl WorkerConfig {
    /// Stale threshold actually applied.
    ///
    /// `None` when reclaim is off or the threshold is below
    /// `STALE_RECLAIM_MARGIN` provider timeouts.
    pub fn reclaim_threshold(&self) -> Option<Duration> {
        self.stale_threshold
            .filter(|threshold| *threshold >= self.provider_timeout * STALE_RECLAIM_MARGIN)
    }
}

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No eligible task
    Idle,
    Completed(TaskId),
    Failed(TaskId),
    /// Task was no longer PROCESSING when finalizing (reclaimed elsewhere)
    Lost(TaskId),
    /// Storage error; the loop carries on at the next tick
    QueueError,
}

/// Payout Worker
///
/// Owns its timer configuration and shutdown handle. One instance never
/// overlaps its own ticks.
pub struct PayoutWorker {
    queue: Arc<dyn TaskQueue>,
    provider: Arc<dyn PayoutProvider>,
    config: WorkerConfig,
    shutdown: watch::Receiver<bool>,
}

impl PayoutWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        provider: Arc<dyn PayoutProvider>,
        config: WorkerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        if let (Some(threshold), None) = (config.stale_threshold, config.reclaim_threshold()) {
            warn!(
                stale_threshold_ms = threshold.as_millis() as u64,
                provider_timeout_ms = config.provider_timeout.as_millis() as u64,
                "Stale reclaim threshold too close to provider timeout; reclaim disabled"
            );
        }
        Self {
            queue,
            provider,
            config,
            shutdown,
        }
    }

    /// Run until shutdown is signalled (or the signal sender is dropped).
    ///
    /// A tick in progress is finished first; a task already claimed stays
    /// PROCESSING if the process dies before it is finalized.
    pub async fn run(mut self) {
        info!(
            provider = self.provider.name(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            provider_timeout_ms = self.config.provider_timeout.as_millis() as u64,
            stale_reclaim = self.config.reclaim_threshold().is_some(),
            "Starting payout worker"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone: nobody can ever stop us cleanly, so stop now
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("Payout worker stopped");
    }

    /// Run a single claim-and-dispatch cycle
    pub async fn tick(&self) -> TickOutcome {
        if let Some(threshold) = self.config.reclaim_threshold() {
            match self.queue.reclaim_stale(threshold).await {
                Ok(0) => {}
                Ok(count) => warn!(
                    count,
                    threshold_ms = threshold.as_millis() as u64,
                    "Reclaimed stale PROCESSING payout tasks"
                ),
                Err(e) => error!(error = %e, "Stale task reclaim failed"),
            }
        }

        let task = match self.queue.claim_next().await {
            Ok(Some(task)) => task,
            Ok(None) => {
                debug!("No pending payout tasks");
                return TickOutcome::Idle;
            }
            Err(e) => {
                error!(error = %e, "Failed to claim payout task");
                return TickOutcome::QueueError;
            }
        };

        self.dispatch(task).await
    }

    async fn dispatch(&self, task: ClaimedTask) -> TickOutcome {
        debug!(
            task_id = %task.task_id,
            transaction_id = %task.transaction_id,
            amount = task.amount,
            destination = %task.destination,
            "Dispatching payout"
        );

        let call = self.provider.send_payout(task.amount, &task.destination);
        let result = match tokio::time::timeout(self.config.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::retryable(format!(
                "provider timeout after {}ms",
                self.config.provider_timeout.as_millis()
            ))),
        };

        match result {
            Ok(()) => match self.queue.complete(task.task_id).await {
                Ok(true) => {
                    info!(task_id = %task.task_id, amount = task.amount, "Payout completed");
                    TickOutcome::Completed(task.task_id)
                }
                Ok(false) => {
                    warn!(task_id = %task.task_id, "Payout sent but task no longer PROCESSING");
                    TickOutcome::Lost(task.task_id)
                }
                Err(e) => {
                    error!(
                        task_id = %task.task_id,
                        error = %e,
                        "CRITICAL: Payout sent but COMPLETED status not recorded"
                    );
                    TickOutcome::QueueError
                }
            },
            Err(provider_err) => {
                warn!(
                    task_id = %task.task_id,
                    kind = provider_err.kind.as_str(),
                    error = %provider_err,
                    "Payout failed"
                );
                match self.queue.fail(task.task_id, &provider_err.message).await {
                    Ok(true) => TickOutcome::Failed(task.task_id),
                    Ok(false) => {
                        warn!(task_id = %task.task_id, "Payout failed but task no longer PROCESSING");
                        TickOutcome::Lost(task.task_id)
                    }
                    Err(e) => {
                        error!(task_id = %task.task_id, error = %e, "Failed to record payout failure");
                        TickOutcome::QueueError
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout::provider::{FailingPayoutProvider, MockPayoutProvider, ProviderErrorKind};
    use crate::payout::queue::mock::MemoryTaskQueue;
    use crate::payout::state::TaskStatus;
    use crate::payout::types::PayoutDestination;
    use crate::ledger::MinorUnits;
    use async_trait::async_trait;

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(10),
            provider_timeout: Duration::from_millis(200),
            stale_threshold: None,
        }
    }

    fn worker(
        queue: Arc<MemoryTaskQueue>,
        provider: Arc<dyn PayoutProvider>,
    ) -> (PayoutWorker, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (PayoutWorker::new(queue, provider, fast_config(), rx), tx)
    }

    struct SlowProvider;

    #[async_trait]
    impl PayoutProvider for SlowProvider {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn send_payout(
            &self,
            _amount: MinorUnits,
            _destination: &PayoutDestination,
        ) -> Result<(), ProviderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.provider_timeout, Duration::from_secs(10));
        assert!(config.stale_threshold.is_none());
    }

    #[test]
    fn test_reclaim_threshold_requires_margin_over_provider_timeout() {
        let mut config = WorkerConfig {
            provider_timeout: Duration::from_secs(2),
            stale_threshold: Some(Duration::from_secs(1)),
            ..WorkerConfig::default()
        };
        assert_eq!(config.reclaim_threshold(), None);

        config.stale_threshold = Some(Duration::from_secs(3));
        assert_eq!(config.reclaim_threshold(), None);

        config.stale_threshold = Some(Duration::from_secs(4));
        assert_eq!(config.reclaim_threshold(), Some(Duration::from_secs(4)));

        config.stale_threshold = None;
        assert_eq!(config.reclaim_threshold(), None);
    }

    #[tokio::test]
    async fn test_idle_tick() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let (worker, _tx) = worker(queue, Arc::new(MockPayoutProvider::new(Duration::ZERO, 0.0)));
        assert_eq!(worker.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_success_completes_task() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let id = queue.push(5_000, "bob");
        let (worker, _tx) = worker(
            queue.clone(),
            Arc::new(MockPayoutProvider::new(Duration::ZERO, 0.0)),
        );

        assert_eq!(worker.tick().await, TickOutcome::Completed(id));
        assert_eq!(queue.status(id), Some((TaskStatus::Completed, None)));
        assert_eq!(worker.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_failure_records_error_and_stays_failed() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let id = queue.push(5_000, "bob");
        let provider = FailingPayoutProvider::new(ProviderError {
            kind: ProviderErrorKind::Retryable,
            message: "external bank gateway timeout".to_string(),
        });
        let (worker, _tx) = worker(queue.clone(), Arc::new(provider));

        assert_eq!(worker.tick().await, TickOutcome::Failed(id));
        assert_eq!(
            queue.status(id),
            Some((
                TaskStatus::Failed,
                Some("external bank gateway timeout".to_string())
            ))
        );
        // No automatic requeue
        assert_eq!(worker.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_provider_timeout_fails_task() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let id = queue.push(100, "bob");
        let (tx, rx) = watch::channel(false);
        let config = WorkerConfig {
            provider_timeout: Duration::from_millis(20),
            ..fast_config()
        };
        let worker = PayoutWorker::new(queue.clone(), Arc::new(SlowProvider), config, rx);

        assert_eq!(worker.tick().await, TickOutcome::Failed(id));
        let (status, error) = queue.status(id).unwrap();
        assert_eq!(status, TaskStatus::Failed);
        assert!(error.unwrap().contains("timeout"));
        drop(tx);
    }

    #[tokio::test]
    async fn test_queue_error_does_not_stop_loop() {
        let queue = Arc::new(MemoryTaskQueue::new());
        queue.set_fail_claims(true);
        let (worker, _tx) = worker(
            queue.clone(),
            Arc::new(MockPayoutProvider::new(Duration::ZERO, 0.0)),
        );
        assert_eq!(worker.tick().await, TickOutcome::QueueError);

        queue.set_fail_claims(false);
        let id = queue.push(1, "bob");
        assert_eq!(worker.tick().await, TickOutcome::Completed(id));
    }

    #[tokio::test]
    async fn test_run_drains_queue_and_stops_on_shutdown() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let ids: Vec<_> = (0..3).map(|i| queue.push(100 + i, "bob")).collect();
        let (worker, tx) = worker(
            queue.clone(),
            Arc::new(MockPayoutProvider::new(Duration::ZERO, 0.0)),
        );

        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop after shutdown")
            .unwrap();

        for id in ids {
            assert_eq!(queue.status(id).unwrap().0, TaskStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_run_stops_when_sender_dropped() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let (worker, tx) = worker(queue, Arc::new(MockPayoutProvider::new(Duration::ZERO, 0.0)));
        let handle = tokio::spawn(worker.run());
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop")
            .unwrap();
    }
}
