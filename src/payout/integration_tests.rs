//! Integration Tests for the payout outbox
//!
//! Transfers are committed through the real engine and drained by workers
//! against PostgreSQL. Claimers share one lock so parallel tests never steal
//! each other's tasks.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};

use crate::db::create_test_pool;
use crate::ledger::{Account, AccountId, LedgerAudit, LedgerRepository, MinorUnits};
use crate::payout::provider::{FailingPayoutProvider, MockPayoutProvider, ProviderError};
use crate::payout::queue::{PgTaskQueue, TaskQueue};
use crate::payout::state::TaskStatus;
use crate::payout::types::{PayoutDestination, TaskId};
use crate::payout::worker::{PayoutWorker, TickOutcome, WorkerConfig};
use crate::payout::PayoutProvider;
use crate::transfer::{TransferEngine, TransferReceipt};

static CLAIM_LOCK: Mutex<()> = Mutex::const_new(());

struct TestHarness {
    engine: TransferEngine,
    ledger: LedgerRepository,
    queue: Arc<PgTaskQueue>,
    audit: LedgerAudit,
}

impl TestHarness {
    async fn new() -> Self {
        let pool = create_test_pool().await;
        Self {
            engine: TransferEngine::new(pool.clone()),
            ledger: LedgerRepository::new(pool.clone()),
            queue: Arc::new(PgTaskQueue::new(pool.clone())),
            audit: LedgerAudit::new(pool),
        }
    }

    async fn funded_pair(&self, opening: MinorUnits) -> (Account, Account) {
        let a = self.ledger.open_account("alice", opening).await.unwrap();
        let b = self.ledger.open_account("bob", 0).await.unwrap();
        (a, b)
    }

    async fn transfer(&self, from: &Account, to: &Account, amount: MinorUnits) -> TransferReceipt {
        self.engine
            .execute_transfer(from.id, to.id, amount)
            .await
            .unwrap()
    }

    fn worker(&self, provider: Arc<dyn PayoutProvider>) -> (PayoutWorker, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let config = WorkerConfig {
            poll_interval: Duration::from_millis(10),
            provider_timeout: Duration::from_secs(2),
            stale_threshold: None,
        };
        (PayoutWorker::new(self.queue.clone(), provider, config, rx), tx)
    }

    async fn balance(&self, account: &Account) -> MinorUnits {
        self.ledger
            .get_account(account.id)
            .await
            .unwrap()
            .unwrap()
            .balance
    }
}

/// Tick until `task_id` is finalized; tasks left by other tests are drained on the way
async fn process_until(worker: &PayoutWorker, task_id: TaskId) -> TickOutcome {
    for _ in 0..10_000 {
        let outcome = worker.tick().await;
        match outcome {
            TickOutcome::Completed(id) | TickOutcome::Failed(id) | TickOutcome::Lost(id)
                if id == task_id =>
            {
                return outcome;
            }
            TickOutcome::Idle => panic!("queue drained without reaching task {task_id}"),
            TickOutcome::QueueError => panic!("queue error while draining"),
            _ => {}
        }
    }
    panic!("task {task_id} not reached");
}

// ============================================================================
// Happy Path
// ============================================================================

/// Transfer commits, worker claims and completes the payout
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_transfer_then_payout_completes() {
    let _guard = CLAIM_LOCK.lock().await;
    let h = TestHarness::new().await;
    let (a, b) = h.funded_pair(10_000).await;

    let receipt = h.transfer(&a, &b, 5_000).await;
    let task = h.queue.get(receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);

    let (worker, _tx) = h.worker(Arc::new(MockPayoutProvider::new(Duration::ZERO, 0.0)));
    assert_eq!(
        process_until(&worker, receipt.task_id).await,
        TickOutcome::Completed(receipt.task_id)
    );

    let task = h.queue.get(receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.last_error.is_none());
    assert_eq!(h.balance(&a).await, 5_000);
    assert_eq!(h.balance(&b).await, 5_000);
}

// ============================================================================
// Failure Path
// ============================================================================

/// Provider failure marks the task FAILED and leaves the ledger untouched
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_provider_failure_does_not_roll_back_transfer() {
    let _guard = CLAIM_LOCK.lock().await;
    let h = TestHarness::new().await;
    let (a, b) = h.funded_pair(10_000).await;

    let receipt = h.transfer(&a, &b, 5_000).await;

    let provider = FailingPayoutProvider::new(ProviderError::retryable(
        "external bank gateway timeout",
    ));
    let (worker, _tx) = h.worker(Arc::new(provider));
    assert_eq!(
        process_until(&worker, receipt.task_id).await,
        TickOutcome::Failed(receipt.task_id)
    );

    let task = h.queue.get(receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(
        task.last_error.as_deref(),
        Some("external bank gateway timeout")
    );

    // Funds stay with the destination; no compensating entries
    assert_eq!(h.balance(&a).await, 5_000);
    assert_eq!(h.balance(&b).await, 5_000);
    assert_eq!(
        h.ledger
            .entries_for_transaction(receipt.transaction_id)
            .await
            .unwrap()
            .len(),
        2
    );
    assert_eq!(h.audit.global_entry_sum().await.unwrap(), 0);

    // FAILED is terminal: not claimable again
    assert!(!h.queue.complete(receipt.task_id).await.unwrap());
}

/// Claimed task carries the credit leg and destination metadata
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_claim_returns_credit_leg() {
    let _guard = CLAIM_LOCK.lock().await;
    let h = TestHarness::new().await;
    let (a, b) = h.funded_pair(2_500).await;
    let receipt = h.transfer(&a, &b, 2_500).await;

    let claimed = loop {
        let task = h
            .queue
            .claim_next()
            .await
            .unwrap()
            .expect("our task must still be pending");
        if task.task_id == receipt.task_id {
            break task;
        }
        h.queue.complete(task.task_id).await.unwrap();
    };

    assert_eq!(claimed.transaction_id, receipt.transaction_id);
    assert_eq!(claimed.amount, 2_500);
    assert_eq!(claimed.destination.account_id, b.id);
    assert_eq!(claimed.destination.owner, "bob");

    let task = h.queue.get(receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Processing);
    assert!(h.queue.complete(receipt.task_id).await.unwrap());
}

// ============================================================================
// Concurrency
// ============================================================================

/// Concurrent claimers never receive the same task
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_concurrent_claims_never_double_claim() {
    let _guard = CLAIM_LOCK.lock().await;
    let h = TestHarness::new().await;
    let (a, b) = h.funded_pair(100_000).await;

    let mut ours = HashSet::new();
    for _ in 0..20 {
        ours.insert(h.transfer(&a, &b, 100).await.task_id);
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let queue = h.queue.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(task) = queue.claim_next().await.unwrap() {
                claimed.push(task.task_id);
            }
            claimed
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "task {id} claimed twice");
        }
    }

    assert!(ours.is_subset(&seen));
    for id in seen {
        assert!(h.queue.complete(id).await.unwrap());
    }
}

/// Stale PROCESSING tasks go back to PENDING only when reclaim is enabled
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_reclaim_stale_processing_task() {
    let _guard = CLAIM_LOCK.lock().await;
    let h = TestHarness::new().await;
    let (a, b) = h.funded_pair(1_000).await;
    let receipt = h.transfer(&a, &b, 1_000).await;

    loop {
        let task = h.queue.claim_next().await.unwrap().unwrap();
        if task.task_id == receipt.task_id {
            break;
        }
        h.queue.complete(task.task_id).await.unwrap();
    }

    // Fresh claim is not stale yet
    h.queue.reclaim_stale(Duration::from_secs(3600)).await.unwrap();
    let task = h.queue.get(receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Processing);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(h.queue.reclaim_stale(Duration::from_secs(1)).await.unwrap() >= 1);
    let task = h.queue.get(receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);

    let (worker, _tx) = h.worker(Arc::new(MockPayoutProvider::new(Duration::ZERO, 0.0)));
    assert_eq!(
        process_until(&worker, receipt.task_id).await,
        TickOutcome::Completed(receipt.task_id)
    );
}

/// Records the destination of every payout it is asked to send
#[derive(Default)]
struct RecordingProvider {
    sent: std::sync::Mutex<Vec<AccountId>>,
}

impl RecordingProvider {
    fn sent_to(&self, account: AccountId) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|id| **id == account)
            .count()
    }
}

#[async_trait::async_trait]
impl PayoutProvider for RecordingProvider {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_payout(
        &self,
        _amount: MinorUnits,
        destination: &PayoutDestination,
    ) -> Result<(), ProviderError> {
        self.sent.lock().unwrap().push(destination.account_id);
        Ok(())
    }
}

/// A worker whose reclaim threshold undercuts its provider timeout must not
/// steal a task another worker is still paying out
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_in_flight_task_not_redispatched() {
    let _guard = CLAIM_LOCK.lock().await;
    let h = TestHarness::new().await;
    let (a, b) = h.funded_pair(4_321).await;
    let receipt = h.transfer(&a, &b, 4_321).await;

    // First worker has claimed the task and is mid-call
    loop {
        let task = h.queue.claim_next().await.unwrap().unwrap();
        if task.task_id == receipt.task_id {
            break;
        }
        h.queue.complete(task.task_id).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let provider = Arc::new(RecordingProvider::default());
    let (_tx, rx) = watch::channel(false);
    let second = PayoutWorker::new(
        h.queue.clone(),
        provider.clone(),
        WorkerConfig {
            poll_interval: Duration::from_millis(10),
            provider_timeout: Duration::from_secs(2),
            stale_threshold: Some(Duration::from_secs(1)),
        },
        rx,
    );
    for _ in 0..3 {
        second.tick().await;
    }

    assert_eq!(provider.sent_to(b.id), 0);
    let task = h.queue.get(receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Processing);

    // First worker finishes its call
    assert!(h.queue.complete(receipt.task_id).await.unwrap());
    let task = h.queue.get(receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
}
