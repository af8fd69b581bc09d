//! Tests of the settlement consumer against the in-process event channel: idempotent crediting under
//! duplicate delivery, redelivery on transient store failures, and dead-lettering of poison messages.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex as StdMutex,
    },
    time::Duration,
};

use chrono::Utc;
use settlement_engine::{
    db_types::{OrderId, RewardRecord},
    events::{MemoryBroker, SettlementEvent, SettlementEventConsumer, SettlementPublisher},
    traits::{RewardLedger, RewardStoreError},
    RewardsApi,
};

/// In-memory reward ledger with the same idempotency contract as the SQLite one, plus a knob for
/// injecting transient failures.
#[derive(Clone, Default)]
struct TestLedger {
    records: Arc<StdMutex<HashMap<String, RewardRecord>>>,
    /// Number of upcoming credit calls that fail with a transient store error.
    fail_next: Arc<AtomicUsize>,
    credit_calls: Arc<AtomicUsize>,
}

impl RewardLedger for TestLedger {
    async fn credit(
        &self,
        order_id: &OrderId,
        customer_id: &str,
        accrual: i64,
    ) -> Result<(RewardRecord, bool), RewardStoreError> {
        self.credit_calls.fetch_add(1, Ordering::SeqCst);
        let failures = self.fail_next.load(Ordering::SeqCst);
        if failures > 0 {
            self.fail_next.store(failures - 1, Ordering::SeqCst);
            return Err(RewardStoreError::DatabaseError("ledger store is down".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        if let Some(existing) = records.get(order_id.as_str()) {
            return Ok((existing.clone(), false));
        }
        let record = RewardRecord {
            id: records.len() as i64 + 1,
            order_id: order_id.clone(),
            customer_id: customer_id.to_string(),
            accrual,
            rewarded_at: Utc::now(),
        };
        records.insert(order_id.as_str().to_string(), record.clone());
        Ok((record, true))
    }

    async fn fetch_reward(&self, order_id: &OrderId) -> Result<Option<RewardRecord>, RewardStoreError> {
        Ok(self.records.lock().unwrap().get(order_id.as_str()).cloned())
    }
}

fn settlement_event(order_id: &str, accrual: i64) -> SettlementEvent {
    SettlementEvent {
        order_id: OrderId(order_id.to_string()),
        customer_id: "cust-1".to_string(),
        accrual_amount: accrual,
        correlation_id: "corr-1".to_string(),
    }
}

struct Harness {
    publisher: settlement_engine::events::TopicPublisher,
    dead: settlement_engine::events::DeadLetters,
    ledger: TestLedger,
    consumer: tokio::task::JoinHandle<()>,
}

fn harness() -> Harness {
    let _ = env_logger::try_init().ok();
    let broker = MemoryBroker::new(Duration::from_millis(100), 3);
    let sub = broker.subscribe("order.settlements", "rewards");
    let dead = sub.dead_letters();
    let publisher = broker.publisher("order.settlements");
    let ledger = TestLedger::default();
    let consumer = SettlementEventConsumer::new(sub, RewardsApi::new(ledger.clone()), 2);
    let consumer = tokio::spawn(consumer.run());
    Harness { publisher, dead, ledger, consumer }
}

#[tokio::test]
async fn duplicate_deliveries_credit_exactly_once() {
    let h = harness();
    let event = settlement_event("ord-1", 150);
    // the channel is at-least-once: the same settlement arrives twice
    h.publisher.publish(&event).await.unwrap();
    h.publisher.publish(&event).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let record = h.ledger.fetch_reward(&OrderId("ord-1".into())).await.unwrap().expect("no reward was recorded");
    assert_eq!(record.accrual, 150);
    assert_eq!(record.customer_id, "cust-1");
    assert_eq!(h.ledger.credit_calls.load(Ordering::SeqCst), 2, "both deliveries reach the ledger");
    assert_eq!(h.ledger.records.lock().unwrap().len(), 1, "only one record exists");
    assert!(h.dead.is_empty());
    h.consumer.abort();
}

#[tokio::test]
async fn transient_store_failure_is_retried_until_credited() {
    let h = harness();
    h.ledger.fail_next.store(1, Ordering::SeqCst);
    h.publisher.publish(&settlement_event("ord-2", 150)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let record = h.ledger.fetch_reward(&OrderId("ord-2".into())).await.unwrap().expect("no reward was recorded");
    assert_eq!(record.accrual, 150);
    assert!(h.ledger.credit_calls.load(Ordering::SeqCst) >= 2, "the failed delivery was redelivered");
    assert!(h.dead.is_empty());
    h.consumer.abort();
}

#[tokio::test]
async fn malformed_payloads_are_dead_lettered() {
    let h = harness();
    h.publisher.publish_raw("this is not a settlement event".to_string()).await.unwrap();
    h.publisher.publish(&settlement_event("ord-3", 150)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // the poison message is parked, the good one is processed
    let dead = h.dead.snapshot();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].body, "this is not a settlement event");
    let record = h.ledger.fetch_reward(&OrderId("ord-3".into())).await.unwrap();
    assert!(record.is_some());
    h.consumer.abort();
}

#[tokio::test]
async fn non_positive_accruals_are_dead_lettered() {
    let h = harness();
    h.publisher.publish(&settlement_event("ord-4", 0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(h.dead.len(), 1);
    assert!(h.ledger.fetch_reward(&OrderId("ord-4".into())).await.unwrap().is_none());
    assert_eq!(h.ledger.credit_calls.load(Ordering::SeqCst), 0);
    h.consumer.abort();
}
