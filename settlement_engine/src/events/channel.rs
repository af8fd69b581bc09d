//! Topic/subscription event channel with at-least-once delivery.
//!
//! [`MemoryBroker`] is the in-process stand-in for the durable broker the platform assumes as
//! infrastructure. It keeps the interesting guarantees intact so that everything downstream is built (and
//! tested) against them: a delivery that is neither acknowledged nor abandoned within the visibility
//! timeout is redelivered; an abandoned delivery is redelivered immediately with an incremented delivery
//! count; a delivery whose count reaches the maximum is routed to the subscription's dead-letter queue.
//! A message may occasionally be delivered again even after acknowledgment (the ack races the visibility
//! timer), which mirrors real broker failure modes and is why consumers must be idempotent.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex as StdMutex,
    },
    time::Duration,
};

use log::*;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::events::SettlementEvent;

const SUBSCRIPTION_BUFFER: usize = 512;

#[derive(Debug, Error)]
pub enum EventChannelError {
    #[error("The event channel is closed")]
    Closed,
    #[error("Timed out waiting for the event channel")]
    Timeout,
    #[error("Could not serialize the event: {0}")]
    Serialization(String),
}

/// A publisher abstraction over the settlement topic. The publish is awaited and its failure is
/// distinguishable from success; fire-and-forget publishing is deliberately not offered.
#[allow(async_fn_in_trait)]
pub trait SettlementPublisher: Send + Sync {
    async fn publish(&self, event: &SettlementEvent) -> Result<(), EventChannelError>;
}

/// A message as carried on the channel.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub body: String,
    /// 1 on first delivery, incremented on every redelivery.
    pub delivery_count: u32,
}

struct SubscriptionEntry {
    name: String,
    tx: mpsc::Sender<Envelope>,
}

type TopicMap = Arc<StdMutex<HashMap<String, Vec<SubscriptionEntry>>>>;

/// In-process topic broker. Construct once at startup and hand out publishers and subscriptions.
#[derive(Clone)]
pub struct MemoryBroker {
    topics: TopicMap,
    visibility_timeout: Duration,
    max_delivery_count: u32,
}

impl MemoryBroker {
    pub fn new(visibility_timeout: Duration, max_delivery_count: u32) -> Self {
        Self { topics: Arc::new(StdMutex::new(HashMap::new())), visibility_timeout, max_delivery_count }
    }

    /// Attaches a named subscription to the topic. Every subscription receives its own copy of each
    /// message published after the subscription was created.
    pub fn subscribe(&self, topic: &str, subscription: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let entry = SubscriptionEntry { name: subscription.to_string(), tx: tx.clone() };
        let mut topics = self.topics.lock().unwrap_or_else(|p| p.into_inner());
        topics.entry(topic.to_string()).or_default().push(entry);
        debug!("📬️ Subscription '{subscription}' attached to topic '{topic}'");
        Subscription {
            name: subscription.to_string(),
            rx,
            requeue: tx,
            dead: Arc::new(StdMutex::new(Vec::new())),
            visibility_timeout: self.visibility_timeout,
            max_delivery_count: self.max_delivery_count,
        }
    }

    pub fn publisher(&self, topic: &str) -> TopicPublisher {
        TopicPublisher { topic: topic.to_string(), topics: Arc::clone(&self.topics) }
    }
}

/// Cloneable handle for publishing to a single topic.
#[derive(Clone)]
pub struct TopicPublisher {
    topic: String,
    topics: TopicMap,
}

impl TopicPublisher {
    pub async fn publish_raw(&self, body: String) -> Result<(), EventChannelError> {
        let senders = {
            let topics = self.topics.lock().unwrap_or_else(|p| p.into_inner());
            match topics.get(&self.topic) {
                Some(entries) => entries.iter().map(|e| (e.name.clone(), e.tx.clone())).collect::<Vec<_>>(),
                None => Vec::new(),
            }
        };
        if senders.is_empty() {
            warn!("📬️ No subscriptions on topic '{}'. The message is dropped.", self.topic);
            return Ok(());
        }
        for (name, tx) in senders {
            let envelope = Envelope { body: body.clone(), delivery_count: 1 };
            tx.send(envelope).await.map_err(|_| {
                error!("📬️ Subscription '{name}' on topic '{}' is closed", self.topic);
                EventChannelError::Closed
            })?;
        }
        Ok(())
    }
}

impl SettlementPublisher for TopicPublisher {
    async fn publish(&self, event: &SettlementEvent) -> Result<(), EventChannelError> {
        let body = serde_json::to_string(event).map_err(|e| EventChannelError::Serialization(e.to_string()))?;
        trace!("📬️ Publishing settlement event for order {}", event.order_id);
        self.publish_raw(body).await
    }
}

/// The receiving side of a subscription. Hand it to one consumer; multiple worker tasks can share it
/// behind a `tokio::sync::Mutex`.
pub struct Subscription {
    name: String,
    rx: mpsc::Receiver<Envelope>,
    requeue: mpsc::Sender<Envelope>,
    dead: Arc<StdMutex<Vec<Envelope>>>,
    visibility_timeout: Duration,
    max_delivery_count: u32,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for the next delivery. Returns `None` once the topic has no live publishers and the buffer
    /// has drained.
    pub async fn recv(&mut self) -> Option<Delivery> {
        let envelope = self.rx.recv().await?;
        let settled = Arc::new(AtomicBool::new(false));
        // visibility timer: redeliver unless the consumer settles the message in time
        let timer_flag = Arc::clone(&settled);
        let timer_requeue = self.requeue.clone();
        let timer_dead = Arc::clone(&self.dead);
        let timer_envelope = envelope.clone();
        let max = self.max_delivery_count;
        let visibility = self.visibility_timeout;
        let sub_name = self.name.clone();
        tokio::spawn(async move {
            tokio::time::sleep(visibility).await;
            if timer_flag.swap(true, Ordering::SeqCst) {
                return;
            }
            warn!("📬️ '{sub_name}': delivery #{} not settled within {visibility:?}", timer_envelope.delivery_count);
            redeliver(timer_envelope, &timer_requeue, &timer_dead, max).await;
        });
        Some(Delivery {
            envelope,
            settled,
            requeue: self.requeue.clone(),
            dead: Arc::clone(&self.dead),
            max_delivery_count: self.max_delivery_count,
        })
    }

    /// A handle onto the subscription's dead-letter queue. The handle stays valid after the subscription
    /// itself has been handed to a consumer.
    pub fn dead_letters(&self) -> DeadLetters {
        DeadLetters(Arc::clone(&self.dead))
    }
}

/// Read access to a subscription's dead-letter queue, for tests and operator tooling.
#[derive(Clone)]
pub struct DeadLetters(Arc<StdMutex<Vec<Envelope>>>);

impl DeadLetters {
    pub fn snapshot(&self) -> Vec<Envelope> {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn redeliver(envelope: Envelope, requeue: &mpsc::Sender<Envelope>, dead: &StdMutex<Vec<Envelope>>, max: u32) {
    if envelope.delivery_count >= max {
        warn!("📬️ Delivery count {} reached the maximum of {max}. Dead-lettering.", envelope.delivery_count);
        dead.lock().unwrap_or_else(|p| p.into_inner()).push(envelope);
        return;
    }
    let next = Envelope { body: envelope.body, delivery_count: envelope.delivery_count + 1 };
    if requeue.send(next).await.is_err() {
        error!("📬️ Could not requeue a delivery. The subscription is gone.");
    }
}

/// A single in-flight delivery. Exactly one of [`ack`](Self::ack), [`abandon`](Self::abandon) or
/// [`dead_letter`](Self::dead_letter) should be called; doing nothing lets the visibility timer redeliver.
pub struct Delivery {
    envelope: Envelope,
    settled: Arc<AtomicBool>,
    requeue: mpsc::Sender<Envelope>,
    dead: Arc<StdMutex<Vec<Envelope>>>,
    max_delivery_count: u32,
}

impl Delivery {
    pub fn body(&self) -> &str {
        &self.envelope.body
    }

    pub fn delivery_count(&self) -> u32 {
        self.envelope.delivery_count
    }

    /// Completes the message. It will not be redelivered (barring a lost race with the visibility timer).
    pub fn ack(self) {
        self.settled.swap(true, Ordering::SeqCst);
    }

    /// Returns the message to the subscription for redelivery, or dead-letters it once the delivery count
    /// reaches the maximum.
    pub async fn abandon(self) {
        if self.settled.swap(true, Ordering::SeqCst) {
            return;
        }
        redeliver(self.envelope, &self.requeue, &self.dead, self.max_delivery_count).await;
    }

    /// Routes a poison message to the dead-letter queue and completes it.
    pub fn dead_letter(self) {
        if self.settled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.dead.lock().unwrap_or_else(|p| p.into_inner()).push(self.envelope);
    }
}
