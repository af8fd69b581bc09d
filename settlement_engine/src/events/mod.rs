//! The settlement event channel.
//!
//! This module owns the wire format of settlement events and the publish/subscribe plumbing that carries
//! them from the order lifecycle to the reward ledger. The channel gives at-least-once semantics: an
//! unacknowledged delivery is redelivered after a visibility timeout, and a message that keeps failing is
//! routed to a dead-letter queue instead of being retried forever. Consumers must therefore be idempotent,
//! which the reward ledger is by construction (unique order id).
mod channel;
mod consumer;
mod message;

pub use channel::{
    DeadLetters,
    Delivery,
    Envelope,
    EventChannelError,
    MemoryBroker,
    SettlementPublisher,
    Subscription,
    TopicPublisher,
};
pub use consumer::SettlementEventConsumer;
pub use message::SettlementEvent;
