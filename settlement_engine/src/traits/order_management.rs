use chrono::Duration;
use thiserror::Error;

use crate::db_types::{NewOrder, Order, OrderId, OrderLine, OrderStatus};

/// Storage contract for the order aggregate.
///
/// Status-changing methods are expressed as compare-and-set operations: the caller states the status the
/// order must currently hold, and the store commits the change only if that still matches. A `None` result
/// means the guard failed (another writer got there first, or the order is in a different state), and never
/// results in a partial write. This is the single-writer guarantee that keeps concurrent confirmations from
/// both publishing a settlement event.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Send + Sync {
    /// Atomically stores the order header and its lines. Fails if the order id already exists.
    async fn insert_order(&self, id: OrderId, order: NewOrder) -> Result<Order, OrderStoreError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    async fn fetch_order_lines(&self, order_id: &OrderId) -> Result<Vec<OrderLine>, OrderStoreError>;

    /// Records the hosted payment session id on the order. The session id is set at most once per order:
    /// the update only succeeds while the order is `Pending` and no session id is stored yet.
    async fn set_payment_session(&self, order_id: &OrderId, session_id: &str) -> Result<Order, OrderStoreError>;

    /// Compare-and-set transition `Pending` -> `Approved`, storing the payment intent id.
    /// Returns `None` if the order is no longer `Pending`.
    async fn approve_order(&self, order_id: &OrderId, payment_intent_id: &str)
        -> Result<Option<Order>, OrderStoreError>;

    /// Compare-and-set transition `from` -> `to`. Returns `None` if the order is no longer in `from`.
    /// The transition itself must already have been validated against the state machine.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, OrderStoreError>;

    /// Records that the settlement event for this order was successfully handed to the event channel.
    async fn mark_settlement_published(&self, order_id: &OrderId) -> Result<Order, OrderStoreError>;

    /// Approved orders whose settlement event has not been confirmed as published, and which were last
    /// touched more than `grace` ago. These are the pending reconciliation items.
    async fn fetch_unpublished_settlements(&self, grace: Duration) -> Result<Vec<Order>, OrderStoreError>;
}

#[derive(Debug, Error)]
pub enum OrderStoreError {
    #[error("Order store error: {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists: {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("A payment session has already been opened for order {0}")]
    PaymentSessionAlreadySet(OrderId),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}
