use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use log::*;
use tokio::sync::Mutex;

use crate::{
    api::OrderFlowError,
    db_types::{NewOrder, Order, OrderId, OrderLine, OrderStatus},
    events::{SettlementEvent, SettlementPublisher},
    traits::{
        CheckoutSession,
        NewCheckoutSession,
        OrderManagement,
        PaymentIntentStatus,
        PaymentSessionGateway,
        SessionLineItem,
    },
};

const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// The result of a payment confirmation poll.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    /// Payment was confirmed by this call. The order transitioned to `Approved` and exactly one
    /// settlement event was published (or queued for reconciliation if the publish failed).
    Approved(Order),
    /// The order had already left `Pending` before this call. Nothing was changed and nothing was
    /// re-published; the current order state is returned.
    AlreadySettled(Order),
    /// The provider has not confirmed the payment. Not an error: the caller is expected to poll again.
    NotConfirmed { order: Order, status: PaymentIntentStatus },
}

type LockMap = Arc<StdMutex<HashMap<OrderId, Arc<Mutex<()>>>>>;

/// `OrderFlowApi` owns the order aggregate and drives its lifecycle: creation from a cart snapshot,
/// opening a hosted payment session, confirming payment, and administrative status changes.
///
/// Mutations to a single order are serialized through a per-order lock, and every status change is
/// additionally guarded by a compare-and-set in the store, so two racing confirmations can never both
/// publish a settlement event. Payment polls and the event publish happen outside the lock; a refund is
/// issued under it, because the provider's refund call is not idempotent.
pub struct OrderFlowApi<B, G, P> {
    db: B,
    gateway: G,
    publisher: P,
    locks: LockMap,
    publish_timeout: Duration,
}

impl<B, G, P> Debug for OrderFlowApi<B, G, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B: Clone, G: Clone, P: Clone> Clone for OrderFlowApi<B, G, P> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateway: self.gateway.clone(),
            publisher: self.publisher.clone(),
            locks: Arc::clone(&self.locks),
            publish_timeout: self.publish_timeout,
        }
    }
}

impl<B, G, P> OrderFlowApi<B, G, P> {
    pub fn new(db: B, gateway: G, publisher: P) -> Self {
        Self {
            db,
            gateway,
            publisher,
            locks: Arc::new(StdMutex::new(HashMap::new())),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    fn lock_for(&self, order_id: &OrderId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(locks.entry(order_id.clone()).or_default())
    }

    /// Drops a lock handle and evicts the registry entry once no other caller holds it, so the registry
    /// does not grow with every order ever touched.
    fn release_lock(&self, order_id: &OrderId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        drop(lock);
        if let Some(entry) = locks.get(order_id) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(order_id);
            }
        }
    }

    /// Number of per-order locks currently registered.
    pub fn active_order_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G, P> OrderFlowApi<B, G, P>
where
    B: OrderManagement,
    G: PaymentSessionGateway,
    P: SettlementPublisher,
{
    /// Creates a new order in `Pending` from a priced cart snapshot. Line prices are snapshotted here and
    /// never re-priced from the catalog.
    pub async fn create_order(&self, order: NewOrder) -> Result<(Order, Vec<OrderLine>), OrderFlowError> {
        validate_new_order(&order)?;
        let id = OrderId::random();
        let created = self.db.insert_order(id, order).await?;
        let lines = self.db.fetch_order_lines(&created.order_id).await?;
        info!("🔄️📦️ Order {} created for customer {} ({})", created.order_id, created.customer_id, created.total_price);
        Ok((created, lines))
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<(Order, Vec<OrderLine>), OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let lines = self.db.fetch_order_lines(order_id).await?;
        Ok((order, lines))
    }

    /// Opens a hosted payment session for a pending order and stores the session id on the order. The
    /// session id is set at most once; a second call fails rather than re-opening a session. A gateway
    /// failure leaves the order untouched in `Pending`, so the caller may retry.
    pub async fn open_payment_session(
        &self,
        order_id: &OrderId,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if order.status != OrderStatus::Pending {
            return Err(OrderFlowError::ValidationError(format!(
                "A payment session can only be opened for a pending order. Order {order_id} is {}",
                order.status
            )));
        }
        if order.payment_session_id.is_some() {
            return Err(OrderFlowError::PaymentSessionAlreadyOpen(order_id.clone()));
        }
        let lines = self.db.fetch_order_lines(order_id).await?;
        let session = NewCheckoutSession {
            line_items: lines
                .into_iter()
                .map(|l| SessionLineItem { name: l.name, unit_price: l.unit_price, quantity: l.quantity })
                .collect(),
            coupon_code: order.coupon_code.clone(),
            discount: order.discount,
            success_url: success_url.to_string(),
            cancel_url: cancel_url.to_string(),
        };
        let session = self.gateway.create_session(session).await?;
        self.db.set_payment_session(order_id, &session.session_id).await?;
        info!("🔄️💳️ Payment session {} opened for order {order_id}", session.session_id);
        Ok(session)
    }

    /// Polls the payment provider for the order's session. On a confirmed payment the order transitions
    /// to `Approved` and exactly one settlement event is published. A non-success provider status is a
    /// legitimate poll outcome, not an error; the caller should call again later. Confirming an order
    /// that already left `Pending` is a no-op that returns the current state.
    pub async fn confirm_payment(&self, order_id: &OrderId) -> Result<ConfirmOutcome, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if order.status != OrderStatus::Pending {
            debug!("🔄️✅️ Order {order_id} is already {}. Nothing to confirm.", order.status);
            return Ok(ConfirmOutcome::AlreadySettled(order));
        }
        let session_id = order
            .payment_session_id
            .clone()
            .ok_or_else(|| OrderFlowError::PaymentSessionMissing(order_id.clone()))?;
        // gateway round trips happen before the per-order lock is taken
        let session = self.gateway.get_session_status(&session_id).await?;
        let intent_id = match session.payment_intent_id {
            Some(id) => id,
            None => {
                trace!("🔄️✅️ Session {session_id} has no payment intent yet");
                return Ok(ConfirmOutcome::NotConfirmed { order, status: PaymentIntentStatus::Pending });
            },
        };
        let intent_status = self.gateway.get_payment_intent(&intent_id).await?;
        if intent_status != PaymentIntentStatus::Succeeded {
            debug!("🔄️✅️ Payment intent {intent_id} for order {order_id} is {intent_status}");
            return Ok(ConfirmOutcome::NotConfirmed { order, status: intent_status });
        }
        let lock = self.lock_for(order_id);
        let approved = {
            let _guard = lock.lock().await;
            self.db.approve_order(order_id, &intent_id).await
        };
        self.release_lock(order_id, lock);
        match approved? {
            Some(approved) => {
                info!("🔄️✅️ Order {order_id} approved with payment intent {intent_id}");
                let order = self.publish_settlement(approved).await;
                Ok(ConfirmOutcome::Approved(order))
            },
            None => {
                // lost the race; another caller committed the transition and published
                let current = self
                    .db
                    .fetch_order_by_order_id(order_id)
                    .await?
                    .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
                debug!("🔄️✅️ Order {order_id} was settled concurrently ({})", current.status);
                Ok(ConfirmOutcome::AlreadySettled(current))
            },
        }
    }

    /// Changes the order status after validating the transition against the state machine. A transition
    /// into `Cancelled` or `Refunded` with a stored payment intent first requests a refund from the
    /// gateway; if the refund fails the transition is not committed. The per-order lock is held across the
    /// whole fetch-refund-commit sequence: a refund must be issued at most once, so racing status changes
    /// wait for each other instead of both observing the pre-cancellation state.
    pub async fn update_status(&self, order_id: &OrderId, new_status: OrderStatus) -> Result<Order, OrderFlowError> {
        let lock = self.lock_for(order_id);
        let result = {
            let _guard = lock.lock().await;
            self.apply_status_change(order_id, new_status).await
        };
        self.release_lock(order_id, lock);
        result
    }

    async fn apply_status_change(&self, order_id: &OrderId, new_status: OrderStatus) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if !order.status.can_transition_to(new_status) {
            return Err(OrderFlowError::InvalidTransition { from: order.status, to: new_status });
        }
        if matches!(new_status, OrderStatus::Cancelled | OrderStatus::Refunded) {
            if let Some(intent_id) = &order.payment_intent_id {
                let refund_id = self.gateway.refund(intent_id).await?;
                info!("🔄️💳️ Refund {refund_id} issued for order {order_id} (payment intent {intent_id})");
            }
        }
        match self.db.update_order_status(order_id, order.status, new_status).await? {
            Some(updated) => {
                info!("🔄️📦️ Order {order_id} moved from {} to {new_status}", order.status);
                Ok(updated)
            },
            None => {
                let current = self
                    .db
                    .fetch_order_by_order_id(order_id)
                    .await?
                    .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
                Err(OrderFlowError::InvalidTransition { from: current.status, to: new_status })
            },
        }
    }

    /// Re-publishes settlement events for Approved orders whose publish never completed. Safe to run
    /// repeatedly: the reward ledger deduplicates on order id. Returns the number of orders republished.
    pub async fn reconcile_unpublished_settlements(&self, grace: chrono::Duration) -> Result<usize, OrderFlowError> {
        let pending = self.db.fetch_unpublished_settlements(grace).await?;
        let mut republished = 0usize;
        for order in pending {
            let order_id = order.order_id.clone();
            let order = self.publish_settlement(order).await;
            if order.settlement_published_at.is_some() {
                republished += 1;
            } else {
                warn!("🔄️📬️ Reconciliation publish for order {order_id} failed; will retry on the next sweep");
            }
        }
        Ok(republished)
    }

    /// Publishes the settlement event for an Approved order and records the publish on success. Publish
    /// failure is not an error to the caller: the Approved transition is already durable, and the order
    /// is left flagged as a pending reconciliation item.
    async fn publish_settlement(&self, order: Order) -> Order {
        let event = SettlementEvent::for_order(&order);
        let publish = tokio::time::timeout(self.publish_timeout, self.publisher.publish(&event)).await;
        match publish {
            Ok(Ok(())) => match self.db.mark_settlement_published(&order.order_id).await {
                Ok(order) => order,
                Err(e) => {
                    warn!(
                        "🔄️📬️ Settlement event for order {} was published, but the publish could not be recorded. \
                         The reconciliation sweep may republish it. {e}",
                        order.order_id
                    );
                    order
                },
            },
            Ok(Err(e)) => {
                error!(
                    "🔄️📬️ Could not publish the settlement event for order {}. Left as a pending reconciliation \
                     item. {e}",
                    order.order_id
                );
                order
            },
            Err(_) => {
                error!(
                    "🔄️📬️ Publishing the settlement event for order {} timed out. Left as a pending reconciliation \
                     item.",
                    order.order_id
                );
                order
            },
        }
    }
}

fn validate_new_order(order: &NewOrder) -> Result<(), OrderFlowError> {
    if order.lines.is_empty() {
        return Err(OrderFlowError::ValidationError("The cart has no line items".into()));
    }
    if !order.total_price.is_positive() {
        return Err(OrderFlowError::ValidationError(format!(
            "The order total must be positive, got {}",
            order.total_price
        )));
    }
    if order.discount.is_negative() {
        return Err(OrderFlowError::ValidationError(format!("The discount cannot be negative, got {}", order.discount)));
    }
    for line in &order.lines {
        if line.quantity <= 0 {
            return Err(OrderFlowError::ValidationError(format!(
                "Line item '{}' has a non-positive quantity ({})",
                line.name, line.quantity
            )));
        }
        if line.unit_price.is_negative() {
            return Err(OrderFlowError::ValidationError(format!(
                "Line item '{}' has a negative unit price ({})",
                line.name, line.unit_price
            )));
        }
    }
    let expected = order.lines_total() - order.discount;
    if expected != order.total_price {
        return Err(OrderFlowError::ValidationError(format!(
            "The order total {} does not match the line items minus discount ({expected})",
            order.total_price
        )));
    }
    Ok(())
}
