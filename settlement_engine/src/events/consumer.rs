use futures::{stream::FuturesUnordered, StreamExt};
use log::*;

use crate::{
    api::RewardsApi,
    events::{channel::Delivery, SettlementEvent, Subscription},
    traits::{RewardLedger, RewardStoreError},
};

/// Long-lived consumer attached to one subscription on the settlement topic. Each delivered message is
/// credited to the reward ledger; duplicates converge on the ledger's unique order id constraint, so no
/// consumer-side deduplication is kept.
///
/// Settlement policy per delivery:
/// * ledger credit succeeded (fresh or duplicate) -> ack
/// * transient store failure -> abandon, the channel redelivers later
/// * malformed payload or invalid event content -> dead-letter, never retried
pub struct SettlementEventConsumer<L: RewardLedger> {
    subscription: Subscription,
    ledger: RewardsApi<L>,
    concurrency: usize,
}

impl<L> SettlementEventConsumer<L>
where L: RewardLedger + Clone
{
    pub fn new(subscription: Subscription, ledger: RewardsApi<L>, concurrency: usize) -> Self {
        Self { subscription, ledger, concurrency: concurrency.max(1) }
    }

    /// Runs the consumer until the subscription closes. Up to `concurrency` deliveries are processed at
    /// once; ordering across different orders is not preserved, and does not need to be. Spawn the
    /// returned future on the runtime; it completes only once the channel has drained.
    pub async fn run(mut self) {
        let name = self.subscription.name().to_string();
        info!("🏆️ Settlement consumer started on subscription '{name}' (concurrency {})", self.concurrency);
        let mut in_flight = FuturesUnordered::new();
        loop {
            tokio::select! {
                delivery = self.subscription.recv(), if in_flight.len() < self.concurrency => {
                    match delivery {
                        Some(delivery) => {
                            let ledger = self.ledger.clone();
                            in_flight.push(async move { handle_delivery(delivery, &ledger).await });
                        },
                        None => break,
                    }
                },
                Some(()) = in_flight.next() => {},
            }
        }
        // channel closed; settle whatever is still in flight
        while in_flight.next().await.is_some() {}
        debug!("🏆️ Subscription '{name}' closed, consumer shutting down");
    }
}

async fn handle_delivery<L: RewardLedger>(delivery: Delivery, ledger: &RewardsApi<L>) {
    let event = match serde_json::from_str::<SettlementEvent>(delivery.body()) {
        Ok(event) => event,
        Err(e) => {
            warn!("🏆️ Malformed settlement payload, dead-lettering. {e}");
            delivery.dead_letter();
            return;
        },
    };
    if event.accrual_amount <= 0 || event.customer_id.is_empty() || event.order_id.as_str().is_empty() {
        warn!(
            "🏆️ Settlement event for order {} failed validation (accrual {}), dead-lettering. [correlation: {}]",
            event.order_id, event.accrual_amount, event.correlation_id
        );
        delivery.dead_letter();
        return;
    }
    match ledger.credit(&event.order_id, &event.customer_id, event.accrual_amount).await {
        Ok((record, true)) => {
            info!(
                "🏆️ Credited {} point(s) to {} for order {} [correlation: {}]",
                record.accrual, record.customer_id, record.order_id, event.correlation_id
            );
            delivery.ack();
        },
        Ok((record, false)) => {
            debug!(
                "🏆️ Order {} was already credited (delivery #{}), acknowledging duplicate",
                record.order_id,
                delivery.delivery_count()
            );
            delivery.ack();
        },
        Err(RewardStoreError::DatabaseError(e)) => {
            warn!("🏆️ Reward store unavailable for order {}, abandoning for redelivery. {e}", event.order_id);
            delivery.abandon().await;
        },
    }
}
