use chrono::Duration as ChronoDuration;
use log::*;
use settlement_engine::{events::TopicPublisher, OrderFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

use crate::integrations::StripeGateway;

/// Starts the settlement reconciliation worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
///
/// The worker periodically republishes settlement events for Approved orders whose publish never
/// completed. Republishing is safe because the reward ledger deduplicates on order id; the grace period
/// keeps the sweep from racing an in-flight first publish.
pub fn start_reconciliation_worker(
    api: OrderFlowApi<SqliteDatabase, StripeGateway, TopicPublisher>,
    interval: std::time::Duration,
    grace: ChronoDuration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Settlement reconciliation worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running settlement reconciliation sweep");
            match api.reconcile_unpublished_settlements(grace).await {
                Ok(0) => trace!("🕰️ No unpublished settlements found"),
                Ok(n) => info!("🕰️ {n} settlement event(s) republished"),
                Err(e) => error!("🕰️ Error running the settlement reconciliation sweep: {e}"),
            }
        }
    })
}
