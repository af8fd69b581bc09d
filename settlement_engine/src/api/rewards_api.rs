use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{OrderId, RewardRecord},
    traits::{RewardLedger, RewardStoreError},
};

/// `RewardsApi` appends immutable reward accrual records, one per settled order. Credits are idempotent:
/// redelivering the same settlement event any number of times leaves exactly one record, carrying the
/// amount and timestamp of the first successful credit.
#[derive(Clone)]
pub struct RewardsApi<B> {
    db: B,
}

impl<B> Debug for RewardsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RewardsApi")
    }
}

impl<B> RewardsApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B: RewardLedger> RewardsApi<B> {
    /// Credits the accrual for an order. Returns the stored record and whether this call created it.
    pub async fn credit(
        &self,
        order_id: &OrderId,
        customer_id: &str,
        accrual: i64,
    ) -> Result<(RewardRecord, bool), RewardStoreError> {
        let (record, inserted) = self.db.credit(order_id, customer_id, accrual).await?;
        if inserted {
            debug!("🏆️ Reward of {} recorded for order {}", record.accrual, record.order_id);
        } else {
            trace!("🏆️ Order {} already has a reward record; credit was a no-op", record.order_id);
        }
        Ok((record, inserted))
    }

    pub async fn fetch_reward(&self, order_id: &OrderId) -> Result<Option<RewardRecord>, RewardStoreError> {
        self.db.fetch_reward(order_id).await
    }
}
