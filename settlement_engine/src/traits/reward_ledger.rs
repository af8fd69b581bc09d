use thiserror::Error;

use crate::db_types::{OrderId, RewardRecord};

/// Storage contract for the reward ledger.
#[allow(async_fn_in_trait)]
pub trait RewardLedger: Send + Sync {
    /// Appends a reward accrual for the given order, keyed uniquely by order id. This call is idempotent:
    /// if a record already exists for the order, the existing record is returned unchanged and the second
    /// element is `false`. The store's uniqueness constraint is the only deduplication mechanism; callers
    /// do not need their own cache.
    async fn credit(
        &self,
        order_id: &OrderId,
        customer_id: &str,
        accrual: i64,
    ) -> Result<(RewardRecord, bool), RewardStoreError>;

    async fn fetch_reward(&self, order_id: &OrderId) -> Result<Option<RewardRecord>, RewardStoreError>;
}

#[derive(Debug, Error)]
pub enum RewardStoreError {
    /// The ledger store is unavailable. Retryable: a consumer should abandon the delivery and let the
    /// channel redeliver it.
    #[error("Reward store error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for RewardStoreError {
    fn from(e: sqlx::Error) -> Self {
        RewardStoreError::DatabaseError(e.to_string())
    }
}
