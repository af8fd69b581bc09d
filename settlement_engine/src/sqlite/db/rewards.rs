use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{OrderId, RewardRecord},
    traits::RewardStoreError,
};

/// Inserts a reward record keyed uniquely by order id, returning `false` in the second element if a record
/// for that order already existed. The existing record is returned unchanged in that case; the first
/// successful credit is authoritative.
pub async fn idempotent_credit(
    order_id: &OrderId,
    customer_id: &str,
    accrual: i64,
    conn: &mut SqliteConnection,
) -> Result<(RewardRecord, bool), RewardStoreError> {
    let inserted: Option<RewardRecord> = sqlx::query_as(
        "INSERT INTO rewards (order_id, customer_id, accrual) VALUES ($1, $2, $3) ON CONFLICT (order_id) DO NOTHING \
         RETURNING *",
    )
    .bind(order_id.as_str())
    .bind(customer_id)
    .bind(accrual)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(record) => {
            debug!("📝️ Reward record {} inserted for order {order_id}", record.id);
            Ok((record, true))
        },
        None => {
            let existing = fetch_reward(order_id, conn).await?.ok_or_else(|| {
                RewardStoreError::DatabaseError(format!(
                    "The reward insert for order {order_id} conflicted, but no existing record was found"
                ))
            })?;
            Ok((existing, false))
        },
    }
}

pub async fn fetch_reward(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<RewardRecord>, sqlx::Error> {
    let record = sqlx::query_as("SELECT * FROM rewards WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(record)
}
