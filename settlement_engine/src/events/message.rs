use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId};

/// The message published on the settlement topic when an order's payment is confirmed.
///
/// Wire format (JSON): `{"orderId": ..., "userId": ..., "accrualAmount": ..., "correlationId": ...}`.
/// This is a wire message, not a stored entity; the publisher keeps no copy of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementEvent {
    pub order_id: OrderId,
    #[serde(rename = "userId")]
    pub customer_id: String,
    /// The reward accrual in whole currency units, derived from the order total.
    pub accrual_amount: i64,
    pub correlation_id: String,
}

impl SettlementEvent {
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            customer_id: order.customer_id.clone(),
            accrual_amount: order.total_price.whole_units(),
            correlation_id: new_correlation_id(),
        }
    }
}

fn new_correlation_id() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect()
}
