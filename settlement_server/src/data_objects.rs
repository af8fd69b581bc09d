use osp_common::Money;
use serde::{Deserialize, Serialize};
use settlement_engine::db_types::{NewOrder, NewOrderLine, Order, OrderLine, OrderStatus};

/// A priced cart snapshot as submitted by the storefront. Prices are in minor currency units and were
/// fixed by the storefront; the server never re-prices them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub customer_id: String,
    pub total_price: Money,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl From<CartSnapshot> for NewOrder {
    fn from(cart: CartSnapshot) -> Self {
        NewOrder {
            customer_id: cart.customer_id,
            total_price: cart.total_price,
            discount: cart.discount,
            coupon_code: cart.coupon_code,
            lines: cart
                .items
                .into_iter()
                .map(|i| NewOrderLine {
                    product_id: i.product_id,
                    name: i.name,
                    unit_price: i.unit_price,
                    quantity: i.quantity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSessionParams {
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSessionResult {
    pub session_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateParams {
    pub status: OrderStatus,
}

/// An order together with its line items, as returned by the order endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}
