use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use osp_common::Money;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------      OrderId       ----------------------------------------------------------
/// An opaque, publicly visible order identifier, assigned when the order is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh order id. Ids are 16 alphanumeric characters, which is comfortably collision-free
    /// at the order volumes this store handles.
    pub fn random() -> Self {
        let id = rand::thread_rng().sample_iter(&Alphanumeric).take(16).map(char::from).collect::<String>();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------    OrderStatus     ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// The order has been created and no payment has been confirmed yet.
    Pending,
    /// Payment has been confirmed by the payment provider.
    Approved,
    /// The order has been fulfilled and is awaiting collection.
    ReadyForPickup,
    /// The order has been collected. Terminal.
    Completed,
    /// The order was cancelled by the user or an admin. Terminal.
    Cancelled,
    /// The payment was refunded after approval. Terminal.
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// The order state machine. Transitions not in this table are invalid:
    ///
    /// | From \ To      | Approved | ReadyForPickup | Completed | Cancelled | Refunded |
    /// |----------------|----------|----------------|-----------|-----------|----------|
    /// | Pending        | ✓        |                |           | ✓         |          |
    /// | Approved       |          | ✓              |           | ✓         | ✓        |
    /// | ReadyForPickup |          |                | ✓         | ✓         |          |
    pub fn can_transition_to(&self, new_status: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, new_status),
            (Pending, Approved) |
                (Approved, ReadyForPickup) |
                (ReadyForPickup, Completed) |
                (Pending | Approved | ReadyForPickup, Cancelled) |
                (Approved, Refunded)
        )
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Approved => write!(f, "Approved"),
            OrderStatus::ReadyForPickup => write!(f, "ReadyForPickup"),
            OrderStatus::Completed => write!(f, "Completed"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
            OrderStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "ReadyForPickup" => Ok(Self::ReadyForPickup),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------       Order        ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub total_price: Money,
    pub discount: Money,
    pub coupon_code: Option<String>,
    pub status: OrderStatus,
    /// Set at most once, when a hosted payment session is opened for the order.
    pub payment_session_id: Option<String>,
    /// Set only when the order transitions into `Approved`.
    pub payment_intent_id: Option<String>,
    /// The time the settlement event for this order was successfully handed to the event channel.
    /// `None` on an Approved order marks a pending reconciliation item.
    pub settlement_published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     OrderLine      ----------------------------------------------------------
/// A line item belonging to an order. The unit price is a snapshot taken at order creation and is never
/// re-priced from the catalog.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

//--------------------------------------      NewOrder      ----------------------------------------------------------
/// A priced cart snapshot, as submitted by the storefront. Converted into an [`Order`] plus its
/// [`OrderLine`]s by [`crate::OrderFlowApi::create_order`].
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: String,
    pub total_price: Money,
    pub discount: Money,
    pub coupon_code: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl NewOrder {
    pub fn new(customer_id: String, total_price: Money, lines: Vec<NewOrderLine>) -> Self {
        Self { customer_id, total_price, discount: Money::default(), coupon_code: None, lines }
    }

    pub fn with_coupon(mut self, code: String, discount: Money) -> Self {
        self.coupon_code = Some(code);
        self.discount = discount;
        self
    }

    /// The sum of the line item prices, before the coupon discount is applied.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(|l| l.unit_price * l.quantity).sum()
    }
}

//--------------------------------------    RewardRecord    ----------------------------------------------------------
/// An immutable reward accrual entry. At most one record exists per order id; the first successful credit
/// is authoritative and is never amended by a duplicate delivery.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRecord {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    /// The accrual in whole currency units, derived from the order total.
    pub accrual: i64,
    pub rewarded_at: DateTime<Utc>,
}
