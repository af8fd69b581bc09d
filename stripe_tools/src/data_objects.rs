use osp_common::Money;
use serde::Deserialize;

/// Request parameters for opening a hosted checkout session.
#[derive(Debug, Clone)]
pub struct NewCheckoutSession {
    pub line_items: Vec<CheckoutLineItem>,
    /// Coupon forwarded to the provider when a discount applies.
    pub coupon: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutLineItem {
    pub name: String,
    /// Unit price in minor currency units, as the provider expects ($20.99 -> 2099).
    pub unit_amount: Money,
    pub quantity: i64,
}

/// The provider's representation of a hosted checkout session, reduced to the fields we consume.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// The URL the customer must be redirected to. Absent once the session has completed.
    pub url: Option<String>,
    /// Attached once the customer has reached the payment step.
    pub payment_intent: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// "succeeded", "processing", "requires_payment_method", "canceled", ...
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: String,
    pub status: Option<String>,
}
