use std::str::FromStr;

use osp_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The contract of the external hosted-payment provider, as consumed by the order lifecycle.
///
/// The engine never retries these calls itself; retry policy belongs to the HTTP caller. Implementations
/// must bound every call with a timeout.
#[allow(async_fn_in_trait)]
pub trait PaymentSessionGateway: Send + Sync {
    /// Opens a hosted checkout session for the given line items and returns the session id together with
    /// the URL the customer must be redirected to.
    async fn create_session(&self, session: NewCheckoutSession) -> Result<CheckoutSession, GatewayError>;

    /// Retrieves the session and reports the payment intent it resolved to, if any.
    async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError>;

    async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntentStatus, GatewayError>;

    /// Refunds the payment behind the given intent. Returns the provider's refund id.
    async fn refund(&self, payment_intent_id: &str) -> Result<String, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct NewCheckoutSession {
    pub line_items: Vec<SessionLineItem>,
    /// Coupon code forwarded to the provider when a discount applies.
    pub coupon_code: Option<String>,
    pub discount: Money,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct SessionLineItem {
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub session_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// `None` while the provider has not attached a payment intent to the session yet.
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentIntentStatus {
    Succeeded,
    Pending,
    Failed,
}

impl FromStr for PaymentIntentStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "succeeded" => Ok(Self::Succeeded),
            "canceled" | "cancelled" | "failed" => Ok(Self::Failed),
            // "processing", "requires_payment_method", "requires_action" etc. are all still in flight
            s if s.starts_with("requires_") || s == "processing" || s == "pending" => Ok(Self::Pending),
            s => Err(GatewayError::UnexpectedResponse(format!("Unknown payment intent status: {s}"))),
        }
    }
}

impl std::fmt::Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentIntentStatus::Succeeded => write!(f, "succeeded"),
            PaymentIntentStatus::Pending => write!(f, "pending"),
            PaymentIntentStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not reach the payment provider: {0}")]
    RequestError(String),
    #[error("The payment provider rejected the call. Error {status}. {message}")]
    UpstreamError { status: u16, message: String },
    #[error("The payment provider returned an unusable response: {0}")]
    UnexpectedResponse(String),
}
