//! Interface contracts of the settlement engine.
//!
//! * [`OrderManagement`] defines the behaviour an order store must expose to back the order lifecycle.
//!   The order store is the single source of truth for order state; its conditional updates are the
//!   concurrency-control backstop for state transitions.
//! * [`RewardLedger`] defines the reward accrual store. Its uniqueness guarantee on order id is what makes
//!   at-least-once event delivery safe to consume.
//! * [`PaymentSessionGateway`] is the narrow contract of the external hosted-payment provider. It is treated
//!   as authoritative; a failed call surfaces as an error and is never retried blindly by the engine.
mod order_management;
mod payment_gateway;
mod reward_ledger;

pub use order_management::{OrderManagement, OrderStoreError};
pub use payment_gateway::{
    CheckoutSession,
    GatewayError,
    NewCheckoutSession,
    PaymentIntentStatus,
    PaymentSessionGateway,
    SessionLineItem,
    SessionStatus,
};
pub use reward_ledger::{RewardLedger, RewardStoreError};
