use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatus},
    traits::{GatewayError, OrderStoreError},
};

#[derive(Debug, Error)]
pub enum OrderFlowError {
    /// Bad input. Never retried.
    #[error("Invalid order request. {0}")]
    ValidationError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    /// A state-machine violation. Never retried.
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("A payment session has already been opened for order {0}")]
    PaymentSessionAlreadyOpen(OrderId),
    #[error("No payment session has been opened for order {0}")]
    PaymentSessionMissing(OrderId),
    /// The payment provider call failed. The caller may retry; the engine does not.
    #[error("Payment provider error. {0}")]
    UpstreamGatewayError(#[from] GatewayError),
    /// The order store is unavailable. The caller may retry.
    #[error("The order store is unavailable. {0}")]
    TransientStoreError(String),
}

impl From<OrderStoreError> for OrderFlowError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::DatabaseError(msg) => OrderFlowError::TransientStoreError(msg),
            OrderStoreError::OrderAlreadyExists(id) => {
                OrderFlowError::ValidationError(format!("Order {id} already exists"))
            },
            OrderStoreError::OrderNotFound(id) => OrderFlowError::OrderNotFound(id),
            OrderStoreError::PaymentSessionAlreadySet(id) => OrderFlowError::PaymentSessionAlreadyOpen(id),
        }
    }
}
