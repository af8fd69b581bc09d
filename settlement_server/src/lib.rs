//! # Settlement server
//! The HTTP front end of the order settlement pipeline. It is responsible for:
//! Accepting priced cart snapshots and creating orders.
//! Opening hosted payment sessions with the payment provider.
//! Confirming payments and driving the order state machine.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/orders`: Create an order from a cart snapshot.
//! * `/orders/{order_id}`: Fetch an order and its line items.
//! * `/orders/{order_id}/payment-session`: Open a hosted payment session.
//! * `/orders/{order_id}/confirm-payment`: Poll the provider and settle the order on success.
//! * `/orders/{order_id}/status`: Administrative status changes (fulfilment, cancellation, refund).

pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod reconciliation_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
