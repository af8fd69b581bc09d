mod api;
mod config;
mod data_objects;
mod error;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{CheckoutLineItem, CheckoutSession, NewCheckoutSession, PaymentIntent, Refund};
pub use error::StripeApiError;
