mod errors;
mod order_flow_api;
mod rewards_api;

pub use errors::OrderFlowError;
pub use order_flow_api::{ConfirmOutcome, OrderFlowApi};
pub use rewards_api::RewardsApi;
