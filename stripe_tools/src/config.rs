use std::time::Duration;

use log::*;
use osp_common::ApiSecret;

const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Base URL of the provider's REST API. Overridable so tests can point at a stub server.
    pub api_base: String,
    pub secret_key: ApiSecret,
    /// Applied to every outbound call, so no gateway round trip can block a request indefinitely.
    pub timeout: Duration,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            secret_key: ApiSecret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_base = std::env::var("OSP_STRIPE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let secret_key = ApiSecret::new(std::env::var("OSP_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("OSP_STRIPE_SECRET_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let timeout = std::env::var("OSP_STRIPE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Self { api_base, secret_key, timeout }
    }
}
