use std::{env, time::Duration};

use chrono::Duration as ChronoDuration;
use log::*;
use stripe_tools::StripeConfig;

const DEFAULT_OSP_HOST: &str = "127.0.0.1";
const DEFAULT_OSP_PORT: u16 = 8360;
const DEFAULT_SETTLEMENT_TOPIC: &str = "order.settlements";
const DEFAULT_REWARDS_SUBSCRIPTION: &str = "rewards";
const DEFAULT_CONSUMER_CONCURRENCY: usize = 4;
const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_DELIVERY_COUNT: u32 = 10;
const DEFAULT_RECONCILIATION_INTERVAL_SECS: u64 = 60;
const DEFAULT_RECONCILIATION_GRACE_SECS: i64 = 300;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Payment provider client configuration.
    pub stripe_config: StripeConfig,
    /// The topic settlement events are published on.
    pub settlement_topic: String,
    /// The subscription the reward consumer reads from.
    pub rewards_subscription: String,
    /// How many deliveries the reward consumer processes at once.
    pub consumer_concurrency: usize,
    /// How long a delivery may stay unsettled before the channel redelivers it.
    pub visibility_timeout: Duration,
    /// Deliveries exceeding this count are dead-lettered.
    pub max_delivery_count: u32,
    /// How often the reconciliation worker re-scans for unpublished settlements.
    pub reconciliation_interval: Duration,
    /// How old an Approved order must be before the reconciliation worker republishes its event. Keeps
    /// the sweep from racing an in-flight first publish.
    pub reconciliation_grace: ChronoDuration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OSP_HOST.to_string(),
            port: DEFAULT_OSP_PORT,
            database_url: String::default(),
            stripe_config: StripeConfig::default(),
            settlement_topic: DEFAULT_SETTLEMENT_TOPIC.to_string(),
            rewards_subscription: DEFAULT_REWARDS_SUBSCRIPTION.to_string(),
            consumer_concurrency: DEFAULT_CONSUMER_CONCURRENCY,
            visibility_timeout: Duration::from_secs(DEFAULT_VISIBILITY_TIMEOUT_SECS),
            max_delivery_count: DEFAULT_MAX_DELIVERY_COUNT,
            reconciliation_interval: Duration::from_secs(DEFAULT_RECONCILIATION_INTERVAL_SECS),
            reconciliation_grace: ChronoDuration::seconds(DEFAULT_RECONCILIATION_GRACE_SECS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("OSP_HOST").ok().unwrap_or_else(|| DEFAULT_OSP_HOST.into());
        let port = env::var("OSP_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for OSP_PORT. {e} Using the default, {DEFAULT_OSP_PORT}, instead."
                    );
                    DEFAULT_OSP_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_OSP_PORT);
        let database_url = env::var("OSP_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ OSP_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let stripe_config = StripeConfig::new_from_env_or_default();
        let settlement_topic =
            env::var("OSP_SETTLEMENT_TOPIC").ok().unwrap_or_else(|| DEFAULT_SETTLEMENT_TOPIC.into());
        let rewards_subscription =
            env::var("OSP_REWARDS_SUBSCRIPTION").ok().unwrap_or_else(|| DEFAULT_REWARDS_SUBSCRIPTION.into());
        let consumer_concurrency = parse_env("OSP_CONSUMER_CONCURRENCY", DEFAULT_CONSUMER_CONCURRENCY);
        let visibility_timeout =
            Duration::from_secs(parse_env("OSP_VISIBILITY_TIMEOUT", DEFAULT_VISIBILITY_TIMEOUT_SECS));
        let max_delivery_count = parse_env("OSP_MAX_DELIVERY_COUNT", DEFAULT_MAX_DELIVERY_COUNT);
        let reconciliation_interval =
            Duration::from_secs(parse_env("OSP_RECONCILIATION_INTERVAL", DEFAULT_RECONCILIATION_INTERVAL_SECS));
        let reconciliation_grace =
            ChronoDuration::seconds(parse_env("OSP_RECONCILIATION_GRACE", DEFAULT_RECONCILIATION_GRACE_SECS));
        Self {
            host,
            port,
            database_url,
            stripe_config,
            settlement_topic,
            rewards_subscription,
            consumer_concurrency,
            visibility_timeout,
            max_delivery_count,
            reconciliation_interval,
            reconciliation_grace,
        }
    }
}

fn parse_env<T: std::str::FromStr + std::fmt::Display>(var: &str, default: T) -> T
where T::Err: std::fmt::Display {
    match env::var(var) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {var} ({s}). {e}. Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {var} is not set. Using the default value of {default}.");
            default
        },
    }
}
