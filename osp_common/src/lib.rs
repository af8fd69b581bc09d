mod money;
mod secret;

pub use money::{Money, MoneyConversionError, SETTLEMENT_CURRENCY_CODE};
pub use secret::ApiSecret;
