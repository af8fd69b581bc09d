use std::fmt::{self, Debug, Display};

/// A payment-provider API key that never shows up in logs or debug output.
///
/// The key leaves the wrapper only as the `Authorization` header value of a gateway call; anything that
/// formats the surrounding config (startup logging, error contexts) sees the masked form instead.
#[derive(Clone, Default)]
pub struct ApiSecret(String);

impl ApiSecret {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self(key.into())
    }

    /// The `Authorization` header value for the provider's bearer scheme.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl Debug for ApiSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiSecret(********)")
    }
}

impl Display for ApiSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}
