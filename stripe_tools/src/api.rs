use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::de::DeserializeOwned;

use crate::{
    config::StripeConfig,
    data_objects::{CheckoutSession, NewCheckoutSession, PaymentIntent, Refund},
    StripeApiError,
};

/// A thin client for a Stripe-style hosted checkout API. It covers the four calls the settlement pipeline
/// consumes: create a checkout session, retrieve a session, retrieve a payment intent, and create a refund.
///
/// The client performs no retries of its own; retry policy belongs to the caller.
#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let val = HeaderValue::from_str(&config.secret_key.bearer_header())
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// Sends a form-encoded request (the provider's wire convention) and deserializes the JSON response.
    pub async fn form_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method.clone(), url);
        if !params.is_empty() {
            req = if method == Method::GET { req.query(params) } else { req.form(params) };
        }
        let response = req.send().await.map_err(|e| StripeApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            Err(StripeApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }

    /// Opens a hosted checkout session in payment mode. Returns the session including the redirect URL.
    pub async fn create_checkout_session(&self, session: NewCheckoutSession) -> Result<CheckoutSession, StripeApiError> {
        let mut params: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), session.success_url),
            ("cancel_url".into(), session.cancel_url),
        ];
        for (i, item) in session.line_items.iter().enumerate() {
            params.push((format!("line_items[{i}][price_data][currency]"), osp_common::SETTLEMENT_CURRENCY_CODE.into()));
            params.push((format!("line_items[{i}][price_data][unit_amount]"), item.unit_amount.value().to_string()));
            params.push((format!("line_items[{i}][price_data][product_data][name]"), item.name.clone()));
            params.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
        }
        if let Some(coupon) = session.coupon {
            params.push(("discounts[0][coupon]".into(), coupon));
        }
        debug!("Creating checkout session with {} line item(s)", session.line_items.len());
        let session = self.form_query::<CheckoutSession>(Method::POST, "/checkout/sessions", &params).await?;
        info!("Created checkout session {}", session.id);
        Ok(session)
    }

    pub async fn get_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeApiError> {
        let path = format!("/checkout/sessions/{session_id}");
        debug!("Fetching checkout session {session_id}");
        self.form_query::<CheckoutSession>(Method::GET, &path, &[]).await
    }

    pub async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, StripeApiError> {
        let path = format!("/payment_intents/{payment_intent_id}");
        debug!("Fetching payment intent {payment_intent_id}");
        self.form_query::<PaymentIntent>(Method::GET, &path, &[]).await
    }

    /// Refunds the full charge behind the given payment intent.
    pub async fn create_refund(&self, payment_intent_id: &str) -> Result<Refund, StripeApiError> {
        let params = vec![("payment_intent".to_string(), payment_intent_id.to_string())];
        debug!("Requesting refund for payment intent {payment_intent_id}");
        let refund = self.form_query::<Refund>(Method::POST, "/refunds", &params).await?;
        info!("Refund {} created for payment intent {payment_intent_id}", refund.id);
        Ok(refund)
    }
}
