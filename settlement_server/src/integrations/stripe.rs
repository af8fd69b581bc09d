//! Glue between the engine's payment gateway contract and the `stripe_tools` client.
use log::*;
use settlement_engine::traits::{
    CheckoutSession,
    GatewayError,
    NewCheckoutSession,
    PaymentIntentStatus,
    PaymentSessionGateway,
    SessionStatus,
};
use stripe_tools::{CheckoutLineItem, StripeApi, StripeApiError, StripeConfig};

#[derive(Clone)]
pub struct StripeGateway {
    api: StripeApi,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Result<Self, GatewayError> {
        let api = StripeApi::new(config).map_err(|e| GatewayError::RequestError(e.to_string()))?;
        Ok(Self { api })
    }
}

impl PaymentSessionGateway for StripeGateway {
    async fn create_session(&self, session: NewCheckoutSession) -> Result<CheckoutSession, GatewayError> {
        // The provider only applies discounts through coupon codes.
        if session.discount.is_positive() && session.coupon_code.is_none() {
            warn!(
                "💳️ A discount of {} was given without a coupon code. The hosted session will show the \
                 undiscounted total.",
                session.discount
            );
        }
        let request = stripe_tools::NewCheckoutSession {
            line_items: session
                .line_items
                .into_iter()
                .map(|l| CheckoutLineItem { name: l.name, unit_amount: l.unit_price, quantity: l.quantity })
                .collect(),
            coupon: session.coupon_code,
            success_url: session.success_url,
            cancel_url: session.cancel_url,
        };
        let created = self.api.create_checkout_session(request).await.map_err(into_gateway_error)?;
        let redirect_url = created.url.ok_or_else(|| {
            GatewayError::UnexpectedResponse(format!("Checkout session {} came back without a redirect URL", created.id))
        })?;
        Ok(CheckoutSession { session_id: created.id, redirect_url })
    }

    async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        let session = self.api.get_checkout_session(session_id).await.map_err(into_gateway_error)?;
        trace!("💳️ Session {session_id} status: {:?}", session.status);
        Ok(SessionStatus { payment_intent_id: session.payment_intent })
    }

    async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntentStatus, GatewayError> {
        let intent = self.api.get_payment_intent(payment_intent_id).await.map_err(into_gateway_error)?;
        intent.status.parse::<PaymentIntentStatus>()
    }

    async fn refund(&self, payment_intent_id: &str) -> Result<String, GatewayError> {
        let refund = self.api.create_refund(payment_intent_id).await.map_err(into_gateway_error)?;
        Ok(refund.id)
    }
}

fn into_gateway_error(e: StripeApiError) -> GatewayError {
    match e {
        StripeApiError::QueryError { status, message } => GatewayError::UpstreamError { status, message },
        StripeApiError::JsonError(msg) => GatewayError::UnexpectedResponse(msg),
        e => GatewayError::RequestError(e.to_string()),
    }
}
