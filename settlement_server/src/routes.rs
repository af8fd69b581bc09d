//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. For this reason, any long, non-cpu-bound operation (e.g. I/O,
//! database operations, etc.) should be expressed as futures or asynchronous functions. Async handlers get executed
//! concurrently by worker threads and thus don’t block execution.

use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use serde_json::json;
use settlement_engine::{
    db_types::OrderId,
    events::SettlementPublisher,
    traits::{OrderManagement, PaymentSessionGateway},
    ConfirmOutcome,
    OrderFlowApi,
};

use crate::{
    data_objects::{CartSnapshot, OrderResult, PaymentSessionParams, PaymentSessionResult, StatusUpdateParams},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// -------------------------------------------   Create order  -------------------------------------------------------
route!(create_order => Post "/orders" impl OrderManagement, PaymentSessionGateway, SettlementPublisher);
/// Creates a new order from a priced cart snapshot. The order starts in `Pending` with the line prices
/// fixed as submitted. Returns 201 with the order and its line items.
pub async fn create_order<B, G, P>(
    api: web::Data<OrderFlowApi<B, G, P>>,
    body: web::Json<CartSnapshot>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement,
    G: PaymentSessionGateway,
    P: SettlementPublisher,
{
    let cart = body.into_inner();
    debug!("💻️📦️ New order request from customer {} with {} item(s)", cart.customer_id, cart.items.len());
    let (order, lines) = api.create_order(cart.into()).await?;
    Ok(HttpResponse::Created().json(OrderResult { order, lines }))
}

// -------------------------------------------   Fetch order  --------------------------------------------------------
route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement, PaymentSessionGateway, SettlementPublisher);
pub async fn order_by_id<B, G, P>(
    api: web::Data<OrderFlowApi<B, G, P>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement,
    G: PaymentSessionGateway,
    P: SettlementPublisher,
{
    let order_id = OrderId::from(path.into_inner());
    let (order, lines) = api.fetch_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(OrderResult { order, lines }))
}

// ----------------------------------------   Payment session  -------------------------------------------------------
route!(create_payment_session => Post "/orders/{order_id}/payment-session" impl OrderManagement, PaymentSessionGateway, SettlementPublisher);
/// Opens a hosted payment session for a pending order and returns the redirect URL for the customer. A
/// session is opened at most once per order; repeated calls return 409.
pub async fn create_payment_session<B, G, P>(
    api: web::Data<OrderFlowApi<B, G, P>>,
    path: web::Path<String>,
    body: web::Json<PaymentSessionParams>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement,
    G: PaymentSessionGateway,
    P: SettlementPublisher,
{
    let order_id = OrderId::from(path.into_inner());
    let params = body.into_inner();
    let session = api.open_payment_session(&order_id, &params.success_url, &params.cancel_url).await?;
    Ok(HttpResponse::Ok()
        .json(PaymentSessionResult { session_id: session.session_id, redirect_url: session.redirect_url }))
}

// ----------------------------------------   Confirm payment  -------------------------------------------------------
route!(confirm_payment => Post "/orders/{order_id}/confirm-payment" impl OrderManagement, PaymentSessionGateway, SettlementPublisher);
/// Polls the payment provider for the order's session. Settles the order on a confirmed payment. An
/// unconfirmed payment is a normal poll outcome and returns 200 with `"kind": "PaymentNotConfirmed"`;
/// the client is expected to call again.
pub async fn confirm_payment<B, G, P>(
    api: web::Data<OrderFlowApi<B, G, P>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement,
    G: PaymentSessionGateway,
    P: SettlementPublisher,
{
    let order_id = OrderId::from(path.into_inner());
    let response = match api.confirm_payment(&order_id).await? {
        ConfirmOutcome::Approved(order) => json!({ "kind": "Approved", "order": order }),
        ConfirmOutcome::AlreadySettled(order) => json!({ "kind": "AlreadySettled", "order": order }),
        ConfirmOutcome::NotConfirmed { order, status } => {
            json!({ "kind": "PaymentNotConfirmed", "status": status.to_string(), "order": order })
        },
    };
    Ok(HttpResponse::Ok().json(response))
}

// ------------------------------------------   Update status  -------------------------------------------------------
route!(update_order_status => Post "/orders/{order_id}/status" impl OrderManagement, PaymentSessionGateway, SettlementPublisher);
/// Administrative status changes: fulfilment (`ReadyForPickup`, `Completed`), cancellation and refunds.
/// Transitions the state machine does not allow return 409.
pub async fn update_order_status<B, G, P>(
    api: web::Data<OrderFlowApi<B, G, P>>,
    path: web::Path<String>,
    body: web::Json<StatusUpdateParams>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement,
    G: PaymentSessionGateway,
    P: SettlementPublisher,
{
    let order_id = OrderId::from(path.into_inner());
    let target = body.into_inner().status;
    debug!("💻️📦️ Status change request for order {order_id} to {target}");
    let order = api.update_status(&order_id, target).await?;
    Ok(HttpResponse::Ok().json(order))
}
