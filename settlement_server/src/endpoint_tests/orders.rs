use actix_web::{http::StatusCode, web, web::ServiceConfig};
use serde_json::json;
use settlement_engine::{
    db_types::OrderStatus,
    traits::{CheckoutSession, PaymentIntentStatus, SessionStatus},
    OrderFlowApi,
};

use super::{
    helpers::{get_request, lines_fixture, order_fixture, post_request},
    mocks::{MockGateway, MockOrderStore, MockPublisher},
};
use crate::routes::{
    ConfirmPaymentRoute,
    CreateOrderRoute,
    CreatePaymentSessionRoute,
    OrderByIdRoute,
    UpdateOrderStatusRoute,
};

fn configure_with(
    db: MockOrderStore,
    gateway: MockGateway,
    publisher: MockPublisher,
) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = OrderFlowApi::new(db, gateway, publisher);
        cfg.service(CreateOrderRoute::<MockOrderStore, MockGateway, MockPublisher>::new())
            .service(OrderByIdRoute::<MockOrderStore, MockGateway, MockPublisher>::new())
            .service(CreatePaymentSessionRoute::<MockOrderStore, MockGateway, MockPublisher>::new())
            .service(ConfirmPaymentRoute::<MockOrderStore, MockGateway, MockPublisher>::new())
            .service(UpdateOrderStatusRoute::<MockOrderStore, MockGateway, MockPublisher>::new())
            .app_data(web::Data::new(api));
    }
}

fn cart_body() -> serde_json::Value {
    json!({
        "customerId": "cust-1",
        "totalPrice": 15000,
        "items": [
            { "productId": "prod-1", "name": "Espresso machine", "unitPrice": 12500, "quantity": 1 },
            { "productId": "prod-2", "name": "Bag of beans", "unitPrice": 1250, "quantity": 2 }
        ]
    })
}

#[actix_web::test]
async fn create_order_returns_the_created_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderStore::new();
    db.expect_insert_order().returning(|_, _| Ok(order_fixture(OrderStatus::Pending)));
    db.expect_fetch_order_lines().returning(|id| Ok(lines_fixture(id)));
    let (status, body) =
        post_request("/orders", cart_body(), configure_with(db, MockGateway::new(), MockPublisher::new()))
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, CREATED_ORDER_JSON);
}

#[actix_web::test]
async fn create_order_rejects_a_mismatched_total() {
    let _ = env_logger::try_init().ok();
    let mut body = cart_body();
    body["totalPrice"] = json!(99_999);
    let (status, body) =
        post_request("/orders", body, configure_with(MockOrderStore::new(), MockGateway::new(), MockPublisher::new()))
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains(r#""kind":"Validation""#), "{body}");
}

#[actix_web::test]
async fn fetching_an_unknown_order_returns_404() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderStore::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(None));
    let (status, body) =
        get_request("/orders/doesnotexist", configure_with(db, MockGateway::new(), MockPublisher::new()))
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains(r#""kind":"OrderNotFound""#), "{body}");
}

#[actix_web::test]
async fn payment_session_returns_the_redirect_url() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderStore::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(order_fixture(OrderStatus::Pending))));
    db.expect_fetch_order_lines().returning(|id| Ok(lines_fixture(id)));
    db.expect_set_payment_session().returning(|_, session_id| {
        let mut order = order_fixture(OrderStatus::Pending);
        order.payment_session_id = Some(session_id.to_string());
        Ok(order)
    });
    let mut gateway = MockGateway::new();
    gateway.expect_create_session().times(1).returning(|_| {
        Ok(CheckoutSession {
            session_id: "cs_test_1".to_string(),
            redirect_url: "https://pay.example/cs_test_1".to_string(),
        })
    });
    let body = json!({ "successUrl": "https://shop.example/done", "cancelUrl": "https://shop.example/cart" });
    let (status, body) = post_request(
        "/orders/ord16chars000001/payment-session",
        body,
        configure_with(db, gateway, MockPublisher::new()),
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"sessionId":"cs_test_1","redirectUrl":"https://pay.example/cs_test_1"}"#);
}

#[actix_web::test]
async fn payment_session_is_opened_at_most_once() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderStore::new();
    db.expect_fetch_order_by_order_id().returning(|_| {
        let mut order = order_fixture(OrderStatus::Pending);
        order.payment_session_id = Some("cs_test_1".to_string());
        Ok(Some(order))
    });
    let mut gateway = MockGateway::new();
    gateway.expect_create_session().never();
    let body = json!({ "successUrl": "https://shop.example/done", "cancelUrl": "https://shop.example/cart" });
    let (status, body) = post_request(
        "/orders/ord16chars000001/payment-session",
        body,
        configure_with(db, gateway, MockPublisher::new()),
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains(r#""kind":"PaymentSessionAlreadyOpen""#), "{body}");
}

#[actix_web::test]
async fn confirm_payment_reports_an_unconfirmed_payment() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderStore::new();
    db.expect_fetch_order_by_order_id().returning(|_| {
        let mut order = order_fixture(OrderStatus::Pending);
        order.payment_session_id = Some("cs_test_1".to_string());
        Ok(Some(order))
    });
    let mut gateway = MockGateway::new();
    gateway
        .expect_get_session_status()
        .returning(|_| Ok(SessionStatus { payment_intent_id: Some("pi_test_1".to_string()) }));
    gateway.expect_get_payment_intent().returning(|_| Ok(PaymentIntentStatus::Pending));
    let mut publisher = MockPublisher::new();
    publisher.expect_publish().never();
    let (status, body) =
        post_request("/orders/ord16chars000001/confirm-payment", json!({}), configure_with(db, gateway, publisher))
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""kind":"PaymentNotConfirmed""#), "{body}");
    assert!(body.contains(r#""status":"pending""#), "{body}");
}

#[actix_web::test]
async fn confirm_payment_settles_the_order_and_publishes_once() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderStore::new();
    db.expect_fetch_order_by_order_id().returning(|_| {
        let mut order = order_fixture(OrderStatus::Pending);
        order.payment_session_id = Some("cs_test_1".to_string());
        Ok(Some(order))
    });
    db.expect_approve_order().times(1).returning(|_, _| Ok(Some(order_fixture(OrderStatus::Approved))));
    db.expect_mark_settlement_published().times(1).returning(|_| {
        let mut order = order_fixture(OrderStatus::Approved);
        order.settlement_published_at = Some(order.updated_at);
        Ok(order)
    });
    let mut gateway = MockGateway::new();
    gateway
        .expect_get_session_status()
        .returning(|_| Ok(SessionStatus { payment_intent_id: Some("pi_test_1".to_string()) }));
    gateway.expect_get_payment_intent().returning(|_| Ok(PaymentIntentStatus::Succeeded));
    let mut publisher = MockPublisher::new();
    // $150.00 order accrues 150 points
    publisher.expect_publish().times(1).withf(|e| e.accrual_amount == 150).returning(|_| Ok(()));
    let (status, body) =
        post_request("/orders/ord16chars000001/confirm-payment", json!({}), configure_with(db, gateway, publisher))
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""kind":"Approved""#), "{body}");
}

#[actix_web::test]
async fn confirming_a_settled_order_is_a_no_op() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderStore::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(order_fixture(OrderStatus::Approved))));
    let mut gateway = MockGateway::new();
    gateway.expect_get_session_status().never();
    let mut publisher = MockPublisher::new();
    publisher.expect_publish().never();
    let (status, body) =
        post_request("/orders/ord16chars000001/confirm-payment", json!({}), configure_with(db, gateway, publisher))
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""kind":"AlreadySettled""#), "{body}");
}

#[actix_web::test]
async fn invalid_status_transitions_are_rejected() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderStore::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(order_fixture(OrderStatus::Completed))));
    db.expect_update_order_status().never();
    let (status, body) = post_request(
        "/orders/ord16chars000001/status",
        json!({ "status": "Approved" }),
        configure_with(db, MockGateway::new(), MockPublisher::new()),
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains(r#""kind":"InvalidTransition""#), "{body}");
}

#[actix_web::test]
async fn cancelling_an_approved_order_refunds_the_payment() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderStore::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(order_fixture(OrderStatus::Approved))));
    db.expect_update_order_status()
        .times(1)
        .returning(|_, _, _| Ok(Some(order_fixture(OrderStatus::Cancelled))));
    let mut gateway = MockGateway::new();
    gateway.expect_refund().times(1).returning(|_| Ok("re_test_1".to_string()));
    let (status, body) = post_request(
        "/orders/ord16chars000001/status",
        json!({ "status": "Cancelled" }),
        configure_with(db, gateway, MockPublisher::new()),
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"Cancelled""#), "{body}");
}

const CREATED_ORDER_JSON: &str = r#"{"order":{"id":1,"orderId":"ord16chars000001","customerId":"cust-1","totalPrice":15000,"discount":0,"couponCode":null,"status":"Pending","paymentSessionId":null,"paymentIntentId":null,"settlementPublishedAt":null,"createdAt":"2024-02-29T13:30:00Z","updatedAt":"2024-02-29T13:30:00Z"},"lines":[{"id":1,"orderId":"ord16chars000001","productId":"prod-1","name":"Espresso machine","unitPrice":12500,"quantity":1},{"id":2,"orderId":"ord16chars000001","productId":"prod-2","name":"Bag of beans","unitPrice":1250,"quantity":2}]}"#;
