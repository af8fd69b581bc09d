use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::{TimeZone, Utc};
use osp_common::Money;
use settlement_engine::db_types::{Order, OrderId, OrderLine, OrderStatus};

pub async fn get_request(
    path: &str,
    configure: impl FnOnce(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let req = TestRequest::get().uri(path).to_request();
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

pub async fn post_request(
    path: &str,
    body: serde_json::Value,
    configure: impl FnOnce(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let req = TestRequest::post().uri(path).set_json(body).to_request();
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

/// A $150.00 order fixture in the given state.
pub fn order_fixture(status: OrderStatus) -> Order {
    Order {
        id: 1,
        order_id: OrderId("ord16chars000001".into()),
        customer_id: "cust-1".to_string(),
        total_price: Money::from_cents(15_000),
        discount: Money::default(),
        coupon_code: None,
        status,
        payment_session_id: match status {
            OrderStatus::Pending => None,
            _ => Some("cs_test_1".to_string()),
        },
        payment_intent_id: match status {
            OrderStatus::Pending => None,
            _ => Some("pi_test_1".to_string()),
        },
        settlement_published_at: None,
        created_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap(),
    }
}

pub fn lines_fixture(order_id: &OrderId) -> Vec<OrderLine> {
    vec![
        OrderLine {
            id: 1,
            order_id: order_id.clone(),
            product_id: "prod-1".to_string(),
            name: "Espresso machine".to_string(),
            unit_price: Money::from_cents(12_500),
            quantity: 1,
        },
        OrderLine {
            id: 2,
            order_id: order_id.clone(),
            product_id: "prod-2".to_string(),
            name: "Bag of beans".to_string(),
            unit_price: Money::from_cents(1_250),
            quantity: 2,
        },
    ]
}
