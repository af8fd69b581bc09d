use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use settlement_engine::{
    events::{MemoryBroker, SettlementEventConsumer, TopicPublisher},
    OrderFlowApi,
    RewardsApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::StripeGateway,
    reconciliation_worker::start_reconciliation_worker,
    routes::{
        health,
        ConfirmPaymentRoute,
        CreateOrderRoute,
        CreatePaymentSessionRoute,
        OrderByIdRoute,
        UpdateOrderStatusRoute,
    },
};

type ProductionApi = OrderFlowApi<SqliteDatabase, StripeGateway, TopicPublisher>;

/// Wires the process together and runs it to completion: one database pool, one broker, one order flow
/// API shared by every worker, plus the reward consumer and the reconciliation worker as background
/// tasks.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let broker = MemoryBroker::new(config.visibility_timeout, config.max_delivery_count);
    let subscription = broker.subscribe(&config.settlement_topic, &config.rewards_subscription);
    let publisher = broker.publisher(&config.settlement_topic);
    let gateway = StripeGateway::new(config.stripe_config.clone())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let orders_api = OrderFlowApi::new(db.clone(), gateway, publisher);
    let rewards_api = RewardsApi::new(db);
    let consumer = SettlementEventConsumer::new(subscription, rewards_api, config.consumer_concurrency);
    let _consumer_handle = tokio::spawn(consumer.run());
    let _reconciler_handle =
        start_reconciliation_worker(orders_api.clone(), config.reconciliation_interval, config.reconciliation_grace);

    let srv = create_server_instance(&config, orders_api)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: &ServerConfig, orders_api: ProductionApi) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("osp::access_log"))
            .app_data(web::Data::new(orders_api.clone()))
            .service(health)
            .service(CreateOrderRoute::<SqliteDatabase, StripeGateway, TopicPublisher>::new())
            .service(OrderByIdRoute::<SqliteDatabase, StripeGateway, TopicPublisher>::new())
            .service(CreatePaymentSessionRoute::<SqliteDatabase, StripeGateway, TopicPublisher>::new())
            .service(ConfirmPaymentRoute::<SqliteDatabase, StripeGateway, TopicPublisher>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase, StripeGateway, TopicPublisher>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
