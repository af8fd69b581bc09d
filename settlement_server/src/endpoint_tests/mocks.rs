use chrono::Duration;
use mockall::mock;
use settlement_engine::{
    db_types::{NewOrder, Order, OrderId, OrderLine, OrderStatus},
    events::{EventChannelError, SettlementEvent, SettlementPublisher},
    traits::{
        CheckoutSession,
        GatewayError,
        NewCheckoutSession,
        OrderManagement,
        OrderStoreError,
        PaymentIntentStatus,
        PaymentSessionGateway,
        SessionStatus,
    },
};

mock! {
    pub OrderStore {}
    impl OrderManagement for OrderStore {
        async fn insert_order(&self, id: OrderId, order: NewOrder) -> Result<Order, OrderStoreError>;
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;
        async fn fetch_order_lines(&self, order_id: &OrderId) -> Result<Vec<OrderLine>, OrderStoreError>;
        async fn set_payment_session(&self, order_id: &OrderId, session_id: &str) -> Result<Order, OrderStoreError>;
        async fn approve_order(&self, order_id: &OrderId, payment_intent_id: &str) -> Result<Option<Order>, OrderStoreError>;
        async fn update_order_status(&self, order_id: &OrderId, from: OrderStatus, to: OrderStatus) -> Result<Option<Order>, OrderStoreError>;
        async fn mark_settlement_published(&self, order_id: &OrderId) -> Result<Order, OrderStoreError>;
        async fn fetch_unpublished_settlements(&self, grace: Duration) -> Result<Vec<Order>, OrderStoreError>;
    }
}

mock! {
    pub Gateway {}
    impl PaymentSessionGateway for Gateway {
        async fn create_session(&self, session: NewCheckoutSession) -> Result<CheckoutSession, GatewayError>;
        async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError>;
        async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntentStatus, GatewayError>;
        async fn refund(&self, payment_intent_id: &str) -> Result<String, GatewayError>;
    }
}

mock! {
    pub Publisher {}
    impl SettlementPublisher for Publisher {
        async fn publish(&self, event: &SettlementEvent) -> Result<(), EventChannelError>;
    }
}
