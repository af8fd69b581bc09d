//! `SqliteDatabase` is a concrete implementation of the settlement store.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`OrderManagement`] and
//! [`RewardLedger`] traits.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sqlx::SqlitePool;

use super::db::{new_pool, orders, rewards};
use crate::{
    db_types::{NewOrder, Order, OrderId, OrderLine, OrderStatus, RewardRecord},
    traits::{OrderManagement, OrderStoreError, RewardLedger, RewardStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a connection pool against the given URL and brings the schema up to date.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("📝️ Connected to database at {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, id: OrderId, order: NewOrder) -> Result<Order, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::insert_order(id, order, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_lines(&self, order_id: &OrderId) -> Result<Vec<OrderLine>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let lines = orders::fetch_order_lines(order_id, &mut conn).await?;
        Ok(lines)
    }

    async fn set_payment_session(&self, order_id: &OrderId, session_id: &str) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::set_payment_session(order_id, session_id, &mut conn).await
    }

    async fn approve_order(
        &self,
        order_id: &OrderId,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::approve_order(order_id, payment_intent_id, &mut conn).await
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(order_id, from, to, &mut conn).await
    }

    async fn mark_settlement_published(&self, order_id: &OrderId) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::mark_settlement_published(order_id, &mut conn).await
    }

    async fn fetch_unpublished_settlements(&self, grace: Duration) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_unpublished_settlements(grace, &mut conn).await
    }
}

impl RewardLedger for SqliteDatabase {
    async fn credit(
        &self,
        order_id: &OrderId,
        customer_id: &str,
        accrual: i64,
    ) -> Result<(RewardRecord, bool), RewardStoreError> {
        let mut conn = self.pool.acquire().await?;
        rewards::idempotent_credit(order_id, customer_id, accrual, &mut conn).await
    }

    async fn fetch_reward(&self, order_id: &OrderId) -> Result<Option<RewardRecord>, RewardStoreError> {
        let mut conn = self.pool.acquire().await?;
        let record = rewards::fetch_reward(order_id, &mut conn).await?;
        Ok(record)
    }
}
