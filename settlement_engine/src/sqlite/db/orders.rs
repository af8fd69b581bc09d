use chrono::Duration;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderLine, OrderStatus},
    traits::OrderStoreError,
};

/// Inserts a new order header and its line items using the given connection. This is not atomic on its
/// own; callers wrap it in a transaction and pass `&mut *tx` as the connection argument.
pub async fn insert_order(
    id: OrderId,
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderStoreError> {
    if fetch_order_by_order_id(&id, conn).await?.is_some() {
        return Err(OrderStoreError::OrderAlreadyExists(id));
    }
    let header: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_id,
                total_price,
                discount,
                coupon_code
            ) VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(&id)
    .bind(order.customer_id)
    .bind(order.total_price.value())
    .bind(order.discount.value())
    .bind(order.coupon_code)
    .fetch_one(&mut *conn)
    .await?;
    for line in order.lines {
        sqlx::query(
            "INSERT INTO order_lines (order_id, product_id, name, unit_price, quantity) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&id)
        .bind(line.product_id)
        .bind(line.name)
        .bind(line.unit_price.value())
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?;
    }
    debug!("📝️ Order [{}] inserted with id {}", header.order_id, header.id);
    Ok(header)
}

/// Returns the order with the given public `order_id`, if it exists.
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_lines(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderLine>, sqlx::Error> {
    let lines = sqlx::query_as("SELECT * FROM order_lines WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

/// Stores the payment session id on a pending order. The conditional WHERE clause enforces the
/// set-at-most-once invariant at the store level, so a racing second call cannot overwrite the first.
pub async fn set_payment_session(
    order_id: &OrderId,
    session_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderStoreError> {
    let updated: Option<Order> = sqlx::query_as(
        "UPDATE orders SET payment_session_id = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status = \
         'Pending' AND payment_session_id IS NULL RETURNING *",
    )
    .bind(session_id)
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(order) => Ok(order),
        None => match fetch_order_by_order_id(order_id, conn).await? {
            Some(order) if order.payment_session_id.is_some() => {
                Err(OrderStoreError::PaymentSessionAlreadySet(order_id.clone()))
            },
            Some(order) => Err(OrderStoreError::DatabaseError(format!(
                "Cannot attach a payment session to order {order_id} in status {}",
                order.status
            ))),
            None => Err(OrderStoreError::OrderNotFound(order_id.clone())),
        },
    }
}

/// Compare-and-set transition `Pending` -> `Approved`, storing the payment intent id. Returns `None` if
/// the order was no longer `Pending` (another writer won, or the order was cancelled in the meantime).
pub async fn approve_order(
    order_id: &OrderId,
    payment_intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderStoreError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = 'Approved', payment_intent_id = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id \
         = $2 AND status = 'Pending' RETURNING *",
    )
    .bind(payment_intent_id)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    trace!("📝️ approve_order({order_id}): {}", if result.is_some() { "committed" } else { "guard failed" });
    Ok(result)
}

/// Compare-and-set status transition. Returns `None` if the order no longer holds the `from` status.
pub async fn update_order_status(
    order_id: &OrderId,
    from: OrderStatus,
    to: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderStoreError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status = $3 RETURNING *",
    )
    .bind(to.to_string())
    .bind(order_id.as_str())
    .bind(from.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

pub async fn mark_settlement_published(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderStoreError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET settlement_published_at = CURRENT_TIMESTAMP WHERE order_id = $1 RETURNING *",
    )
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or(OrderStoreError::OrderNotFound(order_id.clone()))
}

/// Approved orders whose settlement publish was never recorded, last touched at least `grace` ago. A
/// grace of zero returns every pending reconciliation item.
pub async fn fetch_unpublished_settlements(
    grace: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, OrderStoreError> {
    let rows = sqlx::query_as(
        "SELECT * FROM orders WHERE status = 'Approved' AND settlement_published_at IS NULL AND \
         (unixepoch(CURRENT_TIMESTAMP) - unixepoch(updated_at)) >= $1 ORDER BY updated_at ASC",
    )
    .bind(grace.num_seconds())
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
