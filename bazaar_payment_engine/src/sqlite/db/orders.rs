use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{
        ActorType,
        CheckoutSessionRef,
        DisputeStatus,
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentStatus,
        TimelineEventType,
    },
    sqlite::db::timeline,
    traits::PaymentGatewayError,
};

/// Inserts the order with its item snapshots and an `order_created` timeline entry. Returns `false` in the second
/// element if the order already existed. Callers are expected to run this inside a transaction.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), PaymentGatewayError> {
    let inserted = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(existing) => (existing, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentGatewayError> {
    let total = order.total_price();
    let inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                buyer_id,
                seller_id,
                total_price,
                currency,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.buyer_id)
    .bind(&order.seller_id)
    .bind(total.value())
    .bind(&order.currency)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await?;
    for item in &order.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price, is_digital) VALUES ($1, $2, $3, \
             $4, $5)",
        )
        .bind(&order.order_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price.value())
        .bind(item.is_digital)
        .execute(&mut *conn)
        .await?;
    }
    let created = crate::db_types::NewTimelineEvent {
        order_id: order.order_id.clone(),
        event_type: TimelineEventType::OrderCreated,
        actor: order.buyer_id.clone(),
        actor_type: ActorType::User,
        correlation_id: None,
        meta: serde_json::json!({ "total_price": total.value(), "items": order.items.len() }),
    };
    timeline::append_event(created, conn).await?;
    Ok(inserted)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// One lookup for every "which order does this processor object belong to" question. Checkout session ids and
/// payment intent ids live in different columns but are disjoint namespaces, so a single reference string is
/// matched against both.
pub async fn fetch_order_by_processor_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE checkout_session_id = $1 OR payment_intent_id = $1 LIMIT 1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_orders_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders =
        sqlx::query_as("SELECT * FROM orders WHERE buyer_id = $1 OR seller_id = $1 ORDER BY created_at ASC")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    Ok(orders)
}

pub async fn fetch_orders_for_product_buyer(
    buyer_id: &str,
    product_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        SELECT orders.* FROM orders
        JOIN order_items ON orders.order_id = order_items.order_id
        WHERE orders.buyer_id = $1 AND order_items.product_id = $2
        ORDER BY orders.created_at ASC
        "#,
    )
    .bind(buyer_id)
    .bind(product_id)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// The compare-and-set status update. The new status is only written when the current status is one of
/// `expected`; a concurrent transition that got there first makes this a zero-row update, reported as a
/// `TransitionConflict` so the caller can re-read and decide whether the effect is already in place.
pub(crate) async fn update_order_status_checked(
    order_id: &OrderId,
    expected: &[OrderStatus],
    new_status: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let expected_clause =
        expected.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
    let sql = format!(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status IN \
         ({expected_clause}) RETURNING *"
    );
    trace!("📝️ Executing CAS update: {sql}");
    let result: Option<Order> =
        sqlx::query_as(&sql).bind(new_status.to_string()).bind(order_id.as_str()).fetch_optional(&mut *conn).await?;
    match result {
        Some(order) => Ok(order),
        None => match fetch_order_by_order_id(order_id, conn).await? {
            Some(_) => Err(PaymentGatewayError::TransitionConflict { order_id: order_id.clone(), target: new_status }),
            None => Err(PaymentGatewayError::OrderNotFound(order_id.clone())),
        },
    }
}

/// Record the outstanding checkout session on the order and mark the payment as `Initiated`, atomically.
pub(crate) async fn set_checkout_session(
    order_id: &OrderId,
    session: &CheckoutSessionRef,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            checkout_session_id = $1,
            checkout_session_url = $2,
            checkout_session_created_at = $3,
            payment_status = $4,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $5
        RETURNING *
        "#,
    )
    .bind(&session.session_id)
    .bind(&session.session_url)
    .bind(session.created_at)
    .bind(PaymentStatus::Initiated.to_string())
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))
}

pub(crate) async fn set_payment_status(
    order_id: &OrderId,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET payment_status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 RETURNING *",
    )
    .bind(status.to_string())
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))
}

pub(crate) async fn set_payment_intent(
    order_id: &OrderId,
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    let res = sqlx::query(
        "UPDATE orders SET payment_intent_id = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2",
    )
    .bind(intent_id)
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(PaymentGatewayError::OrderNotFound(order_id.clone()));
    }
    Ok(())
}

pub(crate) async fn set_dispute_status(
    order_id: &OrderId,
    status: DisputeStatus,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET dispute_status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 RETURNING *",
    )
    .bind(status.to_string())
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))
}

pub(crate) async fn flag_for_review(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET requires_review = 1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $1 RETURNING *",
    )
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))
}
