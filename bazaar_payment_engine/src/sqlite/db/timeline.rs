use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTimelineEvent, OrderId, TimelineEvent, TimelineEventType},
    traits::PaymentGatewayError,
};

/// Append one event to an order's timeline. The table only ever sees INSERTs; the unique index over
/// (order_id, event_type, correlation_id) makes the append idempotent for externally-correlated events, and
/// `false` is returned when the entry was already present.
pub async fn append_event(
    event: NewTimelineEvent,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let meta = serde_json::to_string(&event.meta).unwrap_or_else(|_| "{}".to_string());
    let result = sqlx::query(
        r#"
        INSERT INTO timeline_events (order_id, event_type, actor, actor_type, correlation_id, meta)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&event.order_id)
    .bind(event.event_type)
    .bind(&event.actor)
    .bind(event.actor_type)
    .bind(&event.correlation_id)
    .bind(meta)
    .execute(conn)
    .await?;
    let appended = result.rows_affected() > 0;
    if !appended {
        trace!("📝️ Timeline entry {} for {} already present, skipping", event.event_type, event.order_id);
    }
    Ok(appended)
}

pub async fn fetch_timeline(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<TimelineEvent>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM timeline_events WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(events)
}

pub async fn event_exists(
    order_id: &OrderId,
    event_type: TimelineEventType,
    correlation_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let count: i64 = match correlation_id {
        Some(correlation) => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM timeline_events WHERE order_id = $1 AND event_type = $2 AND correlation_id = $3",
            )
            .bind(order_id.as_str())
            .bind(event_type)
            .bind(correlation)
            .fetch_one(conn)
            .await?
        },
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM timeline_events WHERE order_id = $1 AND event_type = $2")
                .bind(order_id.as_str())
                .bind(event_type)
                .fetch_one(conn)
                .await?
        },
    };
    Ok(count > 0)
}
