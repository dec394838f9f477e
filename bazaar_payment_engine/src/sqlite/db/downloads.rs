use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{DigitalArtifact, NewDigitalArtifact, NewDownloadLogEntry, OrderId, ProductId},
    traits::PaymentGatewayError,
};

pub async fn store_artifacts(
    order_id: &OrderId,
    artifacts: &[NewDigitalArtifact],
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    for artifact in artifacts {
        sqlx::query(
            r#"
            INSERT INTO digital_artifacts (order_id, product_id, object_key)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_id, product_id) DO NOTHING
            "#,
        )
        .bind(order_id.as_str())
        .bind(&artifact.product_id)
        .bind(&artifact.object_key)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn fetch_artifact(
    order_id: &OrderId,
    product_id: &ProductId,
    conn: &mut SqliteConnection,
) -> Result<Option<DigitalArtifact>, sqlx::Error> {
    let artifact =
        sqlx::query_as("SELECT * FROM digital_artifacts WHERE order_id = $1 AND product_id = $2")
            .bind(order_id.as_str())
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    Ok(artifact)
}

pub async fn log_attempt(
    entry: NewDownloadLogEntry,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        "INSERT INTO download_log (order_id, user_id, product_id, granted, created_at) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&entry.order_id)
    .bind(&entry.user_id)
    .bind(&entry.product_id)
    .bind(entry.granted)
    .bind(entry.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn count_recent(
    order_id: &OrderId,
    user_id: &str,
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, PaymentGatewayError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM download_log WHERE order_id = $1 AND user_id = $2 AND created_at > $3",
    )
    .bind(order_id.as_str())
    .bind(user_id)
    .bind(since)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

pub async fn seller_owns_product(
    seller_id: &str,
    product_id: &ProductId,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM orders
        JOIN order_items ON orders.order_id = order_items.order_id
        WHERE orders.seller_id = $1 AND order_items.product_id = $2
        "#,
    )
    .bind(seller_id)
    .bind(product_id)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

pub async fn bump_product_downloads(
    product_id: &ProductId,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
        INSERT INTO product_stats (product_id, download_count) VALUES ($1, 1)
        ON CONFLICT (product_id) DO UPDATE SET download_count = download_count + 1
        "#,
    )
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}
