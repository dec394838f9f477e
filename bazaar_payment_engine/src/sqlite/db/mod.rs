//! # SQLite database methods
//!
//! "Low-level" SQLite interactions, kept as simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection`. Callers can obtain a connection from a pool, or open a transaction and pass
//! `&mut *tx` when several statements must land atomically.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod downloads;
pub mod orders;
pub mod sellers;
pub mod timeline;

const SQLITE_DB_URL: &str = "sqlite://data/bazaar_store.db";

pub fn db_url() -> String {
    let result = env::var("BPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("BPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Create the schema if it does not exist yet. Safe to run at every startup, and it is what makes in-memory
/// databases usable in tests.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), SqlxError> {
    let statements = [
        r#"CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL UNIQUE,
            buyer_id TEXT NOT NULL,
            seller_id TEXT NOT NULL,
            total_price INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT 'usd',
            status TEXT NOT NULL DEFAULT 'Requested',
            payment_status TEXT NOT NULL DEFAULT 'NotStarted',
            dispute_status TEXT NOT NULL DEFAULT 'None',
            requires_review INTEGER NOT NULL DEFAULT 0,
            checkout_session_id TEXT,
            checkout_session_url TEXT,
            checkout_session_created_at TIMESTAMP,
            payment_intent_id TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"#,
        "CREATE INDEX IF NOT EXISTS ix_orders_buyer ON orders (buyer_id)",
        "CREATE INDEX IF NOT EXISTS ix_orders_seller ON orders (seller_id)",
        "CREATE INDEX IF NOT EXISTS ix_orders_session ON orders (checkout_session_id)",
        "CREATE INDEX IF NOT EXISTS ix_orders_intent ON orders (payment_intent_id)",
        r#"CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            unit_price INTEGER NOT NULL,
            is_digital INTEGER NOT NULL DEFAULT 0
        )"#,
        "CREATE INDEX IF NOT EXISTS ix_items_order ON order_items (order_id)",
        "CREATE INDEX IF NOT EXISTS ix_items_product ON order_items (product_id)",
        r#"CREATE TABLE IF NOT EXISTS timeline_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            actor TEXT NOT NULL,
            actor_type TEXT NOT NULL DEFAULT 'system',
            correlation_id TEXT,
            meta TEXT NOT NULL DEFAULT '{}',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"#,
        // The idempotency ledger: one entry per (order, event type, external event id)
        r#"CREATE UNIQUE INDEX IF NOT EXISTS ux_timeline_dedup
            ON timeline_events (order_id, event_type, correlation_id)
            WHERE correlation_id IS NOT NULL"#,
        r#"CREATE TABLE IF NOT EXISTS download_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            granted INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"#,
        "CREATE INDEX IF NOT EXISTS ix_downloads_order_user ON download_log (order_id, user_id, created_at)",
        r#"CREATE TABLE IF NOT EXISTS digital_artifacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            object_key TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (order_id, product_id)
        )"#,
        r#"CREATE TABLE IF NOT EXISTS seller_profiles (
            seller_id TEXT PRIMARY KEY,
            stripe_account_id TEXT NOT NULL UNIQUE,
            onboarding_status TEXT NOT NULL DEFAULT 'Incomplete',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"#,
        r#"CREATE TABLE IF NOT EXISTS product_stats (
            product_id TEXT PRIMARY KEY,
            download_count INTEGER NOT NULL DEFAULT 0
        )"#,
    ];
    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
