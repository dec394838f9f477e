use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqlitePool;

use crate::{
    db_types::{
        CheckoutSessionRef,
        DigitalArtifact,
        DisputeStatus,
        NewDigitalArtifact,
        NewDownloadLogEntry,
        NewOrder,
        NewTimelineEvent,
        OnboardingStatus,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentStatus,
        ProductId,
        SellerProfile,
        TimelineEvent,
        TimelineEventType,
    },
    sqlite::db,
    traits::{DownloadManagement, OrderManagement, PaymentGatewayDatabase, PaymentGatewayError, SellerManagement},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Connect to the database at `url`, creating the schema if needed. `sqlite::memory:` works and is what the
    /// test suites use.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let pool = db::new_pool(url, max_connections).await?;
        db::create_schema(&pool).await?;
        debug!("🗃️ Connected to database at {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let result = db::orders::idempotent_insert(order, &mut *tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::fetch_order_items(order_id, &mut conn).await?)
    }

    async fn fetch_order_by_processor_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::fetch_order_by_processor_reference(reference, &mut conn).await?)
    }

    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::fetch_orders_for_user(user_id, &mut conn).await?)
    }

    async fn fetch_orders_for_product_buyer(
        &self,
        buyer_id: &str,
        product_id: &ProductId,
    ) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::fetch_orders_for_product_buyer(buyer_id, product_id.as_str(), &mut conn).await?)
    }

    async fn update_order_status_checked(
        &self,
        order_id: &OrderId,
        expected: &[OrderStatus],
        new_status: OrderStatus,
    ) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::update_order_status_checked(order_id, expected, new_status, &mut conn).await
    }

    async fn set_checkout_session(
        &self,
        order_id: &OrderId,
        session: &CheckoutSessionRef,
    ) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::set_checkout_session(order_id, session, &mut conn).await
    }

    async fn set_payment_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::set_payment_status(order_id, status, &mut conn).await
    }

    async fn set_payment_intent(&self, order_id: &OrderId, intent_id: &str) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::set_payment_intent(order_id, intent_id, &mut conn).await
    }

    async fn set_dispute_status(
        &self,
        order_id: &OrderId,
        status: DisputeStatus,
    ) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::set_dispute_status(order_id, status, &mut conn).await
    }

    async fn flag_for_review(&self, order_id: &OrderId) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::flag_for_review(order_id, &mut conn).await
    }

    async fn append_timeline_event(&self, event: NewTimelineEvent) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::timeline::append_event(event, &mut conn).await
    }

    async fn fetch_timeline(&self, order_id: &OrderId) -> Result<Vec<TimelineEvent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::timeline::fetch_timeline(order_id, &mut conn).await?)
    }

    async fn timeline_event_exists(
        &self,
        order_id: &OrderId,
        event_type: TimelineEventType,
        correlation_id: Option<&str>,
    ) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::timeline::event_exists(order_id, event_type, correlation_id, &mut conn).await
    }
}

impl DownloadManagement for SqliteDatabase {
    async fn store_artifacts(
        &self,
        order_id: &OrderId,
        artifacts: &[NewDigitalArtifact],
    ) -> Result<(), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        db::downloads::store_artifacts(order_id, artifacts, &mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_artifact(
        &self,
        order_id: &OrderId,
        product_id: &ProductId,
    ) -> Result<Option<DigitalArtifact>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::downloads::fetch_artifact(order_id, product_id, &mut conn).await?)
    }

    async fn log_download_attempt(&self, entry: NewDownloadLogEntry) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::downloads::log_attempt(entry, &mut conn).await
    }

    async fn count_recent_downloads(
        &self,
        order_id: &OrderId,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::downloads::count_recent(order_id, user_id, since, &mut conn).await
    }

    async fn seller_owns_product(
        &self,
        seller_id: &str,
        product_id: &ProductId,
    ) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::downloads::seller_owns_product(seller_id, product_id, &mut conn).await
    }

    async fn bump_product_downloads(&self, product_id: &ProductId) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::downloads::bump_product_downloads(product_id, &mut conn).await
    }
}

impl SellerManagement for SqliteDatabase {
    async fn create_seller_profile(
        &self,
        seller_id: &str,
        stripe_account_id: &str,
    ) -> Result<SellerProfile, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::sellers::create_profile(seller_id, stripe_account_id, &mut conn).await
    }

    async fn fetch_seller_profile(&self, seller_id: &str) -> Result<Option<SellerProfile>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::sellers::fetch_profile(seller_id, &mut conn).await?)
    }

    async fn update_seller_onboarding(
        &self,
        stripe_account_id: &str,
        status: OnboardingStatus,
    ) -> Result<Option<SellerProfile>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::sellers::update_onboarding(stripe_account_id, status, &mut conn).await
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        &self.url
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}
