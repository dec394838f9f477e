use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{
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
};

/// Order aggregate storage.
///
/// The one concurrency-bearing method is [`update_order_status_checked`][OrderManagement::update_order_status_checked]:
/// a compare-and-set that only applies when the stored status is one the caller expected. Conflicting concurrent
/// transitions serialize on it without any global lock; the loser sees
/// [`PaymentGatewayError::TransitionConflict`] and re-reads.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Store a new order with its item snapshots and an `order_created` timeline entry, atomically.
    /// Idempotent: returns `false` in the second element if the order id already existed.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    /// The single indexed lookup for "find the order this processor object refers to". Matches either the
    /// checkout session id or the payment intent id; callers never need to care which reference they hold.
    async fn fetch_order_by_processor_reference(&self, reference: &str)
        -> Result<Option<Order>, PaymentGatewayError>;

    /// All orders in which `user_id` participates, as buyer or seller, oldest first.
    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PaymentGatewayError>;

    /// All of `buyer_id`'s orders whose item snapshots contain `product_id`, regardless of status.
    async fn fetch_orders_for_product_buyer(
        &self,
        buyer_id: &str,
        product_id: &ProductId,
    ) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Compare-and-set status update: applies only if the stored status is in `expected`, returning the updated
    /// order. Zero matching rows is a [`PaymentGatewayError::TransitionConflict`] (or `OrderNotFound` when the
    /// order does not exist at all).
    async fn update_order_status_checked(
        &self,
        order_id: &OrderId,
        expected: &[OrderStatus],
        new_status: OrderStatus,
    ) -> Result<Order, PaymentGatewayError>;

    async fn set_checkout_session(
        &self,
        order_id: &OrderId,
        session: &CheckoutSessionRef,
    ) -> Result<Order, PaymentGatewayError>;

    async fn set_payment_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<Order, PaymentGatewayError>;

    async fn set_payment_intent(&self, order_id: &OrderId, intent_id: &str) -> Result<(), PaymentGatewayError>;

    async fn set_dispute_status(
        &self,
        order_id: &OrderId,
        status: DisputeStatus,
    ) -> Result<Order, PaymentGatewayError>;

    /// Flag the order for human follow-up (amount mismatch, fraud signal). Blocks downloads, not progress.
    async fn flag_for_review(&self, order_id: &OrderId) -> Result<Order, PaymentGatewayError>;

    /// Append one timeline entry. Returns `false` when an entry with the same (order, type, correlation id)
    /// already exists — the append is the idempotency ledger, so re-delivered external events never duplicate.
    async fn append_timeline_event(&self, event: NewTimelineEvent) -> Result<bool, PaymentGatewayError>;

    async fn fetch_timeline(&self, order_id: &OrderId) -> Result<Vec<TimelineEvent>, PaymentGatewayError>;

    async fn timeline_event_exists(
        &self,
        order_id: &OrderId,
        event_type: TimelineEventType,
        correlation_id: Option<&str>,
    ) -> Result<bool, PaymentGatewayError>;
}

/// Download bookkeeping: artifact references, the rate-limit log and the best-effort analytics counter.
#[allow(async_fn_in_trait)]
pub trait DownloadManagement: Clone {
    /// Store the deliverable references for an order's digital items. Idempotent per (order, product).
    async fn store_artifacts(
        &self,
        order_id: &OrderId,
        artifacts: &[NewDigitalArtifact],
    ) -> Result<(), PaymentGatewayError>;

    async fn fetch_artifact(
        &self,
        order_id: &OrderId,
        product_id: &ProductId,
    ) -> Result<Option<DigitalArtifact>, PaymentGatewayError>;

    async fn log_download_attempt(&self, entry: NewDownloadLogEntry) -> Result<(), PaymentGatewayError>;

    /// Number of download attempts logged against `order_id` by `user_id` since `since`. Used for the sliding
    /// rate-limit window; a slightly stale count under-limits, which is the safe direction.
    async fn count_recent_downloads(
        &self,
        order_id: &OrderId,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, PaymentGatewayError>;

    /// Does `seller_id` appear as the seller on any order containing `product_id`? The catalog service owns
    /// product ownership; at this boundary the order snapshots are the best available evidence.
    async fn seller_owns_product(&self, seller_id: &str, product_id: &ProductId)
        -> Result<bool, PaymentGatewayError>;

    /// Bump the denormalized per-product download counter. Analytics only; callers treat failure as non-fatal.
    async fn bump_product_downloads(&self, product_id: &ProductId) -> Result<(), PaymentGatewayError>;
}

/// Seller payout/onboarding profiles, maintained from `account.updated` webhook events.
#[allow(async_fn_in_trait)]
pub trait SellerManagement: Clone {
    /// Create the seller ↔ connected-account link. Called by the (out of scope) onboarding flow and by tests.
    async fn create_seller_profile(
        &self,
        seller_id: &str,
        stripe_account_id: &str,
    ) -> Result<SellerProfile, PaymentGatewayError>;

    async fn fetch_seller_profile(&self, seller_id: &str) -> Result<Option<SellerProfile>, PaymentGatewayError>;

    /// Update the onboarding tri-state for a connected account. Returns `None` when no seller is linked to the
    /// account (the event is then acknowledged and dropped).
    async fn update_seller_onboarding(
        &self,
        stripe_account_id: &str,
        status: OnboardingStatus,
    ) -> Result<Option<SellerProfile>, PaymentGatewayError>;
}

/// The umbrella bound for backends supporting the full engine: order storage, download bookkeeping and seller
/// profiles, with `url()` for diagnostics.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + OrderManagement + DownloadManagement + SellerManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} was not in an expected state for a move to {target}")]
    TransitionConflict { order_id: OrderId, target: OrderStatus },
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
