use bazaar_payment_engine::{
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
    traits::{
        DownloadManagement,
        OrderManagement,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        SellerManagement,
    },
};
use chrono::{DateTime, Utc};
use mockall::mock;

mock! {
    pub Database {}

    impl Clone for Database {
        fn clone(&self) -> Self;
    }

    impl OrderManagement for Database {
        async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError>;
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError>;
        async fn fetch_order_by_processor_reference(&self, reference: &str) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn fetch_orders_for_product_buyer(&self, buyer_id: &str, product_id: &ProductId) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn update_order_status_checked(&self, order_id: &OrderId, expected: &[OrderStatus], new_status: OrderStatus) -> Result<Order, PaymentGatewayError>;
        async fn set_checkout_session(&self, order_id: &OrderId, session: &CheckoutSessionRef) -> Result<Order, PaymentGatewayError>;
        async fn set_payment_status(&self, order_id: &OrderId, status: PaymentStatus) -> Result<Order, PaymentGatewayError>;
        async fn set_payment_intent(&self, order_id: &OrderId, intent_id: &str) -> Result<(), PaymentGatewayError>;
        async fn set_dispute_status(&self, order_id: &OrderId, status: DisputeStatus) -> Result<Order, PaymentGatewayError>;
        async fn flag_for_review(&self, order_id: &OrderId) -> Result<Order, PaymentGatewayError>;
        async fn append_timeline_event(&self, event: NewTimelineEvent) -> Result<bool, PaymentGatewayError>;
        async fn fetch_timeline(&self, order_id: &OrderId) -> Result<Vec<TimelineEvent>, PaymentGatewayError>;
        async fn timeline_event_exists<'a>(&self, order_id: &OrderId, event_type: TimelineEventType, correlation_id: Option<&'a str>) -> Result<bool, PaymentGatewayError>;
    }

    impl DownloadManagement for Database {
        async fn store_artifacts(&self, order_id: &OrderId, artifacts: &[NewDigitalArtifact]) -> Result<(), PaymentGatewayError>;
        async fn fetch_artifact(&self, order_id: &OrderId, product_id: &ProductId) -> Result<Option<DigitalArtifact>, PaymentGatewayError>;
        async fn log_download_attempt(&self, entry: NewDownloadLogEntry) -> Result<(), PaymentGatewayError>;
        async fn count_recent_downloads(&self, order_id: &OrderId, user_id: &str, since: DateTime<Utc>) -> Result<i64, PaymentGatewayError>;
        async fn seller_owns_product(&self, seller_id: &str, product_id: &ProductId) -> Result<bool, PaymentGatewayError>;
        async fn bump_product_downloads(&self, product_id: &ProductId) -> Result<(), PaymentGatewayError>;
    }

    impl SellerManagement for Database {
        async fn create_seller_profile(&self, seller_id: &str, stripe_account_id: &str) -> Result<SellerProfile, PaymentGatewayError>;
        async fn fetch_seller_profile(&self, seller_id: &str) -> Result<Option<SellerProfile>, PaymentGatewayError>;
        async fn update_seller_onboarding(&self, stripe_account_id: &str, status: OnboardingStatus) -> Result<Option<SellerProfile>, PaymentGatewayError>;
    }

    impl PaymentGatewayDatabase for Database {
        fn url(&self) -> &str;
    }
}
