//! Shared fixtures for the engine integration tests. Everything runs against an in-memory SQLite database.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use bazaar_payment_engine::{
    db_types::{ActorRole, NewOrder, NewOrderItem, OrderId, OrderStatus, ProductId},
    events::EventProducers,
    traits::{OrderManagement, ProcessorClient, SellerManagement},
    OrderFlowApi,
    ReconcilerApi,
    SecretCache,
    SqliteDatabase,
};
use bpg_common::{Cents, Secret};
use stripe_tools::{
    CheckoutSession,
    CheckoutSessionCompleted,
    CheckoutSessionStatus,
    NewCheckoutSession,
    StripeApiError,
    WebhookEvent,
};

pub const BUYER: &str = "user-buyer";
pub const SELLER: &str = "user-seller";
pub const SELLER_ACCOUNT: &str = "acct_seller_1";
pub const PRODUCT: &str = "prod-ebook";

pub async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("in-memory database")
}

pub fn digital_order() -> NewOrder {
    NewOrder::new(
        BUYER.to_string(),
        SELLER.to_string(),
        vec![NewOrderItem {
            product_id: ProductId(PRODUCT.to_string()),
            quantity: 1,
            unit_price: Cents::from(4999),
            is_digital: true,
        }],
    )
}

pub fn physical_order() -> NewOrder {
    NewOrder::new(
        BUYER.to_string(),
        SELLER.to_string(),
        vec![NewOrderItem {
            product_id: ProductId("prod-mug".to_string()),
            quantity: 2,
            unit_price: Cents::from(1200),
            is_digital: false,
        }],
    )
}

/// Insert an order and walk it to `Approved` through the ordinary seller flow.
pub async fn approved_order(db: &SqliteDatabase, order: NewOrder) -> OrderId {
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.process_new_order(order).await.expect("order creation");
    let oid = order.order_id.clone();
    api.modify_status_for_order(&oid, OrderStatus::Approved, SELLER, &[ActorRole::Seller])
        .await
        .expect("seller approval");
    oid
}

/// Seed a seller profile with completed processor onboarding.
pub async fn onboarded_seller(db: &SqliteDatabase) {
    db.create_seller_profile(SELLER, SELLER_ACCOUNT).await.expect("seller profile");
    db.update_seller_onboarding(SELLER_ACCOUNT, bazaar_payment_engine::db_types::OnboardingStatus::Complete)
        .await
        .expect("onboarding update")
        .expect("profile exists");
}

pub fn reconciler(db: &SqliteDatabase) -> ReconcilerApi<SqliteDatabase> {
    reconciler_with_producers(db, EventProducers::default())
}

pub fn reconciler_with_producers(db: &SqliteDatabase, producers: EventProducers) -> ReconcilerApi<SqliteDatabase> {
    ReconcilerApi::new(
        db.clone(),
        producers,
        SecretCache::fixed(Secret::new("whsec_platform".to_string())),
        SecretCache::fixed(Secret::new("whsec_account".to_string())),
    )
}

/// A `checkout.session.completed` event for the given order, reporting `amount` cents collected.
pub fn session_completed_event(event_id: &str, oid: &OrderId, amount: i64) -> WebhookEvent {
    let mut metadata = HashMap::new();
    metadata.insert("order_id".to_string(), oid.as_str().to_string());
    WebhookEvent::CheckoutSessionCompleted {
        event_id: event_id.to_string(),
        session: CheckoutSessionCompleted {
            id: format!("cs_{}", oid.as_str()),
            payment_status: Some("paid".to_string()),
            amount_total: Some(amount),
            payment_intent: Some(format!("pi_{}", oid.as_str())),
            metadata,
        },
    }
}

/// Fetch the order or panic; test shorthand.
pub async fn get_order(db: &SqliteDatabase, oid: &OrderId) -> bazaar_payment_engine::db_types::Order {
    db.fetch_order_by_order_id(oid).await.expect("fetch order").expect("order exists")
}

//--------------------------------------    Stub processor     -------------------------------------------------------
/// A canned processor for checkout tests: records the sessions it created and answers `fetch` with a
/// configurable open/closed state.
#[derive(Clone, Default)]
pub struct StubProcessor {
    pub sessions_created: Arc<Mutex<Vec<String>>>,
    pub session_open: Arc<Mutex<bool>>,
}

impl StubProcessor {
    pub fn new() -> Self {
        Self { sessions_created: Arc::new(Mutex::new(Vec::new())), session_open: Arc::new(Mutex::new(true)) }
    }

    pub fn close_sessions(&self) {
        *self.session_open.lock().unwrap() = false;
    }

    fn session(&self, id: &str) -> CheckoutSession {
        let open = *self.session_open.lock().unwrap();
        CheckoutSession {
            id: id.to_string(),
            url: Some(format!("https://checkout.stripe.test/{id}")),
            status: if open { CheckoutSessionStatus::Open } else { CheckoutSessionStatus::Expired },
            payment_status: Some("unpaid".to_string()),
            amount_total: None,
            payment_intent: None,
            expires_at: Some(chrono::Utc::now().timestamp() + 1800),
            metadata: HashMap::new(),
        }
    }
}

impl ProcessorClient for StubProcessor {
    async fn create_checkout_session(
        &self,
        params: &NewCheckoutSession,
        idempotency_key: &str,
    ) -> Result<CheckoutSession, StripeApiError> {
        self.sessions_created.lock().unwrap().push(idempotency_key.to_string());
        Ok(self.session(&format!("cs_{}", params.order_id)))
    }

    async fn fetch_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeApiError> {
        Ok(self.session(session_id))
    }
}
