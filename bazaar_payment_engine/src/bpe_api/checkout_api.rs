use chrono::{DateTime, Duration, TimeZone, Utc};
use log::*;
use serde::Serialize;
use stripe_tools::NewCheckoutSession;

use crate::{
    bpe_api::errors::CheckoutApiError,
    db_types::{
        CheckoutSessionRef,
        NewTimelineEvent,
        OnboardingStatus,
        Order,
        OrderId,
        OrderStatus,
        PaymentStatus,
        TimelineEventType,
    },
    traits::{PaymentGatewayDatabase, ProcessorClient},
};

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// How long an outstanding session is eligible for reuse before a fresh one is created.
    pub reuse_window: Duration,
    /// Flat platform fee, in basis points of the order total.
    pub platform_fee_bps: u32,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self { reuse_window: Duration::minutes(30), platform_fee_bps: 500 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSessionResult {
    pub session_id: String,
    pub session_url: Option<String>,
    pub reused: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The payment session manager: creates a hosted checkout session for an approved digital order, or returns the
/// one already outstanding so double-clicks and reloads cannot produce duplicate charges.
pub struct CheckoutApi<B, P> {
    db: B,
    processor: P,
    config: CheckoutConfig,
}

impl<B, P> CheckoutApi<B, P> {
    pub fn new(db: B, processor: P, config: CheckoutConfig) -> Self {
        Self { db, processor, config }
    }
}

impl<B, P> CheckoutApi<B, P>
where
    B: PaymentGatewayDatabase,
    P: ProcessorClient,
{
    /// Create or reuse a checkout session for `oid` on behalf of `actor_id`.
    ///
    /// Preconditions: the actor is the order's buyer, the order is `Approved`, it contains at least one digital
    /// item, the seller has completed processor onboarding, and the total is positive. An existing session
    /// younger than the reuse window with payment still `Initiated` is re-verified with the processor and handed
    /// back (`reused = true`) if it is still open.
    pub async fn create_or_reuse_session(
        &self,
        oid: &OrderId,
        actor_id: &str,
    ) -> Result<CheckoutSessionResult, CheckoutApiError> {
        let order = self
            .db
            .fetch_order_by_order_id(oid)
            .await?
            .ok_or_else(|| CheckoutApiError::OrderNotFound(oid.clone()))?;
        if order.buyer_id != actor_id {
            return Err(CheckoutApiError::NotTheBuyer);
        }
        if order.status != OrderStatus::Approved {
            return Err(CheckoutApiError::OrderNotApproved(order.status));
        }
        let items = self.db.fetch_order_items(oid).await?;
        if !items.iter().any(|i| i.is_digital) {
            return Err(CheckoutApiError::NoDigitalItems);
        }
        let seller = self
            .db
            .fetch_seller_profile(&order.seller_id)
            .await?
            .filter(|p| p.onboarding_status == OnboardingStatus::Complete)
            .ok_or(CheckoutApiError::SellerNotOnboarded)?;
        if !order.total_price.is_positive() {
            return Err(CheckoutApiError::InvalidAmount);
        }
        if let Some(result) = self.try_reuse_session(&order).await? {
            return Ok(result);
        }
        let params = NewCheckoutSession {
            order_id: oid.as_str().to_string(),
            amount: order.total_price,
            currency: order.currency.clone(),
            destination_account: seller.stripe_account_id.clone(),
            application_fee: order.total_price.fee_at_bps(self.config.platform_fee_bps),
            product_name: format!("Bazaar order {}", oid.as_str()),
        };
        // A deterministic key per order makes retried creation calls collapse into one session on the
        // processor's side.
        let idempotency_key = format!("checkout-{}", oid.as_str());
        let session = self.processor.create_checkout_session(&params, &idempotency_key).await?;
        let session_ref = CheckoutSessionRef {
            session_id: session.id.clone(),
            session_url: session.url.clone(),
            created_at: Utc::now(),
        };
        // Also marks payment_status = Initiated
        self.db.set_checkout_session(oid, &session_ref).await?;
        let event = NewTimelineEvent::user(oid.clone(), TimelineEventType::PaymentInitiated, actor_id)
            .with_correlation_id(session.id.clone())
            .with_meta(serde_json::json!({
                "session_id": session.id,
                "amount": order.total_price.value(),
                "fee": params.application_fee.value(),
            }));
        self.db.append_timeline_event(event).await?;
        info!("💳️ Checkout session {} created for order [{oid}]", session.id);
        Ok(CheckoutSessionResult {
            session_id: session.id,
            session_url: session.url,
            reused: false,
            expires_at: session.expires_at.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        })
    }

    /// Hand back the outstanding session if it is young enough, payment is still `Initiated`, and the processor
    /// confirms it is still open.
    async fn try_reuse_session(&self, order: &Order) -> Result<Option<CheckoutSessionResult>, CheckoutApiError> {
        let (session_id, session_created_at) =
            match (&order.checkout_session_id, order.checkout_session_created_at) {
                (Some(id), Some(at)) => (id, at),
                _ => return Ok(None),
            };
        if order.payment_status != PaymentStatus::Initiated {
            return Ok(None);
        }
        if Utc::now() - session_created_at >= self.config.reuse_window {
            debug!("💳️ Session {session_id} for order [{}] is past the reuse window", order.order_id);
            return Ok(None);
        }
        let session = self.processor.fetch_checkout_session(session_id).await?;
        if !session.is_open() {
            debug!("💳️ Session {session_id} for order [{}] is no longer open", order.order_id);
            return Ok(None);
        }
        info!("💳️ Reusing open checkout session {session_id} for order [{}]", order.order_id);
        Ok(Some(CheckoutSessionResult {
            session_id: session.id,
            session_url: session.url.or_else(|| order.checkout_session_url.clone()),
            reused: true,
            expires_at: session.expires_at.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        }))
    }
}
