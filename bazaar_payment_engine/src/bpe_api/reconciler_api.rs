//! The webhook reconciler.
//!
//! Stripe delivers events at least once and in no particular order; duplicates and replays are part of the
//! contract. Every branch here therefore starts from the *persisted* order state, not from any event sequence
//! number: if the state already reflects the event's effect the branch short-circuits to success, and the
//! compare-and-set store update serializes whichever concurrent delivery gets there first. The timeline's unique
//! index over (order, event type, external event id) guarantees exactly one audit entry per applied event no
//! matter how many times Stripe re-sends it.
use std::{
    sync::{Arc, Mutex},
    time::{Duration as StdDuration, Instant},
};

use bpg_common::Secret;
use chrono::Utc;
use log::*;
use stripe_tools::{
    verify_signature,
    AccountUpdated,
    ChargeRefunded,
    CheckoutSessionCompleted,
    DisputeUpdated,
    PaymentIntentFailed,
    WebhookEvent,
};

use crate::{
    bpe_api::errors::ReconcilerError,
    db_types::{
        DisputeStatus,
        NewDigitalArtifact,
        NewTimelineEvent,
        OnboardingStatus,
        OrderId,
        OrderStatus,
        PaymentStatus,
        TimelineEventType,
    },
    events::{DisputeChangedEvent, EventProducers, OrderStatusChangedEvent},
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
};

//--------------------------------------      SecretCache      -------------------------------------------------------
/// A bounded-TTL cache over a webhook secret.
///
/// Secrets are injected as a loader rather than memoized in module state, so rotation takes effect within one
/// TTL and tests can observe the cache's lifecycle directly.
#[derive(Clone)]
pub struct SecretCache {
    loader: Arc<dyn Fn() -> Secret<String> + Send + Sync>,
    ttl: StdDuration,
    cached: Arc<Mutex<Option<(Secret<String>, Instant)>>>,
}

impl SecretCache {
    pub fn new<F>(loader: F, ttl: StdDuration) -> Self
    where F: Fn() -> Secret<String> + Send + Sync + 'static {
        Self { loader: Arc::new(loader), ttl, cached: Arc::new(Mutex::new(None)) }
    }

    /// A cache over a value that never changes. Convenient for configuration-sourced secrets.
    pub fn fixed(secret: Secret<String>) -> Self {
        Self::new(move || secret.clone(), StdDuration::from_secs(u64::MAX / 4))
    }

    pub fn get(&self) -> Secret<String> {
        let mut guard = self.cached.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.as_ref() {
            Some((secret, loaded_at)) if loaded_at.elapsed() < self.ttl => secret.clone(),
            _ => {
                let secret = (self.loader)();
                *guard = Some((secret.clone(), Instant::now()));
                secret
            },
        }
    }

    /// Drop the cached value so the next [`get`][Self::get] reloads immediately.
    pub fn invalidate(&self) {
        let mut guard = self.cached.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }
}

//--------------------------------------     ReconcilerApi     -------------------------------------------------------
pub struct ReconcilerApi<B> {
    db: B,
    producers: EventProducers,
    /// Secret for marketplace-level payment events.
    platform_secret: SecretCache,
    /// Secret for events relayed from connected accounts.
    account_secret: SecretCache,
    signature_tolerance: chrono::Duration,
}

impl<B> ReconcilerApi<B> {
    pub fn new(db: B, producers: EventProducers, platform_secret: SecretCache, account_secret: SecretCache) -> Self {
        Self {
            db,
            producers,
            platform_secret,
            account_secret,
            signature_tolerance: stripe_tools::DEFAULT_SIGNATURE_TOLERANCE,
        }
    }

    pub fn with_signature_tolerance(mut self, tolerance: chrono::Duration) -> Self {
        self.signature_tolerance = tolerance;
        self
    }
}

impl<B> ReconcilerApi<B>
where B: PaymentGatewayDatabase
{
    /// Verify a raw webhook body against the platform secret first, then the connected-account secret.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str) -> Result<(), ReconcilerError> {
        let now = Utc::now();
        for cache in [&self.platform_secret, &self.account_secret] {
            let secret = cache.get();
            match verify_signature(payload, signature_header, secret.reveal(), self.signature_tolerance, now) {
                Ok(true) => return Ok(()),
                Ok(false) => continue,
                Err(e) => {
                    debug!("🔁️ Unusable signature header: {e}");
                    return Err(ReconcilerError::InvalidSignature);
                },
            }
        }
        Err(ReconcilerError::InvalidSignature)
    }

    /// Apply one verified event. Unknown event types are acknowledged and dropped; business-level mismatches are
    /// reported as non-retriable errors so the HTTP layer can acknowledge them too.
    pub async fn handle_event(&self, event: WebhookEvent) -> Result<(), ReconcilerError> {
        match event {
            WebhookEvent::CheckoutSessionCompleted { event_id, session } => {
                self.on_checkout_completed(&event_id, session).await
            },
            WebhookEvent::PaymentIntentFailed { event_id, intent } => {
                self.on_payment_failed(&event_id, intent).await
            },
            WebhookEvent::ChargeRefunded { event_id, charge } => self.on_charge_refunded(&event_id, charge).await,
            WebhookEvent::AccountUpdated { event_id, account } => self.on_account_updated(&event_id, account).await,
            WebhookEvent::DisputeCreated { event_id, dispute } => {
                self.on_dispute_changed(&event_id, dispute, Some(DisputeStatus::UnderReview)).await
            },
            WebhookEvent::DisputeClosed { event_id, dispute } => {
                let target = match dispute.status.as_deref() {
                    Some("won") => Some(DisputeStatus::Won),
                    Some("lost") => Some(DisputeStatus::Lost),
                    // Any other close status is settled later by a funds_* event
                    _ => None,
                };
                self.on_dispute_changed(&event_id, dispute, target).await
            },
            WebhookEvent::DisputeFundsReinstated { event_id, dispute } => {
                self.on_dispute_changed(&event_id, dispute, Some(DisputeStatus::Won)).await
            },
            WebhookEvent::DisputeFundsWithdrawn { event_id, dispute } => {
                self.on_dispute_changed(&event_id, dispute, Some(DisputeStatus::Lost)).await
            },
            WebhookEvent::Unknown { event_id, event_type } => {
                debug!("🔁️ Ignoring unrecognized event {event_id} of type {event_type}");
                Ok(())
            },
        }
    }

    /// `checkout.session.completed`: the buyer finished paying. The order is resolved from the session's own
    /// metadata — a client-supplied order id is never trusted on this path.
    async fn on_checkout_completed(
        &self,
        event_id: &str,
        session: CheckoutSessionCompleted,
    ) -> Result<(), ReconcilerError> {
        let oid = session
            .metadata
            .get("order_id")
            .map(|s| OrderId(s.clone()))
            .ok_or_else(|| ReconcilerError::MalformedEvent("session metadata carries no order_id".to_string()))?;
        if session.payment_status.as_deref() != Some("paid") {
            info!("🔁️ Session {} completed without payment for order [{oid}]; ignoring", session.id);
            return Ok(());
        }
        let order = self
            .db
            .fetch_order_by_order_id(&oid)
            .await?
            .ok_or_else(|| ReconcilerError::UnmatchedReference(oid.as_str().to_string()))?;
        if order.status == OrderStatus::Completed {
            debug!("🔁️ Order [{oid}] is already completed; event {event_id} is a replay");
            return Ok(());
        }
        if order.status != OrderStatus::Approved {
            // A completion for an order that never reached Approved means a bug or a very stale replay.
            warn!("🔁️ Session {} completed but order [{oid}] is {}; not applying", session.id, order.status);
            return Err(ReconcilerError::UnexpectedState { order_id: oid, status: order.status });
        }
        let amount_expected = order.total_price.value();
        let amount_reported = session.amount_total.unwrap_or_default();
        let suspicious = amount_reported != amount_expected;
        if suspicious {
            // A mismatch flags the order for human follow-up but does not block a legitimate completion.
            warn!(
                "🔁️ Amount mismatch on order [{oid}]: expected {amount_expected}, processor reported \
                 {amount_reported}. Flagging for review."
            );
            self.db.flag_for_review(&oid).await?;
        }
        if let Some(intent) = &session.payment_intent {
            self.db.set_payment_intent(&oid, intent).await?;
        }
        let paid = match self.db.update_order_status_checked(&oid, &[OrderStatus::Approved], OrderStatus::Paid).await
        {
            Ok(order) => order,
            Err(PaymentGatewayError::TransitionConflict { .. }) => {
                return self.resolve_completion_race(&oid, event_id).await;
            },
            Err(e) => return Err(e.into()),
        };
        let completed =
            match self.db.update_order_status_checked(&oid, &[OrderStatus::Paid], OrderStatus::Completed).await {
                Ok(order) => order,
                Err(PaymentGatewayError::TransitionConflict { .. }) => {
                    return self.resolve_completion_race(&oid, event_id).await;
                },
                Err(e) => return Err(e.into()),
            };
        self.db.set_payment_status(&oid, PaymentStatus::Succeeded).await?;
        let items = self.db.fetch_order_items(&oid).await?;
        let artifacts: Vec<NewDigitalArtifact> =
            items.iter().filter(|i| i.is_digital).map(|i| NewDigitalArtifact::for_product(&i.product_id)).collect();
        self.db.store_artifacts(&oid, &artifacts).await?;
        let event = NewTimelineEvent::system(oid.clone(), TimelineEventType::PaymentSucceeded)
            .with_correlation_id(event_id)
            .with_meta(serde_json::json!({
                "session_id": session.id,
                "amount_expected": amount_expected,
                "amount_reported": amount_reported,
                "suspicious": suspicious,
            }));
        self.db.append_timeline_event(event).await?;
        info!("🔁️ Order [{oid}] completed via session {} ({} artifacts unlocked)", session.id, artifacts.len());
        self.call_status_hook(OrderStatusChangedEvent { order: completed, old_status: paid.status, new_status: OrderStatus::Completed })
            .await;
        Ok(())
    }

    /// A compare-and-set loss during completion means a concurrent delivery of the same event got there first.
    /// If the order is now completed the effect is in place and this delivery acknowledges as a no-op.
    async fn resolve_completion_race(&self, oid: &OrderId, event_id: &str) -> Result<(), ReconcilerError> {
        let order = self
            .db
            .fetch_order_by_order_id(oid)
            .await?
            .ok_or_else(|| ReconcilerError::UnmatchedReference(oid.as_str().to_string()))?;
        if order.status == OrderStatus::Completed {
            debug!("🔁️ Concurrent delivery already completed order [{oid}]; event {event_id} is a no-op");
            Ok(())
        } else {
            Err(ReconcilerError::UnexpectedState { order_id: oid.clone(), status: order.status })
        }
    }

    /// `payment_intent.payment_failed`: record the failure on the payment axis only. The business status is left
    /// alone so the buyer can retry checkout.
    async fn on_payment_failed(&self, event_id: &str, intent: PaymentIntentFailed) -> Result<(), ReconcilerError> {
        let order = match intent.metadata.get("order_id") {
            Some(id) => self.db.fetch_order_by_order_id(&OrderId(id.clone())).await?,
            None => self.db.fetch_order_by_processor_reference(&intent.id).await?,
        };
        let Some(order) = order else {
            info!("🔁️ Payment failure {event_id} for intent {} matches no order; ignoring", intent.id);
            return Ok(());
        };
        if matches!(order.status, OrderStatus::Completed | OrderStatus::Refunded) {
            debug!("🔁️ Stale payment failure {event_id} for settled order [{}]; ignoring", order.order_id);
            return Ok(());
        }
        self.db.set_payment_status(&order.order_id, PaymentStatus::Failed).await?;
        let message = intent.last_payment_error.and_then(|e| e.message).unwrap_or_default();
        let event = NewTimelineEvent::system(order.order_id.clone(), TimelineEventType::PaymentFailed)
            .with_correlation_id(event_id)
            .with_meta(serde_json::json!({ "payment_intent": intent.id, "message": message }));
        self.db.append_timeline_event(event).await?;
        info!("🔁️ Payment failed for order [{}]; buyer may retry", order.order_id);
        Ok(())
    }

    /// `charge.refunded`: only full refunds change state. Partial refunds are out of scope by design and are
    /// logged and ignored.
    async fn on_charge_refunded(&self, event_id: &str, charge: ChargeRefunded) -> Result<(), ReconcilerError> {
        let Some(intent) = &charge.payment_intent else {
            info!("🔁️ Refund {event_id} on charge {} carries no payment intent; ignoring", charge.id);
            return Ok(());
        };
        let order = self.db.fetch_order_by_processor_reference(intent).await?;
        let Some(order) = order else {
            info!("🔁️ Refund {event_id} for intent {intent} matches no order; ignoring");
            return Ok(());
        };
        let oid = order.order_id.clone();
        let is_full = charge.amount_refunded >= charge.amount;
        if !is_full {
            info!(
                "🔁️ Partial refund of {} / {} on order [{oid}] is unsupported; logged and ignored",
                charge.amount_refunded, charge.amount
            );
            let event = NewTimelineEvent::system(oid, TimelineEventType::PartialRefundIgnored)
                .with_correlation_id(event_id)
                .with_meta(serde_json::json!({
                    "charge": charge.id,
                    "amount_refunded": charge.amount_refunded,
                    "amount_charged": charge.amount,
                }));
            self.db.append_timeline_event(event).await?;
            return Ok(());
        }
        if order.status == OrderStatus::Refunded {
            debug!("🔁️ Order [{oid}] is already refunded; event {event_id} is a replay");
            return Ok(());
        }
        let refunded =
            match self.db.update_order_status_checked(&oid, &[OrderStatus::Completed], OrderStatus::Refunded).await {
                Ok(order) => order,
                Err(PaymentGatewayError::TransitionConflict { .. }) => {
                    let current = self
                        .db
                        .fetch_order_by_order_id(&oid)
                        .await?
                        .ok_or_else(|| ReconcilerError::UnmatchedReference(oid.as_str().to_string()))?;
                    if current.status == OrderStatus::Refunded {
                        debug!("🔁️ Concurrent delivery already refunded order [{oid}]");
                        return Ok(());
                    }
                    warn!("🔁️ Refund for order [{oid}] in state {}; not applying", current.status);
                    return Err(ReconcilerError::UnexpectedState { order_id: oid, status: current.status });
                },
                Err(e) => return Err(e.into()),
            };
        self.db.set_payment_status(&oid, PaymentStatus::Refunded).await?;
        let event = NewTimelineEvent::system(oid.clone(), TimelineEventType::RefundCompleted)
            .with_correlation_id(event_id)
            .with_meta(serde_json::json!({
                "charge": charge.id,
                "amount_refunded": charge.amount_refunded,
                "refunded_at": Utc::now(),
            }));
        self.db.append_timeline_event(event).await?;
        info!("🔁️ Order [{oid}] fully refunded; download entitlement revoked");
        self.call_status_hook(OrderStatusChangedEvent::new(refunded, OrderStatus::Completed)).await;
        Ok(())
    }

    /// `account.updated`: derive the tri-state onboarding status and persist it on the linked seller profile.
    /// Touches no order.
    async fn on_account_updated(&self, event_id: &str, account: AccountUpdated) -> Result<(), ReconcilerError> {
        let disabled = account.requirements.as_ref().and_then(|r| r.disabled_reason.as_ref()).is_some();
        let status = if disabled {
            OnboardingStatus::Restricted
        } else if account.details_submitted && account.charges_enabled && account.payouts_enabled {
            OnboardingStatus::Complete
        } else {
            OnboardingStatus::Incomplete
        };
        match self.db.update_seller_onboarding(&account.id, status).await? {
            Some(profile) => {
                info!("🔁️ Seller {} onboarding is now {status} (account {})", profile.seller_id, account.id);
            },
            None => {
                info!("🔁️ Event {event_id}: no seller linked to account {}; ignoring", account.id);
            },
        }
        Ok(())
    }

    /// Dispute events update the dispute side channel only; `status` is never touched from here.
    async fn on_dispute_changed(
        &self,
        event_id: &str,
        dispute: DisputeUpdated,
        target: Option<DisputeStatus>,
    ) -> Result<(), ReconcilerError> {
        let Some(target) = target else {
            debug!("🔁️ Dispute event {event_id} carries no terminal outcome; leaving dispute status as is");
            return Ok(());
        };
        let reference = dispute.payment_intent.as_deref().or(dispute.charge.as_deref());
        let Some(reference) = reference else {
            info!("🔁️ Dispute {} carries no processor reference; ignoring", dispute.id);
            return Ok(());
        };
        let order = self.db.fetch_order_by_processor_reference(reference).await?;
        let Some(order) = order else {
            info!("🔁️ Dispute {} matches no order; ignoring", dispute.id);
            return Ok(());
        };
        if order.dispute_status == target {
            debug!("🔁️ Order [{}] dispute status already {target}; event {event_id} is a replay", order.order_id);
            return Ok(());
        }
        let old_status = order.dispute_status;
        let updated = self.db.set_dispute_status(&order.order_id, target).await?;
        let event = NewTimelineEvent::system(order.order_id.clone(), TimelineEventType::DisputeUpdated)
            .with_correlation_id(event_id)
            .with_meta(serde_json::json!({ "dispute": dispute.id, "from": old_status, "to": target }));
        self.db.append_timeline_event(event).await?;
        info!("🔁️ Order [{}] dispute status {old_status} -> {target}", order.order_id);
        self.call_dispute_hook(DisputeChangedEvent {
            order_id: updated.order_id.clone(),
            buyer_id: updated.buyer_id.clone(),
            seller_id: updated.seller_id.clone(),
            old_status,
            new_status: target,
        })
        .await;
        Ok(())
    }

    async fn call_status_hook(&self, event: OrderStatusChangedEvent) {
        for producer in &self.producers.order_status_producer {
            trace!("🔁️ Notifying order status subscribers");
            producer.publish_event(event.clone()).await;
        }
    }

    async fn call_dispute_hook(&self, event: DisputeChangedEvent) {
        for producer in &self.producers.dispute_producer {
            trace!("🔁️ Notifying dispute subscribers");
            producer.publish_event(event.clone()).await;
        }
    }
}
