use std::collections::HashMap;

use bpg_common::Cents;
use serde::{Deserialize, Serialize};

use crate::StripeApiError;

//--------------------------------------  Checkout sessions  ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutSessionStatus {
    Open,
    Complete,
    Expired,
}

/// The subset of a Stripe Checkout session the gateway cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub status: CheckoutSessionStatus,
    #[serde(default)]
    pub payment_status: Option<String>,
    pub amount_total: Option<i64>,
    pub payment_intent: Option<String>,
    /// Unix timestamp at which Stripe expires the session.
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_open(&self) -> bool {
        self.status == CheckoutSessionStatus::Open
    }
}

/// Parameters for creating a destination-charge Checkout session on behalf of a seller.
#[derive(Debug, Clone)]
pub struct NewCheckoutSession {
    pub order_id: String,
    pub amount: Cents,
    pub currency: String,
    /// The connected account that receives the funds.
    pub destination_account: String,
    /// Flat platform fee retained by the marketplace.
    pub application_fee: Cents,
    pub product_name: String,
}

//--------------------------------------   Webhook events   -----------------------------------------------------------

/// Raw webhook envelope as Stripe delivers it. `data.object` is kept opaque until the event type is known.
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionCompleted {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    pub amount_total: Option<i64>,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntentFailed {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub last_payment_error: Option<PaymentError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentError {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeRefunded {
    pub id: String,
    pub payment_intent: Option<String>,
    /// Amount originally captured, in minor units.
    pub amount: i64,
    pub amount_refunded: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountUpdated {
    pub id: String,
    #[serde(default)]
    pub details_submitted: bool,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
    #[serde(default)]
    pub requirements: Option<AccountRequirements>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountRequirements {
    #[serde(default)]
    pub disabled_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisputeUpdated {
    pub id: String,
    pub charge: Option<String>,
    pub payment_intent: Option<String>,
    /// Stripe's dispute status string, e.g. `needs_response`, `won`, `lost`.
    #[serde(default)]
    pub status: Option<String>,
}

/// The tagged union of webhook events the reconciler understands. Anything else lands in `Unknown` and is
/// acknowledged without action, so novel event types can never create retry storms from Stripe.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    CheckoutSessionCompleted { event_id: String, session: CheckoutSessionCompleted },
    PaymentIntentFailed { event_id: String, intent: PaymentIntentFailed },
    ChargeRefunded { event_id: String, charge: ChargeRefunded },
    AccountUpdated { event_id: String, account: AccountUpdated },
    DisputeCreated { event_id: String, dispute: DisputeUpdated },
    DisputeClosed { event_id: String, dispute: DisputeUpdated },
    DisputeFundsReinstated { event_id: String, dispute: DisputeUpdated },
    DisputeFundsWithdrawn { event_id: String, dispute: DisputeUpdated },
    Unknown { event_id: String, event_type: String },
}

impl WebhookEvent {
    /// Parse a raw webhook body into a typed event. A known event type with a malformed object is an error;
    /// an unknown event type is not.
    pub fn from_payload(payload: &[u8]) -> Result<Self, StripeApiError> {
        let envelope: EventEnvelope =
            serde_json::from_slice(payload).map_err(|e| StripeApiError::MalformedEvent(e.to_string()))?;
        let EventEnvelope { id, event_type, data } = envelope;
        let object = data.object;
        let event = match event_type.as_str() {
            "checkout.session.completed" => WebhookEvent::CheckoutSessionCompleted {
                event_id: id,
                session: parse_object(object, &event_type)?,
            },
            "payment_intent.payment_failed" => {
                WebhookEvent::PaymentIntentFailed { event_id: id, intent: parse_object(object, &event_type)? }
            },
            "charge.refunded" => {
                WebhookEvent::ChargeRefunded { event_id: id, charge: parse_object(object, &event_type)? }
            },
            "account.updated" => {
                WebhookEvent::AccountUpdated { event_id: id, account: parse_object(object, &event_type)? }
            },
            "charge.dispute.created" => {
                WebhookEvent::DisputeCreated { event_id: id, dispute: parse_object(object, &event_type)? }
            },
            "charge.dispute.closed" => {
                WebhookEvent::DisputeClosed { event_id: id, dispute: parse_object(object, &event_type)? }
            },
            "charge.dispute.funds_reinstated" => {
                WebhookEvent::DisputeFundsReinstated { event_id: id, dispute: parse_object(object, &event_type)? }
            },
            "charge.dispute.funds_withdrawn" => {
                WebhookEvent::DisputeFundsWithdrawn { event_id: id, dispute: parse_object(object, &event_type)? }
            },
            _ => WebhookEvent::Unknown { event_id: id, event_type },
        };
        Ok(event)
    }

    pub fn event_id(&self) -> &str {
        match self {
            WebhookEvent::CheckoutSessionCompleted { event_id, .. } |
            WebhookEvent::PaymentIntentFailed { event_id, .. } |
            WebhookEvent::ChargeRefunded { event_id, .. } |
            WebhookEvent::AccountUpdated { event_id, .. } |
            WebhookEvent::DisputeCreated { event_id, .. } |
            WebhookEvent::DisputeClosed { event_id, .. } |
            WebhookEvent::DisputeFundsReinstated { event_id, .. } |
            WebhookEvent::DisputeFundsWithdrawn { event_id, .. } |
            WebhookEvent::Unknown { event_id, .. } => event_id,
        }
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(
    object: serde_json::Value,
    event_type: &str,
) -> Result<T, StripeApiError> {
    serde_json::from_value(object)
        .map_err(|e| StripeApiError::MalformedEvent(format!("bad {event_type} object: {e}")))
}
