use std::{fmt::Display, str::FromStr};

use bpg_common::{Cents, DEFAULT_CURRENCY};
use chrono::{DateTime, Utc};
use log::error;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generate a fresh order id. Ids are opaque; nothing anywhere may parse meaning out of them.
    pub fn random() -> Self {
        let n: u128 = rand::thread_rng().gen();
        Self(format!("ord-{n:032x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------       ProductId       -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------      OrderStatus      -------------------------------------------------------
/// The buyer/seller-visible lifecycle stage of an order. This is the single source of truth for where an order is
/// in its life; the processor-side payment state lives on the independent [`PaymentStatus`] axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created by the buyer; awaiting the seller's decision.
    Requested,
    /// Accepted by the seller; payment may now be collected.
    Approved,
    /// Declined by the seller. Terminal.
    Rejected,
    /// Withdrawn by the buyer before payment succeeded. Terminal.
    Cancelled,
    /// Payment confirmed by the processor; digital goods are now download-entitled.
    Paid,
    /// Fulfilled. Terminal except for a full refund.
    Completed,
    /// Fully refunded. Terminal.
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Rejected | OrderStatus::Cancelled | OrderStatus::Completed | OrderStatus::Refunded)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Requested => "Requested",
            OrderStatus::Approved => "Approved",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Paid => "Paid",
            OrderStatus::Completed => "Completed",
            OrderStatus::Refunded => "Refunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Requested" => Ok(Self::Requested),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            "Cancelled" => Ok(Self::Cancelled),
            "Paid" => Ok(Self::Paid),
            "Completed" => Ok(Self::Completed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status in storage: {value}. Defaulting to Requested");
            OrderStatus::Requested
        })
    }
}

//--------------------------------------     PaymentStatus     -------------------------------------------------------
/// Processor-side payment state, deliberately decoupled from [`OrderStatus`] so that a failed payment attempt can
/// be retried without rewinding the business workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    NotStarted,
    Initiated,
    Succeeded,
    Failed,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::NotStarted => "NotStarted",
            PaymentStatus::Initiated => "Initiated",
            PaymentStatus::Succeeded => "Succeeded",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotStarted" => Ok(Self::NotStarted),
            "Initiated" => Ok(Self::Initiated),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------     DisputeStatus     -------------------------------------------------------
/// Dispute state rides a side channel; it never alters [`OrderStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum DisputeStatus {
    None,
    UnderReview,
    Won,
    Lost,
}

impl Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DisputeStatus::None => "None",
            DisputeStatus::UnderReview => "UnderReview",
            DisputeStatus::Won => "Won",
            DisputeStatus::Lost => "Lost",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DisputeStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "UnderReview" => Ok(Self::UnderReview),
            "Won" => Ok(Self::Won),
            "Lost" => Ok(Self::Lost),
            s => Err(ConversionError(format!("Invalid dispute status: {s}"))),
        }
    }
}

//--------------------------------------       ActorRole       -------------------------------------------------------
/// Who is asking for a transition. `System` is reserved for the reconciler and can never arrive from an HTTP
/// identity claim; [`ActorRole::from_str`] refuses to parse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorRole {
    Buyer,
    Seller,
    System,
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActorRole::Buyer => "buyer",
            ActorRole::Seller => "seller",
            ActorRole::System => "system",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ActorRole {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" => Ok(Self::Buyer),
            "seller" => Ok(Self::Seller),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------    OnboardingStatus   -------------------------------------------------------
/// Tri-state Stripe Connect onboarding status for a seller, derived from `account.updated` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OnboardingStatus {
    Incomplete,
    Complete,
    Restricted,
}

impl Display for OnboardingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OnboardingStatus::Incomplete => "Incomplete",
            OnboardingStatus::Complete => "Complete",
            OnboardingStatus::Restricted => "Restricted",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OnboardingStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Incomplete" => Ok(Self::Incomplete),
            "Complete" => Ok(Self::Complete),
            "Restricted" => Ok(Self::Restricted),
            s => Err(ConversionError(format!("Invalid onboarding status: {s}"))),
        }
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: String,
    pub total_price: Cents,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub dispute_status: DisputeStatus,
    pub requires_review: bool,
    pub checkout_session_id: Option<String>,
    pub checkout_session_url: Option<String>,
    pub checkout_session_created_at: Option<DateTime<Utc>>,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      OrderItem        -------------------------------------------------------
/// A price/quantity snapshot captured from the catalog at order-creation time. Never recomputed from the live
/// catalog afterwards.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Cents,
    pub is_digital: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Cents,
    pub is_digital: bool,
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: String,
    pub items: Vec<NewOrderItem>,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(buyer_id: String, seller_id: String, items: Vec<NewOrderItem>) -> Self {
        Self {
            order_id: OrderId::random(),
            buyer_id,
            seller_id,
            items,
            currency: DEFAULT_CURRENCY.to_string(),
            created_at: Utc::now(),
        }
    }

    /// The authoritative order total, fixed at creation time from the item snapshots.
    pub fn total_price(&self) -> Cents {
        self.items.iter().map(|i| i.unit_price * i.quantity).sum()
    }

    pub fn has_digital_items(&self) -> bool {
        self.items.iter().any(|i| i.is_digital)
    }
}

//--------------------------------------    TimelineEvent      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    OrderCreated,
    StatusChanged,
    PaymentInitiated,
    PaymentSucceeded,
    PaymentFailed,
    RefundCompleted,
    PartialRefundIgnored,
    DisputeUpdated,
}

impl Display for TimelineEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimelineEventType::OrderCreated => "order_created",
            TimelineEventType::StatusChanged => "status_changed",
            TimelineEventType::PaymentInitiated => "payment_initiated",
            TimelineEventType::PaymentSucceeded => "payment_succeeded",
            TimelineEventType::PaymentFailed => "payment_failed",
            TimelineEventType::RefundCompleted => "refund_completed",
            TimelineEventType::PartialRefundIgnored => "partial_refund_ignored",
            TimelineEventType::DisputeUpdated => "dispute_updated",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    User,
    System,
}

/// One immutable entry in an order's audit timeline. The timeline is append-only by construction: the storage
/// layer exposes an append and reads, and nothing else. `correlation_id` carries the external event id for
/// webhook-applied entries and doubles as the idempotency ledger key.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    pub id: i64,
    pub order_id: OrderId,
    pub event_type: TimelineEventType,
    pub actor: String,
    pub actor_type: ActorType,
    pub correlation_id: Option<String>,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for TimelineEvent {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let meta_raw: String = row.try_get("meta")?;
        let meta = serde_json::from_str(&meta_raw).unwrap_or(serde_json::Value::Null);
        Ok(Self {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            event_type: row.try_get("event_type")?,
            actor: row.try_get("actor")?,
            actor_type: row.try_get("actor_type")?,
            correlation_id: row.try_get("correlation_id")?,
            meta,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewTimelineEvent {
    pub order_id: OrderId,
    pub event_type: TimelineEventType,
    pub actor: String,
    pub actor_type: ActorType,
    pub correlation_id: Option<String>,
    pub meta: serde_json::Value,
}

impl NewTimelineEvent {
    pub fn system(order_id: OrderId, event_type: TimelineEventType) -> Self {
        Self {
            order_id,
            event_type,
            actor: "system".to_string(),
            actor_type: ActorType::System,
            correlation_id: None,
            meta: serde_json::json!({}),
        }
    }

    pub fn user(order_id: OrderId, event_type: TimelineEventType, user_id: &str) -> Self {
        Self {
            order_id,
            event_type,
            actor: user_id.to_string(),
            actor_type: ActorType::User,
            correlation_id: None,
            meta: serde_json::json!({}),
        }
    }

    pub fn with_correlation_id<S: Into<String>>(mut self, id: S) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }
}

//--------------------------------------     Download log      -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DownloadLogEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: String,
    pub product_id: ProductId,
    pub granted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDownloadLogEntry {
    pub order_id: OrderId,
    pub user_id: String,
    pub product_id: ProductId,
    pub granted: bool,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    Seller profile     -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SellerProfile {
    pub seller_id: String,
    pub stripe_account_id: String,
    pub onboarding_status: OnboardingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   Digital artifacts   -------------------------------------------------------
/// A reference to the deliverable object for one digital item of one order, stored when the order completes. The
/// download gateway signs short-lived grants against this key; the object itself lives with the blob-storage
/// collaborator.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DigitalArtifact {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub object_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDigitalArtifact {
    pub product_id: ProductId,
    pub object_key: String,
}

impl NewDigitalArtifact {
    /// The canonical object key for a product's deliverable.
    pub fn for_product(product_id: &ProductId) -> Self {
        Self { object_key: format!("products/{}/asset", product_id.as_str()), product_id: product_id.clone() }
    }
}

//-------------------------------------- Checkout session ref  -------------------------------------------------------
/// The session fields persisted on an order while a checkout is outstanding.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRef {
    pub session_id: String,
    pub session_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
