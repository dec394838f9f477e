//! A deliberately small Stripe integration.
//!
//! The gateway only needs three things from Stripe: creating and re-checking Checkout sessions for destination
//! charges, and understanding the handful of webhook event types that drive order reconciliation. This crate wraps
//! exactly that surface and nothing else. Webhook payloads are parsed into a tagged [`WebhookEvent`] union so that
//! unknown or malformed events fail closed at the parsing boundary instead of deep inside business logic.
mod api;
mod config;
mod data_objects;
mod error;
mod webhook;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{
    AccountRequirements,
    AccountUpdated,
    ChargeRefunded,
    CheckoutSession,
    CheckoutSessionCompleted,
    CheckoutSessionStatus,
    DisputeUpdated,
    NewCheckoutSession,
    PaymentError,
    PaymentIntentFailed,
    WebhookEvent,
};
pub use error::StripeApiError;
pub use webhook::{verify_signature, SignatureError, DEFAULT_SIGNATURE_TOLERANCE};
