//! Bazaar Payment Engine
//!
//! The core of the marketplace's order lifecycle: a buyer's purchase request becomes an auditable, externally
//! verified terminal outcome (completed, refunded, cancelled, rejected) by way of an order state machine, a
//! compare-and-set order store, a checkout session manager and a webhook reconciler that applies Stripe's
//! at-least-once event feed exactly once.
//!
//! The crate is split into:
//! 1. Database types and management ([`db_types`], [`mod@sqlite`]). SQLite is the supported backend; access goes
//!    through the traits in [`mod@traits`] so that the HTTP layer and the tests never touch SQL directly.
//! 2. The engine APIs ([`OrderFlowApi`], [`CheckoutApi`], [`ReconcilerApi`], [`DownloadApi`]). These own the
//!    business rules; backends only provide storage primitives.
//!
//! Interested parties (the notification collaborator, mostly) can subscribe to order-status and dispute events via
//! the hook system in [`mod@events`]; delivery is fire-and-forget and never affects a transition.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod state_machine;
pub mod traits;

mod bpe_api;
mod sqlite;

pub use bpe_api::{
    checkout_api::{CheckoutApi, CheckoutConfig, CheckoutSessionResult},
    download_api::{DownloadApi, DownloadConfig, DownloadGrant},
    errors::{CheckoutApiError, DownloadApiError, OrderFlowError, ReconcilerError},
    order_flow_api::OrderFlowApi,
    reconciler_api::{ReconcilerApi, SecretCache},
};
pub use sqlite::SqliteDatabase;
