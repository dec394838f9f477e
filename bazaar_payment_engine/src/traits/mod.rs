//! The traits that backends (and mocks) implement to power the engine APIs.
//!
//! Storage is split by concern — orders and their timeline, download bookkeeping, seller profiles — with
//! [`PaymentGatewayDatabase`] as the umbrella bound the APIs use. [`ProcessorClient`] is the seam to Stripe, so
//! the checkout session manager can be tested without the network.
mod payment_gateway_database;
mod processor;

pub use payment_gateway_database::{
    DownloadManagement,
    OrderManagement,
    PaymentGatewayDatabase,
    PaymentGatewayError,
    SellerManagement,
};
pub use processor::ProcessorClient;
