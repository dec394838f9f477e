//! # Bazaar payment server
//!
//! The HTTP layer over the payment engine. It is responsible for:
//! * Accepting authenticated buyer/seller requests for order creation, status transitions, checkout sessions and
//!   download authorization.
//! * Receiving signed webhook deliveries from Stripe and feeding them to the reconciler.
//!
//! ## Configuration
//! The server is configured via `BPG_*` environment variables. See [config] for details.
//!
//! ## Identity
//! Authentication is performed by a fronting identity layer; this server trusts the verified requester id and
//! role claims it injects (see [auth]) and performs no credential validation of its own.
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
