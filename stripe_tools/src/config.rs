use bpg_common::Secret;
use log::*;

const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Base URL for the Stripe REST API. Overridable so that tests can point the client at a local stub.
    pub api_base: String,
    pub secret_key: Secret<String>,
    /// Where Stripe sends the buyer after a successful checkout.
    pub success_url: String,
    /// Where Stripe sends the buyer after an abandoned checkout.
    pub cancel_url: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            secret_key: Secret::default(),
            success_url: "https://bazaar.example/checkout/success".to_string(),
            cancel_url: "https://bazaar.example/checkout/cancelled".to_string(),
        }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_base = std::env::var("BPG_STRIPE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let secret_key = Secret::new(std::env::var("BPG_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("BPG_STRIPE_SECRET_KEY not set. Processor calls will be rejected by Stripe.");
            String::default()
        }));
        let success_url = std::env::var("BPG_CHECKOUT_SUCCESS_URL").unwrap_or_else(|_| {
            warn!("BPG_CHECKOUT_SUCCESS_URL not set, using a placeholder");
            "https://bazaar.example/checkout/success".to_string()
        });
        let cancel_url = std::env::var("BPG_CHECKOUT_CANCEL_URL").unwrap_or_else(|_| {
            warn!("BPG_CHECKOUT_CANCEL_URL not set, using a placeholder");
            "https://bazaar.example/checkout/cancelled".to_string()
        });
        Self { api_base, secret_key, success_url, cancel_url }
    }
}
