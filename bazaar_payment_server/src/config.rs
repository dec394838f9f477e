use std::env;

use bazaar_payment_engine::{CheckoutConfig, DownloadConfig};
use bpg_common::Secret;
use chrono::Duration;
use log::*;
use stripe_tools::StripeConfig;

const DEFAULT_BPG_HOST: &str = "127.0.0.1";
const DEFAULT_BPG_PORT: u16 = 8480;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Stripe REST credentials and redirect URLs.
    pub stripe: StripeConfig,
    /// Secret for verifying marketplace-level webhook deliveries.
    pub platform_webhook_secret: Secret<String>,
    /// Secret for verifying webhook deliveries relayed from connected accounts.
    pub account_webhook_secret: Secret<String>,
    pub checkout: CheckoutConfig,
    pub download: DownloadConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BPG_HOST.to_string(),
            port: DEFAULT_BPG_PORT,
            database_url: String::default(),
            stripe: StripeConfig::default(),
            platform_webhook_secret: Secret::default(),
            account_webhook_secret: Secret::default(),
            checkout: CheckoutConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("BPG_HOST").ok().unwrap_or_else(|| DEFAULT_BPG_HOST.into());
        let port = env::var("BPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for BPG_PORT. {e} Using the default, {DEFAULT_BPG_PORT}, \
                         instead."
                    );
                    DEFAULT_BPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_BPG_PORT);
        let database_url = env::var("BPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ BPG_DATABASE_URL is not set. Please set it to the URL for the gateway database.");
            String::default()
        });
        let platform_webhook_secret = Secret::new(env::var("BPG_PLATFORM_WEBHOOK_SECRET").unwrap_or_else(|_| {
            error!("🪛️ BPG_PLATFORM_WEBHOOK_SECRET is not set. Webhook deliveries will be rejected.");
            String::default()
        }));
        let account_webhook_secret = Secret::new(env::var("BPG_CONNECT_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!(
                "🪛️ BPG_CONNECT_WEBHOOK_SECRET is not set. Connected-account events will only verify against \
                 the platform secret."
            );
            String::default()
        }));
        Self {
            host,
            port,
            database_url,
            stripe: StripeConfig::new_from_env_or_default(),
            platform_webhook_secret,
            account_webhook_secret,
            checkout: configure_checkout(),
            download: configure_downloads(),
        }
    }
}

fn configure_checkout() -> CheckoutConfig {
    let defaults = CheckoutConfig::default();
    let reuse_window = env::var("BPG_SESSION_REUSE_MINUTES")
        .ok()
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for BPG_SESSION_REUSE_MINUTES. {e}"))
                .ok()
        })
        .map(Duration::minutes)
        .unwrap_or(defaults.reuse_window);
    let platform_fee_bps = env::var("BPG_PLATFORM_FEE_BPS")
        .ok()
        .and_then(|s| {
            s.parse::<u32>().map_err(|e| warn!("🪛️ Invalid configuration value for BPG_PLATFORM_FEE_BPS. {e}")).ok()
        })
        .unwrap_or(defaults.platform_fee_bps);
    CheckoutConfig { reuse_window, platform_fee_bps }
}

fn configure_downloads() -> DownloadConfig {
    let defaults = DownloadConfig::default();
    let download_limit = env::var("BPG_DOWNLOAD_LIMIT")
        .ok()
        .and_then(|s| {
            s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for BPG_DOWNLOAD_LIMIT. {e}")).ok()
        })
        .unwrap_or(defaults.download_limit);
    let artifact_ttl = env::var("BPG_ARTIFACT_TTL_SECONDS")
        .ok()
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for BPG_ARTIFACT_TTL_SECONDS. {e}"))
                .ok()
        })
        .map(Duration::seconds)
        .unwrap_or(defaults.artifact_ttl);
    let signing_key = Secret::new(env::var("BPG_DOWNLOAD_SIGNING_KEY").unwrap_or_else(|_| {
        error!("🪛️ BPG_DOWNLOAD_SIGNING_KEY is not set. Download grants will not verify across services.");
        String::default()
    }));
    DownloadConfig { download_limit, artifact_ttl, signing_key, ..defaults }
}
