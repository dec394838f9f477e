use bpg_common::Secret;
use chrono::{DateTime, Duration, Utc};
use log::*;
use serde::Serialize;

use crate::{
    bpe_api::errors::DownloadApiError,
    db_types::{DisputeStatus, NewDigitalArtifact, NewDownloadLogEntry, Order, OrderStatus, ProductId},
    helpers::sign_download_token,
    traits::PaymentGatewayDatabase,
};

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum downloads per granting order inside the sliding window.
    pub download_limit: i64,
    /// The sliding window the limit applies over.
    pub window: Duration,
    /// Lifetime of an issued artifact reference.
    pub artifact_ttl: Duration,
    pub signing_key: Secret<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_limit: 5,
            window: Duration::hours(1),
            artifact_ttl: Duration::seconds(120),
            signing_key: Secret::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadGrant {
    pub artifact_key: String,
    pub expires_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

/// The entitlement and download gateway.
///
/// Entitlement is computed on demand from the order aggregate — there is no stored "entitlement" row to drift out
/// of sync with an order's status. A grant is a short-lived signed reference, never the object itself.
pub struct DownloadApi<B> {
    db: B,
    config: DownloadConfig,
}

impl<B> DownloadApi<B> {
    pub fn new(db: B, config: DownloadConfig) -> Self {
        Self { db, config }
    }
}

impl<B> DownloadApi<B>
where B: PaymentGatewayDatabase
{
    /// Decide whether `requester_id` may obtain the artifact for `product_id` right now.
    ///
    /// The product's seller bypasses every further check. A buyer needs at least one order in the
    /// download-entitled set (`Paid` or `Completed`) containing the product, no refunded order for the same
    /// product, no pending review or open dispute on the granting order, and headroom in the rate limit.
    /// Authorized and rate-limited attempts are both logged; the analytics counter bump is best-effort.
    pub async fn authorize(
        &self,
        product_id: &ProductId,
        requester_id: &str,
    ) -> Result<DownloadGrant, DownloadApiError> {
        if self.db.seller_owns_product(requester_id, product_id).await? {
            debug!("📥️ Seller {requester_id} granted owner access to product {product_id}");
            let object_key = NewDigitalArtifact::for_product(product_id).object_key;
            return Ok(self.issue_grant(&object_key, "seller-access", requester_id));
        }
        let orders = self.db.fetch_orders_for_product_buyer(requester_id, product_id).await?;
        if orders.iter().any(|o| o.status == OrderStatus::Refunded) {
            debug!("📥️ Download of {product_id} by {requester_id} denied: product was refunded");
            return Err(DownloadApiError::Refunded);
        }
        let granting = orders
            .iter()
            .find(|o| matches!(o.status, OrderStatus::Paid | OrderStatus::Completed))
            .ok_or(DownloadApiError::NotEntitled)?;
        if granting.requires_review || granting.dispute_status == DisputeStatus::UnderReview {
            debug!("📥️ Download of {product_id} by {requester_id} paused: order [{}] under review", granting.order_id);
            return Err(DownloadApiError::PendingReview);
        }
        let since = Utc::now() - self.config.window;
        let recent = self.db.count_recent_downloads(&granting.order_id, requester_id, since).await?;
        if recent >= self.config.download_limit {
            // The denied attempt still lands in the log for audit
            self.log_attempt(granting, requester_id, product_id, false).await?;
            info!(
                "📥️ Download of {product_id} by {requester_id} rate limited ({recent}/{} in window)",
                self.config.download_limit
            );
            return Err(DownloadApiError::RateLimited);
        }
        self.log_attempt(granting, requester_id, product_id, true).await?;
        if let Err(e) = self.db.bump_product_downloads(product_id).await {
            // Analytics only; a failed bump never blocks the download
            warn!("📥️ Could not bump download counter for {product_id}: {e}");
        }
        let object_key = match self.db.fetch_artifact(&granting.order_id, product_id).await? {
            Some(artifact) => artifact.object_key,
            None => NewDigitalArtifact::for_product(product_id).object_key,
        };
        info!("📥️ Download of {product_id} authorized for {requester_id} via order [{}]", granting.order_id);
        Ok(self.issue_grant(&object_key, granting.order_id.as_str(), requester_id))
    }

    fn issue_grant(&self, object_key: &str, order_ref: &str, requester_id: &str) -> DownloadGrant {
        let expires_at = Utc::now() + self.config.artifact_ttl;
        let artifact_key =
            sign_download_token(self.config.signing_key.reveal(), object_key, order_ref, requester_id, expires_at);
        DownloadGrant { artifact_key, expires_at, ttl_seconds: self.config.artifact_ttl.num_seconds() }
    }

    async fn log_attempt(
        &self,
        order: &Order,
        requester_id: &str,
        product_id: &ProductId,
        granted: bool,
    ) -> Result<(), DownloadApiError> {
        let entry = NewDownloadLogEntry {
            order_id: order.order_id.clone(),
            user_id: requester_id.to_string(),
            product_id: product_id.clone(),
            granted,
            created_at: Utc::now(),
        };
        self.db.log_download_attempt(entry).await?;
        Ok(())
    }
}
