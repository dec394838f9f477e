use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::de::DeserializeOwned;

use crate::{CheckoutSession, NewCheckoutSession, StripeApiError, StripeConfig};

/// A thin typed client over the two Stripe endpoints the gateway uses. Requests are form-encoded (Stripe does not
/// accept JSON bodies) and authenticated with the platform secret key.
#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        let client =
            Client::builder().default_headers(headers).build().map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }

    async fn form_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("Sending Stripe request: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        if !form.is_empty() {
            req = req.form(form);
        }
        let response = req.send().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("Stripe request successful. {}", response.status());
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            Err(StripeApiError::QueryError { status, message })
        }
    }

    /// Create a Checkout session for a destination charge against the seller's connected account, with the order id
    /// embedded in both the session metadata and the payment intent metadata so that webhook events can always be
    /// traced back to the order without trusting anything client-supplied.
    pub async fn create_checkout_session(
        &self,
        params: &NewCheckoutSession,
        idempotency_key: &str,
    ) -> Result<CheckoutSession, StripeApiError> {
        let form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), self.config.success_url.clone()),
            ("cancel_url".into(), self.config.cancel_url.clone()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("line_items[0][price_data][currency]".into(), params.currency.clone()),
            ("line_items[0][price_data][unit_amount]".into(), params.amount.value().to_string()),
            ("line_items[0][price_data][product_data][name]".into(), params.product_name.clone()),
            ("payment_intent_data[application_fee_amount]".into(), params.application_fee.value().to_string()),
            ("payment_intent_data[transfer_data][destination]".into(), params.destination_account.clone()),
            ("payment_intent_data[metadata][order_id]".into(), params.order_id.clone()),
            ("metadata[order_id]".into(), params.order_id.clone()),
        ];
        debug!("Creating checkout session for order {}", params.order_id);
        let session =
            self.form_query::<CheckoutSession>(Method::POST, "/checkout/sessions", &form, Some(idempotency_key)).await?;
        info!("Created checkout session {} for order {}", session.id, params.order_id);
        Ok(session)
    }

    pub async fn fetch_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeApiError> {
        let path = format!("/checkout/sessions/{session_id}");
        debug!("Fetching checkout session {session_id}");
        self.form_query::<CheckoutSession>(Method::GET, &path, &[], None).await
    }
}
