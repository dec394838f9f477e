use stripe_tools::{CheckoutSession, NewCheckoutSession, StripeApi, StripeApiError};

/// The processor seam used by the checkout session manager: create a hosted checkout session, or re-check one we
/// already hold a reference to. Implemented by [`StripeApi`]; mocked in tests.
#[allow(async_fn_in_trait)]
pub trait ProcessorClient: Clone {
    async fn create_checkout_session(
        &self,
        params: &NewCheckoutSession,
        idempotency_key: &str,
    ) -> Result<CheckoutSession, StripeApiError>;

    async fn fetch_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeApiError>;
}

impl ProcessorClient for StripeApi {
    async fn create_checkout_session(
        &self,
        params: &NewCheckoutSession,
        idempotency_key: &str,
    ) -> Result<CheckoutSession, StripeApiError> {
        StripeApi::create_checkout_session(self, params, idempotency_key).await
    }

    async fn fetch_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeApiError> {
        StripeApi::fetch_checkout_session(self, session_id).await
    }
}
