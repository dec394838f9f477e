use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripeApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Stripe call failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Malformed webhook payload: {0}")]
    MalformedEvent(String),
}
