use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use bazaar_payment_engine::{
    state_machine::TransitionDenied,
    traits::PaymentGatewayError,
    CheckoutApiError,
    DownloadApiError,
    OrderFlowError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Invalid request. {0}")]
    InvalidRequestBody(String),
    #[error("Authentication required. {0}")]
    AuthenticationError(String),
    #[error("Insufficient permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Gone(String),
    #[error("{0}")]
    Locked(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("An upstream dependency failed. {0}")]
    ExternalDependency(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Gone(_) => StatusCode::GONE,
            Self::Locked(_) => StatusCode::LOCKED,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::ExternalDependency(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::OrderNotFound(oid) => Self::NoRecordFound(format!("Order {oid}")),
            PaymentGatewayError::TransitionConflict { .. } => Self::Conflict(e.to_string()),
            PaymentGatewayError::OrderAlreadyExists(_) => Self::Conflict(e.to_string()),
            // Everything else is infrastructure; keep the detail in the logs, not the response
            other => Self::BackendError(other.to_string()),
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::Storage(inner) => inner.into(),
            OrderFlowError::OrderNotFound(oid) => Self::NoRecordFound(format!("Order {oid}")),
            OrderFlowError::NotAParticipant(_) => Self::InsufficientPermissions(e.to_string()),
            OrderFlowError::TransitionDenied(TransitionDenied::RoleNotPermitted { .. }) => {
                Self::InsufficientPermissions(e.to_string())
            },
            OrderFlowError::TransitionDenied(denied) => Self::Conflict(denied.to_string()),
            OrderFlowError::EmptyOrder | OrderFlowError::InvalidItem => Self::InvalidRequestBody(e.to_string()),
        }
    }
}

impl From<CheckoutApiError> for ServerError {
    fn from(e: CheckoutApiError) -> Self {
        match e {
            CheckoutApiError::Storage(inner) => inner.into(),
            CheckoutApiError::OrderNotFound(oid) => Self::NoRecordFound(format!("Order {oid}")),
            CheckoutApiError::NotTheBuyer => Self::InsufficientPermissions(e.to_string()),
            CheckoutApiError::OrderNotApproved(_) |
            CheckoutApiError::NoDigitalItems |
            CheckoutApiError::SellerNotOnboarded => Self::Conflict(e.to_string()),
            CheckoutApiError::InvalidAmount => Self::InvalidRequestBody(e.to_string()),
            CheckoutApiError::Processor(inner) => Self::ExternalDependency(inner.to_string()),
        }
    }
}

impl From<DownloadApiError> for ServerError {
    fn from(e: DownloadApiError) -> Self {
        match e {
            DownloadApiError::Storage(inner) => inner.into(),
            DownloadApiError::NotEntitled => Self::InsufficientPermissions(e.to_string()),
            DownloadApiError::Refunded => Self::Gone(e.to_string()),
            DownloadApiError::PendingReview => Self::Locked(e.to_string()),
            DownloadApiError::RateLimited => Self::RateLimited(e.to_string()),
        }
    }
}
