use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatus},
    state_machine::TransitionDenied,
    traits::PaymentGatewayError,
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("{0}")]
    Storage(#[from] PaymentGatewayError),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("You are not a participant in order {0}")]
    NotAParticipant(OrderId),
    #[error("{0}")]
    TransitionDenied(#[from] TransitionDenied),
    #[error("An order must contain at least one item")]
    EmptyOrder,
    #[error("Order items must have a positive quantity and a non-negative price")]
    InvalidItem,
}

#[derive(Debug, Error)]
pub enum CheckoutApiError {
    #[error("{0}")]
    Storage(#[from] PaymentGatewayError),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Only the order's buyer can start a checkout")]
    NotTheBuyer,
    #[error("Order must be approved before checkout; it is currently {0}")]
    OrderNotApproved(OrderStatus),
    #[error("Checkout is only available for orders containing digital items")]
    NoDigitalItems,
    #[error("The seller has not completed payment onboarding")]
    SellerNotOnboarded,
    #[error("The order total must be a positive amount")]
    InvalidAmount,
    #[error("The payment processor could not be reached: {0}")]
    Processor(#[from] stripe_tools::StripeApiError),
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("{0}")]
    Storage(#[from] PaymentGatewayError),
    #[error("Webhook signature did not verify against any known secret")]
    InvalidSignature,
    #[error("Webhook payload could not be interpreted: {0}")]
    MalformedEvent(String),
    #[error("No order matches processor reference {0}")]
    UnmatchedReference(String),
    #[error("Order {order_id} is in state {status}, which this event cannot apply to")]
    UnexpectedState { order_id: OrderId, status: OrderStatus },
}

impl ReconcilerError {
    /// Whether Stripe should retry this delivery. Only infrastructure faults qualify; every business-level
    /// mismatch is acknowledged so the processor's retry policy stays quiet.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ReconcilerError::Storage(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum DownloadApiError {
    #[error("{0}")]
    Storage(#[from] PaymentGatewayError),
    #[error("You are not entitled to download this product")]
    NotEntitled,
    #[error("Access to this product was revoked by a refund")]
    Refunded,
    #[error("This order is awaiting verification; downloads are paused")]
    PendingReview,
    #[error("Download limit reached for this order; try again later")]
    RateLimited,
}
