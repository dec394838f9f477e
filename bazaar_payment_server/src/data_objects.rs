use std::fmt::Display;

use bazaar_payment_engine::db_types::{NewOrderItem, Order, OrderItem, OrderStatus, TimelineEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// A buyer's purchase request. The item snapshots come straight from the catalog boundary; the server stores
/// them verbatim and fixes the total at creation time.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub seller_id: String,
    pub items: Vec<NewOrderItem>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub target_status: OrderStatus,
}

/// The full view of one order for its participants.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub timeline: Vec<TimelineEvent>,
}
