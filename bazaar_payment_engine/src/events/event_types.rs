use serde::Serialize;

use crate::db_types::{DisputeStatus, Order, OrderId, OrderStatus};

/// Emitted after a business-status transition has been persisted. The notification collaborator fans this out to
/// the buyer and seller; delivery is fire-and-forget and can never roll the transition back.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatus) -> Self {
        let new_status = order.status;
        Self { order, old_status, new_status }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DisputeChangedEvent {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: String,
    pub old_status: DisputeStatus,
    pub new_status: DisputeStatus,
}
