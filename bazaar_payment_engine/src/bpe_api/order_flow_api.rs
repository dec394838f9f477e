use std::fmt::Debug;

use log::*;

use crate::{
    bpe_api::errors::OrderFlowError,
    db_types::{
        ActorRole,
        NewOrder,
        NewTimelineEvent,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        TimelineEvent,
        TimelineEventType,
    },
    events::{EventProducers, OrderStatusChangedEvent},
    state_machine::can_transition,
    traits::PaymentGatewayDatabase,
};

/// `OrderFlowApi` handles order creation and the buyer/seller-driven status transitions. The reconciler owns the
/// system-driven ones; both run the same state machine and the same compare-and-set store update.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Submit a buyer's purchase request. The item snapshots arrive from the catalog boundary and are stored
    /// verbatim; the total is fixed here and never recomputed. Re-submission of the same order id is idempotent.
    pub async fn process_new_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        if order.items.is_empty() {
            return Err(OrderFlowError::EmptyOrder);
        }
        if order.items.iter().any(|i| i.quantity <= 0 || i.unit_price.value() < 0) {
            return Err(OrderFlowError::InvalidItem);
        }
        let (order, inserted) = self.db.insert_order(order).await?;
        if inserted {
            debug!("🛒️ Order [{}] created for buyer {}", order.order_id, order.buyer_id);
        } else {
            info!("🛒️ Order [{}] already exists; returning the stored order", order.order_id);
        }
        Ok(order)
    }

    /// Apply a buyer- or seller-requested status change.
    ///
    /// The actor's role is derived from their relation to the order — the same user may be a buyer on one order
    /// and a seller on another — and the transition must pass the state machine before the compare-and-set
    /// update runs. A concurrent transition that wins the race surfaces as a storage-level conflict, which the
    /// HTTP layer reports the same way as a matrix denial (409).
    pub async fn modify_status_for_order(
        &self,
        oid: &OrderId,
        target: OrderStatus,
        user_id: &str,
        claimed_roles: &[ActorRole],
    ) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(oid)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(oid.clone()))?;
        let role = if order.buyer_id == user_id && claimed_roles.contains(&ActorRole::Buyer) {
            ActorRole::Buyer
        } else if order.seller_id == user_id && claimed_roles.contains(&ActorRole::Seller) {
            ActorRole::Seller
        } else {
            return Err(OrderFlowError::NotAParticipant(oid.clone()));
        };
        let items = self.db.fetch_order_items(oid).await?;
        let has_digital = items.iter().any(|i| i.is_digital);
        can_transition(order.status, target, role, has_digital)?;
        let old_status = order.status;
        let updated = self.db.update_order_status_checked(oid, &[old_status], target).await?;
        let event = NewTimelineEvent::user(oid.clone(), TimelineEventType::StatusChanged, user_id)
            .with_meta(serde_json::json!({ "from": old_status, "to": target, "role": role }));
        self.db.append_timeline_event(event).await?;
        info!("🛒️ Order [{oid}] moved {old_status} -> {target} by {role} {user_id}");
        self.call_status_hook(OrderStatusChangedEvent::new(updated.clone(), old_status)).await;
        Ok(updated)
    }

    /// Fetch one order with its items and timeline, enforcing that the requester participates in it.
    pub async fn fetch_order_for_user(
        &self,
        oid: &OrderId,
        user_id: &str,
    ) -> Result<(Order, Vec<OrderItem>, Vec<TimelineEvent>), OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(oid)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(oid.clone()))?;
        if order.buyer_id != user_id && order.seller_id != user_id {
            return Err(OrderFlowError::NotAParticipant(oid.clone()));
        }
        let items = self.db.fetch_order_items(oid).await?;
        let timeline = self.db.fetch_timeline(oid).await?;
        Ok((order, items, timeline))
    }

    pub async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderFlowError> {
        Ok(self.db.fetch_orders_for_user(user_id).await?)
    }

    async fn call_status_hook(&self, event: OrderStatusChangedEvent) {
        for producer in &self.producers.order_status_producer {
            trace!("🛒️ Notifying order status subscribers");
            producer.publish_event(event.clone()).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
