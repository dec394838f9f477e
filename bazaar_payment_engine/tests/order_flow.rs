//! Order creation and buyer/seller-driven transitions against a real (in-memory) store.
mod support;

use bazaar_payment_engine::{
    db_types::{ActorRole, OrderStatus, PaymentStatus, TimelineEventType},
    events::EventProducers,
    state_machine::TransitionDenied,
    traits::OrderManagement,
    OrderFlowApi,
    OrderFlowError,
};
use support::*;

#[tokio::test]
async fn new_orders_start_requested_with_snapshot_total() {
    let db = new_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.process_new_order(digital_order()).await.unwrap();
    assert_eq!(order.status, OrderStatus::Requested);
    assert_eq!(order.payment_status, PaymentStatus::NotStarted);
    assert_eq!(order.total_price.value(), 4999);
    let timeline = db.fetch_timeline(&order.order_id).await.unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].event_type, TimelineEventType::OrderCreated);
}

#[tokio::test]
async fn resubmitting_an_order_id_is_idempotent() {
    let db = new_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let request = digital_order();
    let first = api.process_new_order(request.clone()).await.unwrap();
    let second = api.process_new_order(request).await.unwrap();
    assert_eq!(first.id, second.id);
    let timeline = db.fetch_timeline(&first.order_id).await.unwrap();
    assert_eq!(timeline.len(), 1, "no duplicate order_created entry");
}

#[tokio::test]
async fn empty_orders_are_rejected() {
    let db = new_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let mut order = digital_order();
    order.items.clear();
    assert!(matches!(api.process_new_order(order).await, Err(OrderFlowError::EmptyOrder)));
}

#[tokio::test]
async fn seller_approves_and_buyer_cancels() {
    let db = new_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.process_new_order(digital_order()).await.unwrap();
    let oid = order.order_id.clone();
    let approved =
        api.modify_status_for_order(&oid, OrderStatus::Approved, SELLER, &[ActorRole::Seller]).await.unwrap();
    assert_eq!(approved.status, OrderStatus::Approved);
    let cancelled =
        api.modify_status_for_order(&oid, OrderStatus::Cancelled, BUYER, &[ActorRole::Buyer]).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn buyers_cannot_approve_their_own_orders() {
    let db = new_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.process_new_order(digital_order()).await.unwrap();
    let err = api
        .modify_status_for_order(&order.order_id, OrderStatus::Approved, BUYER, &[ActorRole::Buyer])
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::TransitionDenied(TransitionDenied::RoleNotPermitted { .. })));
}

#[tokio::test]
async fn outsiders_are_not_participants() {
    let db = new_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.process_new_order(digital_order()).await.unwrap();
    let err = api
        .modify_status_for_order(&order.order_id, OrderStatus::Cancelled, "user-somebody-else", &[
            ActorRole::Buyer,
            ActorRole::Seller,
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::NotAParticipant(_)));
}

#[tokio::test]
async fn digital_orders_cannot_skip_payment() {
    let db = new_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let oid = approved_order(&db, digital_order()).await;
    let err = api
        .modify_status_for_order(&oid, OrderStatus::Completed, SELLER, &[ActorRole::Seller])
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::TransitionDenied(TransitionDenied::DigitalRequiresPayment)));
    assert_eq!(get_order(&db, &oid).await.status, OrderStatus::Approved, "guard must not mutate the order");
}

#[tokio::test]
async fn physical_orders_complete_out_of_band() {
    let db = new_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let oid = approved_order(&db, physical_order()).await;
    let completed =
        api.modify_status_for_order(&oid, OrderStatus::Completed, SELLER, &[ActorRole::Seller]).await.unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
}

#[tokio::test]
async fn cancellation_is_blocked_after_payment() {
    let db = new_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let oid = approved_order(&db, digital_order()).await;
    // Payment settles via the reconciler
    reconciler(&db).handle_event(session_completed_event("evt_pay", &oid, 4999)).await.unwrap();
    let err = api
        .modify_status_for_order(&oid, OrderStatus::Cancelled, BUYER, &[ActorRole::Buyer])
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::TransitionDenied(TransitionDenied::IllegalTransition { .. })));
}

#[tokio::test]
async fn transitions_append_to_the_timeline_in_order() {
    let db = new_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.process_new_order(digital_order()).await.unwrap();
    let oid = order.order_id.clone();
    api.modify_status_for_order(&oid, OrderStatus::Approved, SELLER, &[ActorRole::Seller]).await.unwrap();
    api.modify_status_for_order(&oid, OrderStatus::Cancelled, BUYER, &[ActorRole::Buyer]).await.unwrap();
    let timeline = db.fetch_timeline(&oid).await.unwrap();
    let types: Vec<_> = timeline.iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![
        TimelineEventType::OrderCreated,
        TimelineEventType::StatusChanged,
        TimelineEventType::StatusChanged
    ]);
    assert_eq!(timeline[2].meta["to"], serde_json::json!("Cancelled"));
}
