use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use bazaar_payment_engine::{db_types::OrderStatus, events::EventProducers, OrderFlowApi};
use serde_json::json;

use super::{
    helpers::{as_user, digital_item, order_fixture, send, BUYER, SELLER},
    mocks::MockDatabase,
};
use crate::routes::{CreateOrderRoute, OrderByIdRoute, OrderStatusRoute};

fn order_body() -> serde_json::Value {
    json!({
        "seller_id": SELLER,
        "items": [{ "product_id": "prod-ebook", "quantity": 1, "unit_price": 4999, "is_digital": true }]
    })
}

fn configure_create(cfg: &mut ServiceConfig) {
    let mut db = MockDatabase::new();
    db.expect_insert_order().returning(|_| Ok((order_fixture(OrderStatus::Requested), true)));
    let api = OrderFlowApi::new(db, EventProducers::default());
    cfg.service(CreateOrderRoute::<MockDatabase>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn create_order_without_identity_is_unauthorized() {
    let req = TestRequest::post().uri("/orders").set_json(order_body());
    let (status, body) = send(req, configure_create).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Authentication required"));
}

#[actix_web::test]
async fn sellers_cannot_create_orders() {
    let req = as_user(TestRequest::post().uri("/orders"), SELLER, "seller").set_json(order_body());
    let (status, _) = send(req, configure_create).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn buyers_create_orders() {
    let req = as_user(TestRequest::post().uri("/orders"), BUYER, "buyer").set_json(order_body());
    let (status, body) = send(req, configure_create).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.contains("\"status\":\"Requested\""));
}

fn configure_status(cfg: &mut ServiceConfig) {
    let mut db = MockDatabase::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(order_fixture(OrderStatus::Approved))));
    db.expect_fetch_order_items().returning(|_| Ok(vec![digital_item()]));
    let api = OrderFlowApi::new(db, EventProducers::default());
    cfg.service(OrderStatusRoute::<MockDatabase>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn digital_completion_shortcut_is_a_conflict() {
    let req = as_user(TestRequest::post().uri("/orders/ord-0001/status"), SELLER, "seller")
        .set_json(json!({ "target_status": "Completed" }));
    let (status, body) = send(req, configure_status).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Digital products must be paid before completion"));
}

#[actix_web::test]
async fn strangers_cannot_transition_orders() {
    let req = as_user(TestRequest::post().uri("/orders/ord-0001/status"), "user-stranger", "buyer,seller")
        .set_json(json!({ "target_status": "Cancelled" }));
    let (status, _) = send(req, configure_status).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn buyers_cannot_mark_orders_paid() {
    // `Paid` is reachable only by the reconciler; a buyer claim on the same edge is a role denial
    let req = as_user(TestRequest::post().uri("/orders/ord-0001/status"), BUYER, "buyer")
        .set_json(json!({ "target_status": "Paid" }));
    let (status, _) = send(req, configure_status).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

fn configure_fetch(cfg: &mut ServiceConfig) {
    let mut db = MockDatabase::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(order_fixture(OrderStatus::Approved))));
    db.expect_fetch_order_items().returning(|_| Ok(vec![digital_item()]));
    db.expect_fetch_timeline().returning(|_| Ok(vec![]));
    let api = OrderFlowApi::new(db, EventProducers::default());
    cfg.service(OrderByIdRoute::<MockDatabase>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn participants_can_view_their_order() {
    let req = as_user(TestRequest::get().uri("/orders/ord-0001"), BUYER, "buyer");
    let (status, body) = send(req, configure_fetch).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"items\""));
    assert!(body.contains("\"timeline\""));
}

#[actix_web::test]
async fn outsiders_cannot_view_an_order() {
    let req = as_user(TestRequest::get().uri("/orders/ord-0001"), "user-stranger", "buyer");
    let (status, _) = send(req, configure_fetch).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn unknown_orders_are_not_found() {
    fn configure(cfg: &mut ServiceConfig) {
        let mut db = MockDatabase::new();
        db.expect_fetch_order_by_order_id().returning(|_| Ok(None));
        let api = OrderFlowApi::new(db, EventProducers::default());
        cfg.service(OrderByIdRoute::<MockDatabase>::new()).app_data(web::Data::new(api));
    }
    let req = as_user(TestRequest::get().uri("/orders/ord-missing"), BUYER, "buyer");
    let (status, _) = send(req, configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
