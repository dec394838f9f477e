use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use bazaar_payment_engine::{
    events::EventProducers,
    traits::PaymentGatewayError,
    ReconcilerApi,
    SecretCache,
};
use bpg_common::Secret;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use super::{helpers::send, mocks::MockDatabase};
use crate::webhook_routes::{StripeWebhookRoute, SIGNATURE_HEADER};

const PLATFORM_SECRET: &str = "whsec_platform_test";
const ACCOUNT_SECRET: &str = "whsec_account_test";

fn sign(payload: &[u8], secret: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn reconciler_with(db: MockDatabase) -> ReconcilerApi<MockDatabase> {
    ReconcilerApi::new(
        db,
        EventProducers::default(),
        SecretCache::fixed(Secret::new(PLATFORM_SECRET.to_string())),
        SecretCache::fixed(Secret::new(ACCOUNT_SECRET.to_string())),
    )
}

fn configure_plain(cfg: &mut ServiceConfig) {
    // No expectations: none of these requests may reach the store
    let api = reconciler_with(MockDatabase::new());
    cfg.service(StripeWebhookRoute::<MockDatabase>::new()).app_data(web::Data::new(api));
}

fn unknown_event() -> Vec<u8> {
    json!({ "id": "evt_1", "type": "invoice.created", "data": { "object": {} } }).to_string().into_bytes()
}

#[actix_web::test]
async fn missing_signature_header_is_rejected() {
    let req = TestRequest::post().uri("/webhook/stripe").set_payload(unknown_event());
    let (status, _) = send(req, configure_plain).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn a_bad_signature_is_rejected() {
    let payload = unknown_event();
    let header = sign(&payload, "whsec_wrong");
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(payload);
    let (status, body) = send(req, configure_plain).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid signature"));
}

#[actix_web::test]
async fn unknown_event_types_are_acknowledged() {
    let payload = unknown_event();
    let header = sign(&payload, PLATFORM_SECRET);
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(payload);
    let (status, body) = send(req, configure_plain).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"success\":true"));
}

#[actix_web::test]
async fn the_account_secret_is_a_fallback() {
    let payload = unknown_event();
    let header = sign(&payload, ACCOUNT_SECRET);
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(payload);
    let (status, _) = send(req, configure_plain).await;
    assert_eq!(status, StatusCode::OK);
}

fn completed_session_payload() -> Vec<u8> {
    json!({
        "id": "evt_42",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_1",
            "payment_status": "paid",
            "amount_total": 4999,
            "payment_intent": "pi_1",
            "metadata": { "order_id": "ord-0001" }
        }}
    })
    .to_string()
    .into_bytes()
}

#[actix_web::test]
async fn business_mismatches_are_acknowledged_not_retried() {
    fn configure(cfg: &mut ServiceConfig) {
        let mut db = MockDatabase::new();
        // The referenced order does not exist; the event must be acknowledged so Stripe stops retrying
        db.expect_fetch_order_by_order_id().returning(|_| Ok(None));
        let api = reconciler_with(db);
        cfg.service(StripeWebhookRoute::<MockDatabase>::new()).app_data(web::Data::new(api));
    }
    let payload = completed_session_payload();
    let header = sign(&payload, PLATFORM_SECRET);
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(payload);
    let (status, body) = send(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"success\":false"));
}

#[actix_web::test]
async fn infrastructure_failures_ask_for_a_retry() {
    fn configure(cfg: &mut ServiceConfig) {
        let mut db = MockDatabase::new();
        db.expect_fetch_order_by_order_id()
            .returning(|_| Err(PaymentGatewayError::DatabaseError("store unavailable".to_string())));
        let api = reconciler_with(db);
        cfg.service(StripeWebhookRoute::<MockDatabase>::new()).app_data(web::Data::new(api));
    }
    let payload = completed_session_payload();
    let header = sign(&payload, PLATFORM_SECRET);
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(payload);
    let (status, _) = send(req, configure).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn authenticated_garbage_is_acknowledged() {
    let payload = b"{\"not\":\"an event\"}".to_vec();
    let header = sign(&payload, PLATFORM_SECRET);
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(payload);
    let (status, body) = send(req, configure_plain).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"success\":false"));
}
