use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use bazaar_payment_engine::{
    db_types::{DisputeStatus, OrderStatus},
    DownloadApi,
    DownloadConfig,
};
use bpg_common::Secret;

use super::{
    helpers::{as_user, order_fixture, send, BUYER},
    mocks::MockDatabase,
};
use crate::routes::DownloadRoute;

fn api_with(db: MockDatabase) -> DownloadApi<MockDatabase> {
    let config = DownloadConfig { signing_key: Secret::new("test-signing-key".to_string()), ..Default::default() };
    DownloadApi::new(db, config)
}

fn download_request() -> TestRequest {
    as_user(TestRequest::post().uri("/downloads/prod-ebook"), BUYER, "buyer")
}

#[actix_web::test]
async fn entitled_buyers_receive_a_grant() {
    fn configure(cfg: &mut ServiceConfig) {
        let mut db = MockDatabase::new();
        db.expect_seller_owns_product().returning(|_, _| Ok(false));
        db.expect_fetch_orders_for_product_buyer()
            .returning(|_, _| Ok(vec![order_fixture(OrderStatus::Completed)]));
        db.expect_count_recent_downloads().returning(|_, _, _| Ok(0));
        db.expect_log_download_attempt().returning(|entry| {
            assert!(entry.granted);
            Ok(())
        });
        db.expect_bump_product_downloads().returning(|_| Ok(()));
        db.expect_fetch_artifact().returning(|_, _| Ok(None));
        cfg.service(DownloadRoute::<MockDatabase>::new()).app_data(web::Data::new(api_with(db)));
    }
    let (status, body) = send(download_request(), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"artifact_key\""));
    assert!(body.contains("\"ttl_seconds\":120"));
}

#[actix_web::test]
async fn unentitled_requesters_are_forbidden() {
    fn configure(cfg: &mut ServiceConfig) {
        let mut db = MockDatabase::new();
        db.expect_seller_owns_product().returning(|_, _| Ok(false));
        db.expect_fetch_orders_for_product_buyer().returning(|_, _| Ok(vec![]));
        cfg.service(DownloadRoute::<MockDatabase>::new()).app_data(web::Data::new(api_with(db)));
    }
    let (status, _) = send(download_request(), configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn refunded_products_are_gone() {
    fn configure(cfg: &mut ServiceConfig) {
        let mut db = MockDatabase::new();
        db.expect_seller_owns_product().returning(|_, _| Ok(false));
        db.expect_fetch_orders_for_product_buyer().returning(|_, _| {
            Ok(vec![order_fixture(OrderStatus::Completed), order_fixture(OrderStatus::Refunded)])
        });
        cfg.service(DownloadRoute::<MockDatabase>::new()).app_data(web::Data::new(api_with(db)));
    }
    let (status, _) = send(download_request(), configure).await;
    assert_eq!(status, StatusCode::GONE);
}

#[actix_web::test]
async fn orders_under_review_are_locked() {
    fn configure(cfg: &mut ServiceConfig) {
        let mut db = MockDatabase::new();
        db.expect_seller_owns_product().returning(|_, _| Ok(false));
        db.expect_fetch_orders_for_product_buyer().returning(|_, _| {
            let mut order = order_fixture(OrderStatus::Completed);
            order.requires_review = true;
            Ok(vec![order])
        });
        cfg.service(DownloadRoute::<MockDatabase>::new()).app_data(web::Data::new(api_with(db)));
    }
    let (status, body) = send(download_request(), configure).await;
    assert_eq!(status, StatusCode::LOCKED);
    assert!(body.contains("awaiting verification"));
}

#[actix_web::test]
async fn disputed_orders_are_locked() {
    fn configure(cfg: &mut ServiceConfig) {
        let mut db = MockDatabase::new();
        db.expect_seller_owns_product().returning(|_, _| Ok(false));
        db.expect_fetch_orders_for_product_buyer().returning(|_, _| {
            let mut order = order_fixture(OrderStatus::Paid);
            order.dispute_status = DisputeStatus::UnderReview;
            Ok(vec![order])
        });
        cfg.service(DownloadRoute::<MockDatabase>::new()).app_data(web::Data::new(api_with(db)));
    }
    let (status, _) = send(download_request(), configure).await;
    assert_eq!(status, StatusCode::LOCKED);
}

#[actix_web::test]
async fn the_rate_limit_returns_429_and_still_logs() {
    fn configure(cfg: &mut ServiceConfig) {
        let mut db = MockDatabase::new();
        db.expect_seller_owns_product().returning(|_, _| Ok(false));
        db.expect_fetch_orders_for_product_buyer()
            .returning(|_, _| Ok(vec![order_fixture(OrderStatus::Completed)]));
        db.expect_count_recent_downloads().returning(|_, _, _| Ok(5));
        db.expect_log_download_attempt().times(1).returning(|entry| {
            assert!(!entry.granted, "the denied attempt is still logged");
            Ok(())
        });
        cfg.service(DownloadRoute::<MockDatabase>::new()).app_data(web::Data::new(api_with(db)));
    }
    let (status, _) = send(download_request(), configure).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[actix_web::test]
async fn a_failed_analytics_bump_does_not_block_the_grant() {
    fn configure(cfg: &mut ServiceConfig) {
        let mut db = MockDatabase::new();
        db.expect_seller_owns_product().returning(|_, _| Ok(false));
        db.expect_fetch_orders_for_product_buyer()
            .returning(|_, _| Ok(vec![order_fixture(OrderStatus::Completed)]));
        db.expect_count_recent_downloads().returning(|_, _, _| Ok(0));
        db.expect_log_download_attempt().returning(|_| Ok(()));
        db.expect_bump_product_downloads().returning(|_| {
            Err(bazaar_payment_engine::traits::PaymentGatewayError::DatabaseError("stats table on fire".into()))
        });
        db.expect_fetch_artifact().returning(|_, _| Ok(None));
        cfg.service(DownloadRoute::<MockDatabase>::new()).app_data(web::Data::new(api_with(db)));
    }
    let (status, _) = send(download_request(), configure).await;
    assert_eq!(status, StatusCode::OK);
}
