use actix_web::{
    http::StatusCode,
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use bazaar_payment_engine::db_types::{
    DisputeStatus,
    Order,
    OrderId,
    OrderItem,
    OrderStatus,
    PaymentStatus,
    ProductId,
};
use bpg_common::Cents;
use chrono::{TimeZone, Utc};

use crate::auth::{ROLES_HEADER, USER_ID_HEADER};

pub const BUYER: &str = "user-buyer";
pub const SELLER: &str = "user-seller";

/// Attach the identity headers the fronting auth layer would inject.
pub fn as_user(req: TestRequest, user_id: &str, roles: &str) -> TestRequest {
    req.insert_header((USER_ID_HEADER, user_id)).insert_header((ROLES_HEADER, roles))
}

pub async fn send(req: TestRequest, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    let _ = env_logger::try_init().ok();
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
    (status, body)
}

pub fn order_fixture(status: OrderStatus) -> Order {
    Order {
        id: 1,
        order_id: OrderId("ord-0001".to_string()),
        buyer_id: BUYER.to_string(),
        seller_id: SELLER.to_string(),
        total_price: Cents::from(4999),
        currency: "usd".to_string(),
        status,
        payment_status: PaymentStatus::NotStarted,
        dispute_status: DisputeStatus::None,
        requires_review: false,
        checkout_session_id: None,
        checkout_session_url: None,
        checkout_session_created_at: None,
        payment_intent_id: None,
        created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
    }
}

pub fn digital_item() -> OrderItem {
    OrderItem {
        id: 1,
        order_id: OrderId("ord-0001".to_string()),
        product_id: ProductId("prod-ebook".to_string()),
        quantity: 1,
        unit_price: Cents::from(4999),
        is_digital: true,
    }
}
