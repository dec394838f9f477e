use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use bazaar_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    CheckoutApi,
    DownloadApi,
    OrderFlowApi,
    ReconcilerApi,
    SecretCache,
    SqliteDatabase,
};
use log::*;
use stripe_tools::StripeApi;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    routes::{health, CheckoutRoute, CreateOrderRoute, DownloadRoute, MyOrdersRoute, OrderByIdRoute, OrderStatusRoute},
    webhook_routes::StripeWebhookRoute,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(64, notification_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let stripe = StripeApi::new(config.stripe.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let checkout_api = CheckoutApi::new(db.clone(), stripe.clone(), config.checkout.clone());
        let download_api = DownloadApi::new(db.clone(), config.download.clone());
        let reconciler_api = ReconcilerApi::new(
            db.clone(),
            producers.clone(),
            SecretCache::fixed(config.platform_webhook_secret.clone()),
            SecretCache::fixed(config.account_webhook_secret.clone()),
        );
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("bps::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(download_api))
            .app_data(web::Data::new(reconciler_api))
            .service(health)
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(OrderStatusRoute::<SqliteDatabase>::new())
            .service(CheckoutRoute::<SqliteDatabase, StripeApi>::new())
            .service(DownloadRoute::<SqliteDatabase>::new())
            .service(StripeWebhookRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// The default notification hooks: emit the "status changed" / "dispute changed" signals to the notification
/// collaborator. Here that boundary is a structured log line; delivery failure can never reach the order flow.
fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_status_changed(|event| {
        Box::pin(async move {
            info!(
                "🔔️ Order {} changed {} -> {} (notify buyer {} and seller {})",
                event.order.order_id,
                event.old_status,
                event.new_status,
                event.order.buyer_id,
                event.order.seller_id
            );
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks.on_dispute_changed(|event| {
        Box::pin(async move {
            info!(
                "🔔️ Order {} dispute changed {} -> {} (notify seller {})",
                event.order_id, event.old_status, event.new_status, event.seller_id
            );
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}
