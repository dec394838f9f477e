//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go into a separate
//! module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the storage (and processor) traits so that endpoint tests can run them against
//! mocks. actix cannot register generic handlers directly, so each route is declared through the `route!` macro,
//! which emits a zero-sized `*Route` registration type with the concrete backend filled in at server assembly.
use actix_web::{get, web, HttpResponse, Responder};
use bazaar_payment_engine::{
    db_types::{ActorRole, NewOrder, OrderId, ProductId},
    traits::{PaymentGatewayDatabase, ProcessorClient},
    CheckoutApi,
    DownloadApi,
    OrderFlowApi,
};
use log::*;

use crate::{
    auth::AuthenticatedUser,
    data_objects::{CreateOrderRequest, OrderView, StatusUpdateRequest},
    errors::ServerError,
};

// actix cannot handle generics in handlers, so registration types are generated with the `route!` macro.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl PaymentGatewayDatabase);
/// Create a new order from a buyer's purchase request. The order starts in `Requested` and waits for the
/// seller's decision.
pub async fn create_order<TPaymentGatewayDatabase>(
    auth: AuthenticatedUser,
    body: web::Json<CreateOrderRequest>,
    api: web::Data<OrderFlowApi<TPaymentGatewayDatabase>>,
) -> Result<HttpResponse, ServerError>
where
    TPaymentGatewayDatabase: PaymentGatewayDatabase,
{
    if !auth.has_role(ActorRole::Buyer) {
        return Err(ServerError::InsufficientPermissions("Only buyers can create orders".to_string()));
    }
    let request = body.into_inner();
    let mut order = NewOrder::new(auth.user_id, request.seller_id, request.items);
    if let Some(currency) = request.currency {
        order.currency = currency;
    }
    debug!("💻️ POST create order for buyer {} with {} items", order.buyer_id, order.items.len());
    let order = api.process_new_order(order).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(my_orders => Get "/orders" impl PaymentGatewayDatabase);
pub async fn my_orders<TPaymentGatewayDatabase>(
    auth: AuthenticatedUser,
    api: web::Data<OrderFlowApi<TPaymentGatewayDatabase>>,
) -> Result<HttpResponse, ServerError>
where
    TPaymentGatewayDatabase: PaymentGatewayDatabase,
{
    trace!("💻️ GET orders for {}", auth.user_id);
    let orders = api.fetch_orders_for_user(&auth.user_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl PaymentGatewayDatabase);
pub async fn order_by_id<TPaymentGatewayDatabase>(
    auth: AuthenticatedUser,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<TPaymentGatewayDatabase>>,
) -> Result<HttpResponse, ServerError>
where
    TPaymentGatewayDatabase: PaymentGatewayDatabase,
{
    let oid = OrderId(path.into_inner());
    trace!("💻️ GET order [{oid}] for {}", auth.user_id);
    let (order, items, timeline) = api.fetch_order_for_user(&oid, &auth.user_id).await?;
    Ok(HttpResponse::Ok().json(OrderView { order, items, timeline }))
}

route!(order_status => Post "/orders/{order_id}/status" impl PaymentGatewayDatabase);
/// Apply a buyer- or seller-requested status transition. System-only targets (payment, refunds) can never be
/// reached from here; those arrive exclusively through the webhook reconciler.
pub async fn order_status<TPaymentGatewayDatabase>(
    auth: AuthenticatedUser,
    path: web::Path<String>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<TPaymentGatewayDatabase>>,
) -> Result<HttpResponse, ServerError>
where
    TPaymentGatewayDatabase: PaymentGatewayDatabase,
{
    let oid = OrderId(path.into_inner());
    let target = body.into_inner().target_status;
    debug!("💻️ POST status change [{oid}] -> {target} by {}", auth.user_id);
    let order = api.modify_status_for_order(&oid, target, &auth.user_id, &auth.roles).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------  Checkout  ----------------------------------------------------
route!(checkout => Post "/orders/{order_id}/checkout" impl PaymentGatewayDatabase, ProcessorClient);
/// Create (or reuse) a payment session for an approved digital order. Buyer-only.
pub async fn checkout<TPaymentGatewayDatabase, TProcessorClient>(
    auth: AuthenticatedUser,
    path: web::Path<String>,
    api: web::Data<CheckoutApi<TPaymentGatewayDatabase, TProcessorClient>>,
) -> Result<HttpResponse, ServerError>
where
    TPaymentGatewayDatabase: PaymentGatewayDatabase,
    TProcessorClient: ProcessorClient,
{
    if !auth.has_role(ActorRole::Buyer) {
        return Err(ServerError::InsufficientPermissions("Only buyers can start a checkout".to_string()));
    }
    let oid = OrderId(path.into_inner());
    debug!("💻️ POST checkout for order [{oid}] by {}", auth.user_id);
    let result = api.create_or_reuse_session(&oid, &auth.user_id).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------  Downloads  ----------------------------------------------------
route!(download => Post "/downloads/{product_id}" impl PaymentGatewayDatabase);
/// Authorize a download of a digital product. Returns a short-lived signed artifact reference, or a typed
/// error: 403 not entitled, 410 refunded, 423 pending review, 429 rate limited.
pub async fn download<TPaymentGatewayDatabase>(
    auth: AuthenticatedUser,
    path: web::Path<String>,
    api: web::Data<DownloadApi<TPaymentGatewayDatabase>>,
) -> Result<HttpResponse, ServerError>
where
    TPaymentGatewayDatabase: PaymentGatewayDatabase,
{
    let product_id = ProductId(path.into_inner());
    debug!("💻️ POST download authorization for {product_id} by {}", auth.user_id);
    let grant = api.authorize(&product_id, &auth.user_id).await?;
    Ok(HttpResponse::Ok().json(grant))
}
