//----------------------------------------------   Webhooks  ----------------------------------------------------
//! The Stripe webhook endpoint.
//!
//! Signature verification runs over the raw body bytes before any JSON parsing, which is why the handler takes
//! `web::Bytes` rather than a typed extractor. Responses must stay in the 200 range for every
//! processed-or-ignored event — Stripe retries anything else — so business-level mismatches are acknowledged
//! with a failure note in the body, and only a signature failure (400) or an infrastructure fault (500) produces
//! a non-2xx status.
use actix_web::{web, HttpRequest, HttpResponse};
use bazaar_payment_engine::{traits::PaymentGatewayDatabase, ReconcilerApi, ReconcilerError};
use log::*;
use stripe_tools::WebhookEvent;

use crate::{data_objects::JsonResponse, route};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

route!(stripe_webhook => Post "/webhook/stripe" impl PaymentGatewayDatabase);
pub async fn stripe_webhook<TPaymentGatewayDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<ReconcilerApi<TPaymentGatewayDatabase>>,
) -> HttpResponse
where
    TPaymentGatewayDatabase: PaymentGatewayDatabase,
{
    trace!("🔔️ Received webhook request: {}", req.uri());
    let Some(signature) = req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        warn!("🔔️ Webhook delivery without a {SIGNATURE_HEADER} header. Rejecting.");
        return HttpResponse::BadRequest().json(JsonResponse::failure("Missing signature header."));
    };
    if let Err(e) = api.verify_webhook_signature(&body, signature) {
        warn!("🔔️ Webhook signature rejected: {e}");
        return HttpResponse::BadRequest().json(JsonResponse::failure("Invalid signature."));
    }
    let event = match WebhookEvent::from_payload(&body) {
        Ok(event) => event,
        Err(e) => {
            // Authenticated but uninterpretable. Acknowledge so the processor does not retry forever.
            warn!("🔔️ Could not parse webhook payload: {e}");
            return HttpResponse::Ok().json(JsonResponse::failure("Unparseable event."));
        },
    };
    let event_id = event.event_id().to_string();
    match api.handle_event(event).await {
        Ok(()) => {
            debug!("🔔️ Event {event_id} processed");
            HttpResponse::Ok().json(JsonResponse::success("Event processed."))
        },
        Err(e) if e.is_retriable() => {
            error!("🔔️ Infrastructure failure while handling event {event_id}: {e}");
            HttpResponse::InternalServerError().json(JsonResponse::failure("Internal error."))
        },
        Err(e) => {
            // Conflicts, unmatched references and the like: logged, acknowledged, never retried.
            warn!("🔔️ Event {event_id} not applied: {e}");
            HttpResponse::Ok().json(JsonResponse::failure(failure_note(&e)))
        },
    }
}

fn failure_note(e: &ReconcilerError) -> String {
    match e {
        ReconcilerError::UnexpectedState { .. } => "Event conflicts with current order state.".to_string(),
        ReconcilerError::UnmatchedReference(_) => "Event matches no known order.".to_string(),
        ReconcilerError::MalformedEvent(_) => "Event payload incomplete.".to_string(),
        other => other.to_string(),
    }
}
