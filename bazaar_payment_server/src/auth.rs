//! Identity extraction.
//!
//! Authentication lives in a fronting identity layer; by the time a request reaches this server it carries a
//! verified opaque requester id and role claims in trusted headers. [`AuthenticatedUser`] surfaces them as an
//! extractor and nothing in this crate ever validates a credential itself. The `system` role cannot be claimed
//! through headers at all — `ActorRole::from_str` refuses it — so webhook-only transitions stay webhook-only.
use std::{
    future::{ready, Ready},
    str::FromStr,
};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use bazaar_payment_engine::db_types::ActorRole;
use log::debug;

use crate::errors::ServerError;

pub const USER_ID_HEADER: &str = "X-Bazaar-User-Id";
pub const ROLES_HEADER: &str = "X-Bazaar-Roles";

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub roles: Vec<ActorRole>,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: ActorRole) -> bool {
        self.roles.contains(&role)
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_identity(req))
    }
}

fn extract_identity(req: &HttpRequest) -> Result<AuthenticatedUser, ServerError> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServerError::AuthenticationError("No verified requester id on the request".to_string()))?
        .to_string();
    let roles_raw = req
        .headers()
        .get(ROLES_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::AuthenticationError("No role claims on the request".to_string()))?;
    let mut roles = Vec::new();
    for claim in roles_raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let role = ActorRole::from_str(claim).map_err(|e| {
            debug!("💻️ Rejecting unusable role claim '{claim}': {e}");
            ServerError::AuthenticationError(format!("Unrecognized role claim: {claim}"))
        })?;
        roles.push(role);
    }
    if roles.is_empty() {
        return Err(ServerError::AuthenticationError("No role claims on the request".to_string()));
    }
    Ok(AuthenticatedUser { user_id, roles })
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;

    fn extract(req: TestRequest) -> Result<AuthenticatedUser, ServerError> {
        extract_identity(&req.to_http_request())
    }

    #[test]
    fn well_formed_identity_extracts() {
        let user = extract(
            TestRequest::default()
                .insert_header((USER_ID_HEADER, "user-42"))
                .insert_header((ROLES_HEADER, "buyer, seller")),
        )
        .unwrap();
        assert_eq!(user.user_id, "user-42");
        assert!(user.has_role(ActorRole::Buyer));
        assert!(user.has_role(ActorRole::Seller));
    }

    #[test]
    fn missing_identity_is_unauthenticated() {
        assert!(matches!(extract(TestRequest::default()), Err(ServerError::AuthenticationError(_))));
        let missing_roles = TestRequest::default().insert_header((USER_ID_HEADER, "user-42"));
        assert!(matches!(extract(missing_roles), Err(ServerError::AuthenticationError(_))));
    }

    #[test]
    fn the_system_role_cannot_be_claimed() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "user-42"))
            .insert_header((ROLES_HEADER, "system"));
        assert!(matches!(extract(req), Err(ServerError::AuthenticationError(_))));
    }
}
