use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{web::Data, FromRequest, HttpRequest};
use krkn_core::api::v1::Role;
use krkn_core::errors::Error as CoreError;

use crate::error::ApiError;
use crate::state::AppState;

/// Caller identity validated from the `Authorization: Bearer <token>`
/// header (spec §4.7 "Mechanism": "a per-request gate receives the
/// validated caller role from an upstream auth check"). Any route that
/// extracts `Identity` is implicitly `user+`: an invalid or missing
/// token fails extraction with `Unauthorized` before the handler body
/// runs.
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl FromRequest for Identity {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract(req))
    }
}

/// Admin-only routes extract this instead; extraction itself enforces
/// the `admin`-only half of the policy table (spec §4.7), so handler
/// bodies never need to re-check the role.
pub struct AdminIdentity(pub Identity);

impl FromRequest for AdminIdentity {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract(req).and_then(|identity| {
            if identity.role == Role::Admin {
                Ok(AdminIdentity(identity))
            } else {
                Err(ApiError(CoreError::Forbidden("admin role required".into())))
            }
        }))
    }
}

fn extract(req: &HttpRequest) -> Result<Identity, ApiError> {
    let state = req
        .app_data::<Data<AppState>>()
        .expect("AppState is always registered as app_data");

    let header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| ApiError(CoreError::Unauthorized("missing Authorization header".into())))?;
    let value = header
        .to_str()
        .map_err(|_| ApiError(CoreError::Unauthorized("malformed Authorization header".into())))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError(CoreError::Unauthorized("expected a Bearer token".into())))?;

    let identity = state.token_issuer.validate(token).map_err(ApiError)?;
    Ok(Identity {
        user_id: identity.user_id,
        role: identity.role,
    })
}
