use actix_web::{get, post, web::Data, web::Json, HttpRequest, HttpResponse};
use krkn_core::api::v1::Role;
use krkn_core::errors::Error as CoreError;
use krkn_core::users::RegisterUserRequest;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
struct IsRegisteredResponse {
    registered: bool,
}

#[get("/auth/is-registered")]
pub async fn is_registered(state: Data<AppState>) -> ApiResult<HttpResponse> {
    let registered = state.users.any_admin_registered().await?;
    Ok(HttpResponse::Ok().json(IsRegisteredResponse { registered }))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    user_id: String,
    name: String,
    surname: String,
    #[serde(default)]
    organization: Option<String>,
    password: String,
    #[serde(default)]
    role: Option<Role>,
}

#[derive(Serialize)]
struct RegisterResponse {
    #[serde(rename = "userID")]
    user_id: String,
}

/// Public while no admin exists yet; otherwise requires an admin token
/// (spec §3 "User": "first registered user must be admin; registration
/// after that requires an admin token", §4.7 "register (when no admin
/// yet)"). The conditional gate can't be expressed as a static
/// extractor, so it's checked in the handler body.
#[post("/auth/register")]
pub async fn register(state: Data<AppState>, req: HttpRequest, body: Json<RegisterRequest>) -> ApiResult<HttpResponse> {
    let bootstrap = !state.users.any_admin_registered().await?;

    let role = if bootstrap {
        Role::Admin
    } else {
        require_admin(&state, &req)?;
        body.role.unwrap_or(Role::User)
    };

    let user_id = state
        .users
        .register(RegisterUserRequest {
            user_id: body.user_id.clone(),
            name: body.name.clone(),
            surname: body.surname.clone(),
            organization: body.organization.clone(),
            password: body.password.clone(),
            role,
        })
        .await?;

    Ok(HttpResponse::Created().json(RegisterResponse { user_id }))
}

fn require_admin(state: &AppState, req: &HttpRequest) -> ApiResult<()> {
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
    if identity.role != Role::Admin {
        return Err(ApiError(CoreError::Forbidden("admin role required to register further users".into())));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct LoginRequest {
    user_id: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    #[serde(rename = "expiresAt")]
    expires_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "userID")]
    user_id: String,
    role: Role,
    name: String,
    surname: String,
}

#[post("/auth/login")]
pub async fn login(state: Data<AppState>, body: Json<LoginRequest>) -> ApiResult<HttpResponse> {
    let result = state
        .users
        .login(&state.token_issuer, state.config.token_duration, &body.user_id, &body.password)
        .await?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        token: result.token,
        expires_at: result.expires_at,
        user_id: result.user_id,
        role: result.role,
        name: result.name,
        surname: result.surname,
    }))
}
