use actix_web::{get, patch, web::Data, web::Json, web::Path, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::identity::{AdminIdentity, Identity};
use crate::state::AppState;

#[derive(Serialize)]
struct ProvidersResponse {
    providers: Vec<krkn_core::provider_registry::ProviderSummary>,
}

#[get("/providers")]
pub async fn list(state: Data<AppState>, _identity: Identity) -> ApiResult<HttpResponse> {
    let providers = state.providers.list().await?;
    Ok(HttpResponse::Ok().json(ProvidersResponse { providers }))
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    active: bool,
}

#[patch("/providers/{name}")]
pub async fn set_active(state: Data<AppState>, _admin: AdminIdentity, name: Path<String>, body: Json<SetActiveRequest>) -> ApiResult<HttpResponse> {
    state.providers.set_active(&name, body.active).await?;
    Ok(HttpResponse::Ok().json("updated"))
}
