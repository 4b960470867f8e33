use actix_web::{delete, get, post, put, web::Data, web::Json, web::Path, HttpResponse};
use krkn_core::target::CreateTargetRequest;
use serde::Serialize;

use crate::error::ApiResult;
use crate::identity::{AdminIdentity, Identity};
use crate::state::AppState;

#[derive(Serialize)]
struct TargetsResponse {
    targets: Vec<krkn_core::target::TargetSummary>,
}

#[get("/operator/targets")]
pub async fn list(state: Data<AppState>, _identity: Identity) -> ApiResult<HttpResponse> {
    let targets = state.targets.list().await?;
    Ok(HttpResponse::Ok().json(TargetsResponse { targets }))
}

#[derive(Serialize)]
struct CreateTargetResponse {
    uuid: String,
    message: &'static str,
}

#[post("/operator/targets")]
pub async fn create(state: Data<AppState>, _admin: AdminIdentity, body: Json<CreateTargetRequest>) -> ApiResult<HttpResponse> {
    let uuid = state.targets.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(CreateTargetResponse { uuid, message: "target created" }))
}

#[get("/operator/targets/{uuid}")]
pub async fn get(state: Data<AppState>, _identity: Identity, uuid: Path<String>) -> ApiResult<HttpResponse> {
    let target = state.targets.get(&uuid).await?;
    Ok(HttpResponse::Ok().json(target))
}

#[put("/operator/targets/{uuid}")]
pub async fn update(state: Data<AppState>, _admin: AdminIdentity, uuid: Path<String>, body: Json<CreateTargetRequest>) -> ApiResult<HttpResponse> {
    state.targets.update(&uuid, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json("target updated"))
}

#[delete("/operator/targets/{uuid}")]
pub async fn delete(state: Data<AppState>, _admin: AdminIdentity, uuid: Path<String>) -> ApiResult<HttpResponse> {
    state.targets.delete(&uuid).await?;
    Ok(HttpResponse::Ok().json("target deleted"))
}
