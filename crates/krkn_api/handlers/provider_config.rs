use std::collections::BTreeMap;

use actix_web::{get, post, web::Data, web::Json, web::Path, HttpResponse};
use krkn_core::api::v1::Contribution;
use krkn_core::config_orchestrator::RequestView;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::identity::{AdminIdentity, Identity};
use crate::state::AppState;

#[derive(Serialize)]
struct CreateRequestResponse {
    uuid: String,
}

#[post("/provider-config")]
pub async fn create(state: Data<AppState>, _identity: Identity) -> ApiResult<HttpResponse> {
    let uuid = state.orchestrator.create_request().await?;
    Ok(HttpResponse::Accepted().json(CreateRequestResponse { uuid }))
}

#[derive(Serialize)]
struct GetRequestResponse {
    uuid: String,
    status: &'static str,
    config_data: BTreeMap<String, Contribution>,
}

#[get("/provider-config/{uuid}")]
pub async fn get(state: Data<AppState>, _identity: Identity, uuid: Path<String>) -> ApiResult<HttpResponse> {
    match state.orchestrator.get_request(&uuid).await? {
        RequestView::Pending => Ok(HttpResponse::Accepted().finish()),
        RequestView::Completed { contributions } => Ok(HttpResponse::Ok().json(GetRequestResponse {
            uuid: uuid.into_inner(),
            status: "Completed",
            config_data: contributions,
        })),
    }
}

#[derive(Deserialize)]
pub struct SubmitValuesRequest {
    provider_name: String,
    values: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct SubmitValuesResponse {
    message: &'static str,
    updated_fields: Vec<String>,
}

#[post("/provider-config/{uuid}")]
pub async fn submit(state: Data<AppState>, _admin: AdminIdentity, uuid: Path<String>, body: Json<SubmitValuesRequest>) -> ApiResult<HttpResponse> {
    let outcome = state.submissions.submit(&uuid, &body.provider_name, &body.values).await?;
    Ok(HttpResponse::Ok().json(SubmitValuesResponse {
        message: "values submitted",
        updated_fields: outcome.updated_fields,
    }))
}
