use actix_web::{get, web::Data, web::Query, HttpResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use krkn_core::errors::Error as CoreError;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::identity::Identity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct NodesQuery {
    #[serde(default, rename = "targetUUID", alias = "id")]
    target_uuid: Option<String>,
    #[serde(default, rename = "cluster-name")]
    cluster_name: Option<String>,
}

#[derive(Serialize)]
struct NodesResponse {
    nodes: Vec<String>,
}

#[get("/nodes")]
pub async fn list(state: Data<AppState>, _identity: Identity, query: Query<NodesQuery>) -> ApiResult<HttpResponse> {
    let uuid = match &query.target_uuid {
        Some(uuid) => uuid.clone(),
        None => {
            let cluster_name = query
                .cluster_name
                .as_ref()
                .ok_or_else(|| CoreError::BadRequest("targetUUID (or id/cluster-name) is required".into()))?;
            state
                .targets
                .list()
                .await?
                .into_iter()
                .find(|t| &t.cluster_name == cluster_name)
                .map(|t| t.uuid)
                .ok_or_else(|| CoreError::NotFound(format!("no target registered for cluster `{cluster_name}`")))?
        }
    };

    let kubeconfig = state.targets.get_kubeconfig(&uuid).await?;
    let nodes = state.nodes.enumerate_nodes(&STANDARD.encode(kubeconfig.as_bytes())).await?;
    Ok(HttpResponse::Ok().json(NodesResponse { nodes }))
}
