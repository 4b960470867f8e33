use actix_web::{delete, get, post, web::Data, web::Json, web::Path, HttpResponse};
use krkn_core::errors::Error as CoreError;
use krkn_core::scenario_run::CreateScenarioRunRequest;
use serde::Serialize;
use tracing::warn;

use crate::error::ApiResult;
use crate::identity::Identity;
use crate::state::AppState;

#[derive(Serialize)]
struct ScenariosResponse {
    scenarios: Vec<krkn_core::catalog::ScenarioDescriptor>,
}

#[post("/scenarios")]
pub async fn list(state: Data<AppState>, _identity: Identity) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(ScenariosResponse { scenarios: state.catalog.list() }))
}

#[post("/scenarios/detail/{name}")]
pub async fn detail(state: Data<AppState>, _identity: Identity, name: Path<String>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.catalog.detail(&name)?))
}

#[post("/scenarios/globals/{name}")]
pub async fn globals(state: Data<AppState>, _identity: Identity, name: Path<String>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.catalog.globals(&name)?))
}

#[derive(Serialize)]
struct RunResponse {
    #[serde(rename = "scenarioRunName")]
    scenario_run_name: String,
    cluster_names: Vec<String>,
    total_targets: usize,
}

/// Kicks off an initial reconciliation pass for every named cluster in
/// the background; the periodic reconciler (`reconciler.rs`) picks up
/// anything that didn't get a chance to run here or that needs a retry
/// (spec §4.5 "Per-cluster reconciliation").
#[post("/scenarios/run")]
pub async fn create(state: Data<AppState>, _identity: Identity, body: Json<CreateScenarioRunRequest>) -> ApiResult<HttpResponse> {
    let response = state.scenario_runs.create(body.into_inner()).await?;

    for cluster_name in response.cluster_names.clone() {
        let run_name = response.run_name.clone();
        let metrics = state.metrics.clone();
        tokio::spawn(async move {
            let client = match kube::Client::try_default().await {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "could not build a kube client for initial scenario reconciliation");
                    return;
                }
            };
            let namespace = client.default_namespace().to_string();
            let controller = krkn_core::scenario_run::ScenarioRunController::new(client, &namespace, metrics);
            if let Err(e) = controller.reconcile_cluster(&run_name, &cluster_name).await {
                warn!(run = run_name, cluster = cluster_name, error = %e, "initial scenario reconciliation failed");
            }
        });
    }

    Ok(HttpResponse::Created().json(RunResponse {
        scenario_run_name: response.run_name,
        cluster_names: response.cluster_names,
        total_targets: response.total_targets,
    }))
}

#[get("/scenarios/run")]
pub async fn list_runs(state: Data<AppState>, _identity: Identity) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.scenario_runs.list().await?))
}

#[get("/scenarios/run/{run_name}")]
pub async fn get_run(state: Data<AppState>, _identity: Identity, run_name: Path<String>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.scenario_runs.get(&run_name).await?))
}

/// The path segment is a per-cluster `jobId` rather than a run name
/// (spec §6 table literally names it `{jobId}`); the owning run is
/// located by scanning for it, then the job is cancelled in place
/// (`ScenarioRunController::request_cancel`) rather than deleting the
/// whole run.
#[delete("/scenarios/run/{job_id}")]
pub async fn cancel_job(state: Data<AppState>, _identity: Identity, job_id: Path<String>) -> ApiResult<HttpResponse> {
    let runs = state.scenario_runs.list().await?;
    let run_name = runs
        .into_iter()
        .find(|run| {
            run.status
                .as_ref()
                .map(|s| s.cluster_jobs.iter().any(|j| j.job_id == *job_id))
                .unwrap_or(false)
        })
        .and_then(|run| run.metadata.name)
        .ok_or_else(|| CoreError::NotFound(format!("no scenario run owns job `{}`", job_id)))?;

    state.scenario_runs.request_cancel(&run_name, &job_id).await?;
    Ok(HttpResponse::Ok().json("job cancelled"))
}
