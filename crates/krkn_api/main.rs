use std::time::Duration;

use krkn_core::config::OperatorConfig;
use krkn_core::shared_state::SharedState;
use krkn_core::telemetry;
use kube::Client;
use tracing::{error, info, warn};

mod error;
mod handlers;
mod identity;
mod server;
mod state;

use state::AppState;

/// Periodically clears out `ConfigRequest`s nobody ever consumed (spec
/// §4.2 "Failure model" / §6 `CONFIG_REQUEST_SWEEP_*`).
fn spawn_config_request_sweep(orchestrator: krkn_core::config_orchestrator::ConfigOrchestrator, interval: Duration, max_age: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match orchestrator.sweep(max_age).await {
                Ok(0) => {}
                Ok(n) => info!(swept = n, "reclaimed orphaned config requests"),
                Err(e) => warn!(error = %e, "config request sweep failed"),
            }
        }
    });
}

/// Periodically drives every non-terminal `ScenarioRun` forward:
/// clusters that never got a workload are (re)provisioned, clusters
/// with an in-flight job get their phase synced from the underlying
/// `Job` (spec §4.5 steps 1-5). Complements the immediate reconcile
/// kicked off synchronously by `POST /scenarios/run`.
fn spawn_scenario_reconciler(controller: std::sync::Arc<krkn_core::scenario_run::ScenarioRunController>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let runs = match controller.list().await {
                Ok(runs) => runs,
                Err(e) => {
                    warn!(error = %e, "could not list scenario runs for reconciliation");
                    continue;
                }
            };
            SharedState::global().set("last_reconcile", chrono::Utc::now().to_rfc3339()).await;

            for run in runs {
                let Some(run_name) = run.metadata.name.clone() else { continue };
                let Some(status) = run.status.as_ref() else { continue };
                if status.phase != krkn_core::api::v1::ScenarioRunPhase::Running {
                    continue;
                }

                for job in &status.cluster_jobs {
                    let cluster_name = job.cluster_name.clone();
                    if job.job_id.is_empty() {
                        if let Err(e) = controller.reconcile_cluster(&run_name, &cluster_name).await {
                            warn!(run = run_name, cluster = cluster_name, error = %e, "scheduled reconciliation failed");
                        }
                    } else if !job.phase.is_terminal() {
                        if let Err(e) = controller.sync_cluster_job(&run_name, &cluster_name).await {
                            warn!(run = run_name, cluster = cluster_name, error = %e, "job sync failed");
                        }
                    }
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init().await;

    let config = OperatorConfig::from_env();
    let client = Client::try_default().await?;

    let state = AppState::new(client.clone(), config.clone()).await?;
    let metrics = state.metrics.clone();

    spawn_config_request_sweep(
        krkn_core::config_orchestrator::ConfigOrchestrator::new(client.clone(), &config.namespace, metrics.clone()),
        config.config_request_sweep_interval,
        config.config_request_sweep_age,
    );

    let reconciler = std::sync::Arc::new(krkn_core::scenario_run::ScenarioRunController::new(client, &config.namespace, metrics));
    spawn_scenario_reconciler(reconciler, Duration::from_secs(10));

    let bind_addr = config.bind_addr.clone();
    info!(bind_addr, "starting krkn operator API");
    if let Err(e) = server::start_server(state, &bind_addr).await {
        error!(error = %e, "server exited with error");
        return Err(e);
    }

    Ok(())
}
