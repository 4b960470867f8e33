use k8s_openapi::api::core::v1::Pod;
use kube::api::Api;
use kube::Client;
use prometheus::Registry;

use krkn_core::auth::TokenIssuer;
use krkn_core::catalog::ScenarioCatalog;
use krkn_core::config::OperatorConfig;
use krkn_core::config_orchestrator::ConfigOrchestrator;
use krkn_core::metrics::Metrics;
use krkn_core::nodes::NodeEnumerationClient;
use krkn_core::provider_registry::ProviderRegistry;
use krkn_core::scenario_run::ScenarioRunController;
use krkn_core::target::TargetService;
use krkn_core::users::UserService;
use krkn_core::value_submission::ValueSubmission;

/// Everything a handler needs, built once at startup and shared behind
/// `web::Data` (the teacher's single `State` struct handed to every
/// route, `crates/operator/server.rs`).
pub struct AppState {
    pub config: OperatorConfig,
    pub metrics: Metrics,
    pub registry: Registry,
    pub token_issuer: TokenIssuer,
    pub providers: ProviderRegistry,
    pub orchestrator: ConfigOrchestrator,
    pub submissions: ValueSubmission,
    pub targets: TargetService,
    pub scenario_runs: ScenarioRunController,
    pub nodes: NodeEnumerationClient,
    pub catalog: ScenarioCatalog,
    pub users: UserService,
    pub pods: Api<Pod>,
}

impl AppState {
    pub async fn new(client: Client, config: OperatorConfig) -> anyhow::Result<Self> {
        let token_issuer = TokenIssuer::load_or_create(client.clone(), &config.namespace).await?;
        let registry = Registry::new();
        let metrics = Metrics::default().register(&registry)?;

        Ok(Self {
            catalog: ScenarioCatalog::load_from_dir("demos/scenarios"),
            nodes: NodeEnumerationClient::new(config.node_enum_addr.clone()),
            providers: ProviderRegistry::new(client.clone(), &config.namespace),
            orchestrator: ConfigOrchestrator::new(client.clone(), &config.namespace, metrics.clone()),
            submissions: ValueSubmission::new(client.clone(), &config.namespace, metrics.clone()),
            targets: TargetService::new(client.clone(), &config.namespace),
            scenario_runs: ScenarioRunController::new(client.clone(), &config.namespace, metrics.clone()),
            users: UserService::new(client.clone(), &config.namespace),
            pods: Api::namespaced(client, &config.namespace),
            token_issuer,
            metrics,
            registry,
            config,
        })
    }
}
