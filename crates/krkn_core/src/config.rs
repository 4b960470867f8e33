use std::env;
use std::time::Duration;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_secs_or(key: &str, default: u64) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

/// Collects the environment inputs named in spec §6 into a single
/// struct loaded once at startup, rather than reading `env::var` ad
/// hoc throughout the handlers.
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    pub operator_name: String,
    pub namespace: String,
    pub heartbeat_interval: Duration,
    pub node_enum_addr: String,
    pub scenario_service_account: String,
    pub token_duration: Duration,
    pub config_request_sweep_age: Duration,
    pub config_request_sweep_interval: Duration,
    pub bind_addr: String,
    pub kubeconfig_path: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl OperatorConfig {
    pub fn from_env() -> Self {
        Self {
            operator_name: env_or("OPERATOR_NAME", "krkn-operator"),
            namespace: env_or("OPERATOR_NAMESPACE", "default"),
            heartbeat_interval: env_secs_or("HEARTBEAT_INTERVAL_SECONDS", 30),
            node_enum_addr: env_or("NODE_ENUM_ADDR", "http://node-enumerator:8080"),
            scenario_service_account: env_or(
                "SCENARIO_SERVICE_ACCOUNT",
                "krkn-operator-krkn-scenario-runner",
            ),
            token_duration: env_secs_or("TOKEN_DURATION_SECONDS", 24 * 3600),
            config_request_sweep_age: env_secs_or("CONFIG_REQUEST_SWEEP_AGE_SECONDS", 3600),
            config_request_sweep_interval: env_secs_or(
                "CONFIG_REQUEST_SWEEP_INTERVAL_SECONDS",
                60,
            ),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            kubeconfig_path: env_or("SCENARIO_KUBECONFIG_PATH", "/home/krkn/.kube/config"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        // isolate from the ambient process environment
        let cfg = OperatorConfig {
            operator_name: "krkn-operator".into(),
            namespace: "default".into(),
            heartbeat_interval: Duration::from_secs(30),
            node_enum_addr: "http://node-enumerator:8080".into(),
            scenario_service_account: "krkn-operator-krkn-scenario-runner".into(),
            token_duration: Duration::from_secs(24 * 3600),
            config_request_sweep_age: Duration::from_secs(3600),
            config_request_sweep_interval: Duration::from_secs(60),
            bind_addr: "0.0.0.0:8080".into(),
            kubeconfig_path: "/home/krkn/.kube/config".into(),
        };
        assert_eq!(cfg.operator_name, "krkn-operator");
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(cfg.kubeconfig_path, "/home/krkn/.kube/config");
    }
}
