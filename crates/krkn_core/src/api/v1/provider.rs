use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Generate the Kubernetes wrapper struct `ProviderRegistration` from
/// our Spec and Status struct, following the teacher's
/// `#[derive(CustomResource)]` convention (`api/v1/neoncluster.rs`).
///
/// One `ProviderRegistration` exists per cooperating operator instance
/// (spec §3); `metadata.name` is the provider's stable, fleet-unique
/// name.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    group = "krkn.io",
    version = "v1",
    kind = "ProviderRegistration",
    namespaced,
    shortname = "provider"
)]
#[kube(status = "ProviderRegistrationStatus")]
pub struct ProviderRegistrationSpec {
    /// Human-readable label, purely informational.
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq)]
pub struct ProviderRegistrationStatus {
    pub active: bool,
    pub last_heartbeat: Option<DateTime<Utc>>,
}
