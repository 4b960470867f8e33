use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SecretType {
    Kubeconfig,
    Token,
    Credentials,
}

/// `Target` is a remote cluster the operator can act on (spec §3).
/// `metadata.name` doubles as the target's uuid.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    group = "krkn.io",
    version = "v1",
    kind = "Target",
    namespaced,
    shortname = "target"
)]
#[kube(status = "TargetStatus")]
#[kube(printcolumn = r#"{"name":"Cluster", "type":"string", "jsonPath":".spec.clusterName"}"#)]
pub struct TargetSpec {
    pub cluster_name: String,
    pub api_url: String,
    pub secret_type: SecretType,
    #[serde(default)]
    pub ca_bundle: Option<String>,
    pub insecure_skip_verify: bool,
    /// Name of the credential-vault `Secret` holding the normalised
    /// kubeconfig document.
    pub secret_ref: String,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq)]
pub struct TargetStatus {
    pub ready: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}
