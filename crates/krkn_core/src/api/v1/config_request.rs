use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single provider's contribution to an aggregation request (spec
/// §3, `ConfigRequest.contributions`).
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct Contribution {
    pub config_document_name: String,
    /// JSON-Schema text, may be empty.
    #[serde(default)]
    pub schema: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
pub enum ConfigRequestPhase {
    #[default]
    Pending,
    Completed,
}

/// `ConfigRequest` is the ephemeral aggregation token described in
/// spec §3; `metadata.name` is the request's opaque uuid.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    group = "krkn.io",
    version = "v1",
    kind = "ConfigRequest",
    namespaced,
    shortname = "configreq"
)]
#[kube(status = "ConfigRequestStatus")]
pub struct ConfigRequestSpec {}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq)]
pub struct ConfigRequestStatus {
    pub phase: ConfigRequestPhase,
    #[serde(default)]
    pub contributions: BTreeMap<String, Contribution>,
}
