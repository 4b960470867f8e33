pub mod config_request;
pub mod provider;
pub mod scenario_run;
pub mod target;
pub mod user;

pub use config_request::*;
pub use provider::*;
pub use scenario_run::*;
pub use target::*;
pub use user::*;

/// Shared `schemars` schema generator for the standard Kubernetes
/// `Condition` list shape, following the teacher's
/// `api::v1::conditions_schema`.
pub fn conditions_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
    serde_json::from_value(serde_json::json!({
        "type": "array",
        "x-kubernetes-list-type": "map",
        "x-kubernetes-list-map-keys": ["type"],
        "items": {
            "type": "object",
            "properties": {
                "lastTransitionTime": { "format": "date-time", "type": "string" },
                "message": { "type": "string" },
                "observedGeneration": { "type": "integer", "format": "int64", "default": 0 },
                "reason": { "type": "string" },
                "status": { "type": "string" },
                "type": { "type": "string" }
            },
            "required": [
                "lastTransitionTime",
                "message",
                "reason",
                "status",
                "type"
            ],
        },
    }))
    .unwrap()
}
