use std::collections::BTreeMap;

use kube::Client;
use tracing::warn;

use crate::config_orchestrator::ConfigOrchestrator;
use crate::configdoc::ConfigDocumentStore;
use crate::errors::{Error, Result};
use crate::metrics::Metrics;
use crate::schema::{merge_path, Schema};

/// Validates submitted flat dot-notation values against a provider's
/// contributed schema and merges them into that provider's nested
/// configuration document (spec §4.3).
pub struct ValueSubmission {
    orchestrator: ConfigOrchestrator,
    documents: ConfigDocumentStore,
    metrics: Metrics,
}

pub struct SubmissionOutcome {
    pub updated_fields: Vec<String>,
}

impl ValueSubmission {
    pub fn new(client: Client, namespace: &str, metrics: Metrics) -> Self {
        Self {
            orchestrator: ConfigOrchestrator::new(client.clone(), namespace, metrics.clone()),
            documents: ConfigDocumentStore::new(client, namespace),
            metrics,
        }
    }

    pub async fn submit(&self, uuid: &str, provider_name: &str, values: &BTreeMap<String, String>) -> Result<SubmissionOutcome> {
        let contributions = self.orchestrator.contributions(uuid).await?;
        let contribution = contributions
            .get(provider_name)
            .ok_or_else(|| Error::NotFound(format!("provider `{provider_name}` has no contribution on request `{uuid}`")))?;

        let schema = Schema::parse(&contribution.schema)?;

        // All validations precede any document write (spec §4.3 "Ordering").
        for (key, value) in values {
            if let Err(e) = schema.validate_path(key, value) {
                self.metrics.value_submission_rejections.with_label_values(&[e.metric_label().as_str()]).inc();
                return Err(e);
            }
        }

        let mut doc = self
            .documents
            .get(&contribution.config_document_name)
            .await?
            .unwrap_or(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));

        let mut updated_fields = Vec::with_capacity(values.len());
        for (key, value) in values {
            let leaf_type = schema.leaf_type(key);
            merge_path(&mut doc, key, value, leaf_type.as_deref());
            updated_fields.push(key.clone());
        }

        self.documents.put(&contribution.config_document_name, &doc).await?;

        if let Err(e) = self.orchestrator.delete(uuid).await {
            warn!(request = uuid, error = %e, "request delete failed after successful submission");
        }

        Ok(SubmissionOutcome { updated_fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_reports_only_successfully_merged_fields() {
        let outcome = SubmissionOutcome {
            updated_fields: vec!["api.port".into(), "api.enabled".into()],
        };
        assert_eq!(outcome.updated_fields.len(), 2);
    }
}
