use std::collections::BTreeMap;

use chrono::Utc;
use kube::{Client, ResourceExt};
use serde_json::json;
use tokio::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::v1::{ConfigRequest, ConfigRequestPhase, ConfigRequestSpec, ConfigRequestStatus, Contribution};
use crate::errors::{Error, Result};
use crate::metrics::Metrics;
use crate::provider_registry::ProviderRegistry;
use crate::store::Store;

/// Two-state view returned to a polling client (spec §4.2,
/// `GetRequest`; REDESIGN FLAGS fixes the empty-body pending case).
pub enum RequestView {
    Pending,
    Completed {
        contributions: BTreeMap<String, Contribution>,
    },
}

/// Coordinates the asynchronous contribution of configuration schemas
/// from every active provider into one short-lived aggregation record
/// (spec §4.2).
pub struct ConfigOrchestrator {
    store: Store<ConfigRequest>,
    registry: ProviderRegistry,
    metrics: Metrics,
}

impl ConfigOrchestrator {
    pub fn new(client: Client, namespace: &str, metrics: Metrics) -> Self {
        Self {
            store: Store::new(client.clone(), namespace),
            registry: ProviderRegistry::new(client, namespace),
            metrics,
        }
    }

    /// Allocate a fresh uuid and create a `Pending` `ConfigRequest`.
    pub async fn create_request(&self) -> Result<String> {
        let uuid = Uuid::new_v4().to_string();
        let cr = ConfigRequest::new(&uuid, ConfigRequestSpec {});
        self.store.create(&cr).await?;
        self.store
            .apply_status(
                &uuid,
                json!({
                    "apiVersion": "krkn.io/v1",
                    "kind": "ConfigRequest",
                    "status": ConfigRequestStatus { phase: ConfigRequestPhase::Pending, contributions: BTreeMap::new() },
                }),
            )
            .await?;
        // Zero active providers completes immediately on first evaluation (spec §8).
        self.maybe_complete(&uuid).await?;
        Ok(uuid)
    }

    pub async fn get_request(&self, uuid: &str) -> Result<RequestView> {
        let cr = self.store.get(uuid).await?;
        let status = cr.status.unwrap_or_default();
        match status.phase {
            ConfigRequestPhase::Pending => Ok(RequestView::Pending),
            ConfigRequestPhase::Completed => Ok(RequestView::Completed {
                contributions: status.contributions,
            }),
        }
    }

    /// Internal accessor used by value submission: contributions are
    /// readable regardless of `phase` even though the client-facing
    /// `GetRequest` view hides them while `Pending` (spec §4.3 step 2
    /// vs §4.2 `GetRequest`).
    pub async fn contributions(&self, uuid: &str) -> Result<BTreeMap<String, Contribution>> {
        let cr = self.store.get(uuid).await?;
        Ok(cr.status.unwrap_or_default().contributions)
    }

    /// Record one provider's contribution; idempotent re-contributions
    /// are no-ops that never roll back an already-`Completed` status
    /// (spec §4.2).
    pub async fn contribute(&self, uuid: &str, provider_name: &str, config_document_name: &str, schema: &str) -> Result<()> {
        if !schema.trim().is_empty() {
            serde_json::from_str::<serde_json::Value>(schema)
                .map_err(|_| Error::BadRequest(format!("contributed schema for `{provider_name}` is not valid JSON")))?;
        }

        let cr = self.store.get(uuid).await?;
        let mut status = cr.status.unwrap_or_default();

        if status.contributions.contains_key(provider_name) {
            info!(request = uuid, provider = provider_name, "duplicate contribution, no-op");
            return Ok(());
        }

        status.contributions.insert(
            provider_name.to_string(),
            Contribution {
                config_document_name: config_document_name.to_string(),
                schema: schema.to_string(),
            },
        );

        self.store
            .apply_status(
                uuid,
                json!({
                    "apiVersion": "krkn.io/v1",
                    "kind": "ConfigRequest",
                    "status": status,
                }),
            )
            .await?;

        self.maybe_complete(uuid).await
    }

    /// Completion rule: `keys(contributions) ⊇ {active providers}`,
    /// evaluated at contribute/sweep time (spec §4.2).
    async fn maybe_complete(&self, uuid: &str) -> Result<()> {
        let cr = self.store.get(uuid).await?;
        let mut status = cr.status.unwrap_or_default();
        if matches!(status.phase, ConfigRequestPhase::Completed) {
            return Ok(());
        }

        let (_, active_names) = self.registry.count_active().await?;
        let satisfied = active_names.iter().all(|name| status.contributions.contains_key(name));

        if satisfied {
            status.phase = ConfigRequestPhase::Completed;
            self.store
                .apply_status(
                    uuid,
                    json!({
                        "apiVersion": "krkn.io/v1",
                        "kind": "ConfigRequest",
                        "status": status,
                    }),
                )
                .await?;
            self.metrics.config_requests_completed.inc();
        }
        Ok(())
    }

    /// Delete a request, e.g. after a successful value submission
    /// (§4.3) consumes it.
    pub async fn delete(&self, uuid: &str) -> Result<()> {
        self.store.delete(uuid).await
    }

    /// Age-based sweep, independent of client activity, defensive
    /// against abandoned requests (spec §4.2 "Cleanup").
    pub async fn sweep(&self, max_age: Duration) -> Result<usize> {
        let now = Utc::now();
        let mut swept = 0;
        for cr in self.store.list(None).await? {
            let created = match cr.metadata.creation_timestamp.as_ref() {
                Some(ts) => ts.0,
                None => continue,
            };
            let age = now.signed_duration_since(created);
            if age.to_std().unwrap_or_default() > max_age {
                let name = cr.name_any();
                if let Err(e) = self.store.delete(&name).await {
                    warn!(request = name, error = %e, "sweep delete failed");
                } else {
                    swept += 1;
                }
            }
        }
        Ok(swept)
    }
}
