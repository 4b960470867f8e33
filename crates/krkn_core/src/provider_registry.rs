use chrono::Utc;
use kube::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::api::v1::{ProviderRegistration, ProviderRegistrationSpec, ProviderRegistrationStatus};
use crate::errors::{Error, Result};
use crate::store::Store;

/// Maintains `ProviderRegistration` records: heartbeating
/// self-registration, listing, and administrative activation toggling
/// (spec §4.1).
pub struct ProviderRegistry {
    store: Store<ProviderRegistration>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProviderSummary {
    pub name: String,
    pub active: bool,
    pub last_heartbeat: Option<chrono::DateTime<Utc>>,
}

impl ProviderRegistry {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            store: Store::new(client, namespace),
        }
    }

    /// Upsert a `ProviderRegistration` with `active=true`, idempotent
    /// under repeated calls with the same name (spec §4.1 "Failure
    /// model").
    pub async fn register(&self, name: &str) -> Result<()> {
        if self.store.get_opt(name).await?.is_none() {
            let cr = ProviderRegistration::new(name, ProviderRegistrationSpec { display_name: None });
            match self.store.create(&cr).await {
                Ok(_) => {}
                Err(Error::Conflict(_)) => {} // lost a create race, fall through to the status stamp
                Err(e) => return Err(e),
            }
        }

        self.store
            .apply_status(
                name,
                json!({
                    "apiVersion": "krkn.io/v1",
                    "kind": "ProviderRegistration",
                    "status": ProviderRegistrationStatus { active: true, last_heartbeat: Some(Utc::now()) },
                }),
            )
            .await?;
        info!(provider = name, "provider registered");
        Ok(())
    }

    /// Stamp `lastHeartbeat` with optimistic-concurrency retry-once
    /// (spec §4.1 "Heartbeat semantics"): refetch and retry on
    /// conflict; repeated failure is logged and left to the next tick.
    pub async fn stamp_heartbeat(&self, name: &str) -> Result<()> {
        let mut last_err = None;
        for attempt in 0..2 {
            let current = match self.store.get(name).await {
                Ok(cr) => cr,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };
            let mut status = current.status.unwrap_or_default();
            status.active = true;
            status.last_heartbeat = Some(Utc::now());

            match self
                .store
                .apply_status(
                    name,
                    json!({
                        "apiVersion": "krkn.io/v1",
                        "kind": "ProviderRegistration",
                        "status": status,
                    }),
                )
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) => {
                    if attempt == 0 {
                        warn!(provider = name, error = %e, "heartbeat conflict, retrying once");
                    }
                    last_err = Some(e);
                }
            }
        }
        let e = last_err.expect("loop runs at least once");
        warn!(provider = name, error = %e, "heartbeat failed after retry, deferring to next tick");
        Err(e)
    }

    pub async fn list(&self) -> Result<Vec<ProviderSummary>> {
        Ok(self
            .store
            .list(None)
            .await?
            .into_iter()
            .map(|cr| {
                let status = cr.status.unwrap_or_default();
                ProviderSummary {
                    name: cr.metadata.name.unwrap_or_default(),
                    active: status.active,
                    last_heartbeat: status.last_heartbeat,
                }
            })
            .collect())
    }

    /// Mutate only `active`; `NotFound` when the record is absent
    /// (spec §4.1).
    pub async fn set_active(&self, name: &str, active: bool) -> Result<()> {
        let current = self.store.get(name).await?;
        let mut status = current.status.unwrap_or_default();
        status.active = active;
        self.store
            .apply_status(
                name,
                json!({
                    "apiVersion": "krkn.io/v1",
                    "kind": "ProviderRegistration",
                    "status": status,
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn count_active(&self) -> Result<(usize, Vec<String>)> {
        let names: Vec<String> = self
            .list()
            .await?
            .into_iter()
            .filter(|p| p.active)
            .map(|p| p.name)
            .collect();
        Ok((names.len(), names))
    }

    /// Graceful-shutdown deactivation: best-effort, tolerates the
    /// record being absent (spec §4.1).
    pub async fn deactivate_on_shutdown(&self, name: &str) {
        if let Err(e) = self.set_active(name, false).await {
            warn!(provider = name, error = %e, "failed to deactivate on shutdown");
        }
    }
}
