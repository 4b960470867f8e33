use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use kube::{Client, ResourceExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::v1::{SecretType, Target as TargetCr, TargetSpec, TargetStatus};
use crate::errors::{Error, Result};
use crate::kubeconfig::KubeconfigCodec;
use crate::store::Store;
use crate::vault::Vault;

/// Caller-supplied credential payload, tagged by `secretType` (spec
/// §4.4 "Credential normalisation").
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "secretType", rename_all = "lowercase")]
pub enum TargetCredential {
    Kubeconfig { base64_kubeconfig: String },
    Token { token: String },
    Credentials { username: String, password: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTargetRequest {
    pub cluster_name: String,
    /// Required for `token`/`credentials` dialects; derived from the
    /// kubeconfig's current context for the `kubeconfig` dialect.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub ca_bundle: Option<String>,
    pub credential: TargetCredential,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    pub uuid: String,
    pub cluster_name: String,
    pub api_url: String,
    pub secret_type: SecretType,
    pub ready: bool,
}

/// Maintains the fleet of remote-cluster records and their associated
/// credential blobs (spec §4.4).
pub struct TargetService {
    store: Store<TargetCr>,
    vault: Vault,
}

impl TargetService {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            store: Store::new(client.clone(), namespace),
            vault: Vault::new(client, namespace),
        }
    }

    pub async fn create(&self, req: CreateTargetRequest) -> Result<String> {
        let (kubeconfig_yaml, api_url, secret_type, insecure_skip_verify) = normalise(&req)?;

        self.reject_if_duplicate(&req.cluster_name, &api_url, None).await?;

        let uuid = Uuid::new_v4().to_string();
        let secret_ref = format!("target-{uuid}-kubeconfig");

        self.vault
            .put_kubeconfig(
                &secret_ref,
                &kubeconfig_yaml,
                BTreeMap::from([("krkn.io/target".to_string(), uuid.clone())]),
            )
            .await?;

        let mut cr = TargetCr::new(
            &uuid,
            TargetSpec {
                cluster_name: req.cluster_name,
                api_url,
                secret_type,
                ca_bundle: req.ca_bundle,
                insecure_skip_verify,
                secret_ref,
            },
        );
        cr.status = Some(TargetStatus {
            ready: true,
            created_at: Some(Utc::now()),
            last_updated: Some(Utc::now()),
        });
        self.store.create(&cr).await?;
        self.store
            .apply_status(
                &uuid,
                json!({
                    "apiVersion": "krkn.io/v1",
                    "kind": "Target",
                    "status": cr.status,
                }),
            )
            .await?;

        Ok(uuid)
    }

    pub async fn list(&self) -> Result<Vec<TargetSummary>> {
        Ok(self.store.list(None).await?.into_iter().map(summarize).collect())
    }

    pub async fn get(&self, uuid: &str) -> Result<TargetSummary> {
        Ok(summarize(self.store.get(uuid).await?))
    }

    pub async fn update(&self, uuid: &str, req: CreateTargetRequest) -> Result<()> {
        let (kubeconfig_yaml, api_url, secret_type, insecure_skip_verify) = normalise(&req)?;
        self.reject_if_duplicate(&req.cluster_name, &api_url, Some(uuid)).await?;

        let existing = self.store.get(uuid).await?;
        // secretRef stays stable; the blob is overwritten in place (spec §4.4 "Update").
        self.vault
            .put_kubeconfig(
                &existing.spec.secret_ref,
                &kubeconfig_yaml,
                BTreeMap::from([("krkn.io/target".to_string(), uuid.to_string())]),
            )
            .await?;

        let spec = TargetSpec {
            cluster_name: req.cluster_name,
            api_url,
            secret_type,
            ca_bundle: req.ca_bundle,
            insecure_skip_verify,
            secret_ref: existing.spec.secret_ref,
        };
        let mut updated = existing;
        updated.spec = spec;
        let status = TargetStatus {
            ready: true,
            created_at: updated.status.as_ref().and_then(|s| s.created_at),
            last_updated: Some(Utc::now()),
        };
        updated.status = Some(status.clone());

        self.store.apply(uuid, &updated).await?;
        self.store
            .apply_status(
                uuid,
                json!({
                    "apiVersion": "krkn.io/v1",
                    "kind": "Target",
                    "status": status,
                }),
            )
            .await?;
        Ok(())
    }

    /// Delete the target record, then best-effort delete the
    /// credential blob (spec §4.4 "Delete").
    pub async fn delete(&self, uuid: &str) -> Result<()> {
        let existing = self.store.get_opt(uuid).await?;
        self.store.delete(uuid).await?;
        if let Some(cr) = existing {
            self.vault.delete(&cr.spec.secret_ref).await?;
        }
        Ok(())
    }

    pub async fn get_kubeconfig(&self, uuid: &str) -> Result<String> {
        let cr = self.store.get(uuid).await?;
        self.vault.get_kubeconfig(&cr.spec.secret_ref).await
    }

    async fn reject_if_duplicate(&self, cluster_name: &str, api_url: &str, except_uuid: Option<&str>) -> Result<()> {
        for existing in self.store.list(None).await? {
            if Some(existing.name_any().as_str()) == except_uuid {
                continue;
            }
            if existing.spec.cluster_name == cluster_name {
                return Err(Error::Conflict(format!("clusterName `{cluster_name}` already in use")));
            }
            if existing.spec.api_url == api_url {
                return Err(Error::Conflict(format!("apiURL `{api_url}` already in use")));
            }
        }
        Ok(())
    }
}

fn summarize(cr: TargetCr) -> TargetSummary {
    let status = cr.status.unwrap_or_default();
    TargetSummary {
        uuid: cr.metadata.name.unwrap_or_default(),
        cluster_name: cr.spec.cluster_name,
        api_url: cr.spec.api_url,
        secret_type: cr.spec.secret_type,
        ready: status.ready,
    }
}

/// Normalise any of the three credential dialects into a kubeconfig
/// document plus the derived `(apiUrl, secretType, insecureSkipVerify)`
/// triple (spec §4.4).
fn normalise(req: &CreateTargetRequest) -> Result<(String, String, SecretType, bool)> {
    match &req.credential {
        TargetCredential::Kubeconfig { base64_kubeconfig } => {
            let decoded = STANDARD
                .decode(base64_kubeconfig)
                .map_err(|e| Error::InvalidValue {
                    field: "kubeconfig".into(),
                    reason: e.to_string(),
                })?;
            let yaml = String::from_utf8(decoded).map_err(|e| Error::InvalidValue {
                field: "kubeconfig".into(),
                reason: e.to_string(),
            })?;
            KubeconfigCodec::validate(&yaml)?;
            let api_url = KubeconfigCodec::extract_api_url(&yaml)?;
            let insecure_skip_verify = req.ca_bundle.as_deref().unwrap_or("").is_empty();
            Ok((yaml, api_url, SecretType::Kubeconfig, insecure_skip_verify))
        }
        TargetCredential::Token { token } => {
            let api_url = req
                .api_url
                .clone()
                .ok_or_else(|| Error::BadRequest("apiURL is required for the token credential dialect".into()))?;
            let yaml = KubeconfigCodec::from_token(&req.cluster_name, &api_url, token, req.ca_bundle.as_deref())?;
            let insecure_skip_verify = req.ca_bundle.as_deref().unwrap_or("").is_empty();
            Ok((yaml, api_url, SecretType::Token, insecure_skip_verify))
        }
        TargetCredential::Credentials { username, password } => {
            let api_url = req
                .api_url
                .clone()
                .ok_or_else(|| Error::BadRequest("apiURL is required for the credentials dialect".into()))?;
            let yaml = KubeconfigCodec::from_credentials(&req.cluster_name, &api_url, username, password, req.ca_bundle.as_deref())?;
            let insecure_skip_verify = req.ca_bundle.as_deref().unwrap_or("").is_empty();
            Ok((yaml, api_url, SecretType::Credentials, insecure_skip_verify))
        }
    }
}
