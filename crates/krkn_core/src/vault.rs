use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, ResourceExt};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result, StdError};

/// The JSON envelope stored under the `kubeconfig` key of a credential
/// `Secret`, following the teacher's pattern of stashing structured
/// blobs as base64 text inside `Secret.data` (`util::jwt_keys`).
#[derive(Debug, Serialize, Deserialize)]
struct KubeconfigEnvelope {
    kubeconfig: String,
}

/// Opaque byte-blob store layered over Kubernetes `Secret`s. Every
/// target's normalised kubeconfig, every scenario-run's per-job
/// config/auth blob, and the JWT signing secret all live here.
pub struct Vault {
    secrets: Api<Secret>,
}

impl Vault {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            secrets: Api::namespaced(client, namespace),
        }
    }

    /// Store a kubeconfig document under `name`, enveloped per spec §6.
    pub async fn put_kubeconfig(&self, name: &str, kubeconfig_yaml: &str, labels: BTreeMap<String, String>) -> Result<()> {
        let envelope = KubeconfigEnvelope {
            kubeconfig: STANDARD.encode(kubeconfig_yaml.as_bytes()),
        };
        let envelope_json =
            serde_json::to_vec(&envelope).map_err(|e| Error::internal(StdError::JsonSerializationError(e)))?;

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("kubeconfig".to_string(), ByteString(envelope_json))])),
            ..Default::default()
        };

        match self.secrets.get(name).await {
            Ok(_) => {
                self.secrets
                    .replace(name, &PostParams::default(), &secret)
                    .await
                    .map_err(Error::from)?;
            }
            Err(kube::Error::Api(err)) if err.code == 404 => {
                self.secrets.create(&PostParams::default(), &secret).await.map_err(Error::from)?;
            }
            Err(e) => return Err(Error::from(e)),
        }
        Ok(())
    }

    pub async fn get_kubeconfig(&self, name: &str) -> Result<String> {
        let secret = self.secrets.get(name).await.map_err(|e| match e {
            kube::Error::Api(ref err) if err.code == 404 => Error::NotFound(name.to_string()),
            e => Error::from(e),
        })?;

        let data = secret
            .data
            .ok_or_else(|| Error::internal(StdError::MetadataMissing(format!("secret {name} has no data"))))?;

        let raw = data
            .get("kubeconfig")
            .ok_or_else(|| Error::internal(StdError::MetadataMissing(format!("secret {name} missing kubeconfig key"))))?;

        let envelope: KubeconfigEnvelope =
            serde_json::from_slice(&raw.0).map_err(|e| Error::internal(StdError::JsonSerializationError(e)))?;

        let decoded = STANDARD
            .decode(envelope.kubeconfig)
            .map_err(|e| Error::internal(StdError::DecodingError(e.to_string())))?;

        String::from_utf8(decoded).map_err(|e| Error::internal(StdError::DecodingError(e.to_string())))
    }

    /// Best-effort delete: absence is not an error (spec §4.4, §8).
    pub async fn delete(&self, name: &str) -> Result<()> {
        match self.secrets.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
            Err(e) => {
                tracing::warn!(secret = name, error = %e, "best-effort vault delete failed");
                Ok(())
            }
        }
    }

    /// Store an arbitrary raw blob (decoded file contents, docker-style
    /// registry auth) under `key`, used by the scenario-run controller's
    /// per-job config documents.
    pub async fn put_blob(&self, name: &str, key: &str, contents: &[u8], labels: BTreeMap<String, String>) -> Result<()> {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(key.to_string(), ByteString(contents.to_vec()))])),
            ..Default::default()
        };

        match self.secrets.get(name).await {
            Ok(_) => {
                self.secrets
                    .replace(name, &PostParams::default(), &secret)
                    .await
                    .map_err(Error::from)?;
            }
            Err(kube::Error::Api(err)) if err.code == 404 => {
                self.secrets.create(&PostParams::default(), &secret).await.map_err(Error::from)?;
            }
            Err(e) => return Err(Error::from(e)),
        }
        Ok(())
    }

    /// Read back a raw blob stored via `put_blob`.
    pub async fn get_blob(&self, name: &str, key: &str) -> Result<Vec<u8>> {
        let secret = self.secrets.get(name).await.map_err(|e| match e {
            kube::Error::Api(ref err) if err.code == 404 => Error::NotFound(name.to_string()),
            e => Error::from(e),
        })?;
        let data = secret
            .data
            .ok_or_else(|| Error::internal(StdError::MetadataMissing(format!("secret {name} has no data"))))?;
        let raw = data
            .get(key)
            .ok_or_else(|| Error::internal(StdError::MetadataMissing(format!("secret {name} missing {key} key"))))?;
        Ok(raw.0.clone())
    }

    pub async fn list_by_label(&self, selector: &str) -> Result<Vec<String>> {
        let list = self
            .secrets
            .list(&kube::api::ListParams::default().labels(selector))
            .await
            .map_err(Error::from)?;
        Ok(list.items.into_iter().map(|s| s.name_any()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrips_through_base64_and_json() {
        let envelope = KubeconfigEnvelope {
            kubeconfig: STANDARD.encode(b"apiVersion: v1\nkind: Config\n"),
        };
        let raw = serde_json::to_vec(&envelope).unwrap();
        let decoded: KubeconfigEnvelope = serde_json::from_slice(&raw).unwrap();
        let kubeconfig = STANDARD.decode(decoded.kubeconfig).unwrap();
        assert_eq!(kubeconfig, b"apiVersion: v1\nkind: Config\n");
    }
}
