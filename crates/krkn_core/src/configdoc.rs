use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::Client;

use crate::errors::{Error, Result};

const CONFIG_KEY: &str = "config.yaml";

/// `ProviderConfigDocument` storage: a free-form nested YAML mapping
/// owned by one provider, stored as text under `config.yaml` in a
/// `ConfigMap` (spec §3, §6 "Configuration document encoding").
pub struct ConfigDocumentStore {
    config_maps: Api<ConfigMap>,
}

impl ConfigDocumentStore {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            config_maps: Api::namespaced(client, namespace),
        }
    }

    pub async fn get(&self, name: &str) -> Result<Option<serde_yaml::Value>> {
        match self.config_maps.get(name).await {
            Ok(cm) => {
                let text = cm.data.and_then(|d| d.get(CONFIG_KEY).cloned()).unwrap_or_default();
                if text.trim().is_empty() {
                    Ok(Some(serde_yaml::Value::Mapping(serde_yaml::Mapping::new())))
                } else {
                    Ok(Some(serde_yaml::from_str(&text)?))
                }
            }
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
            Err(e) => Err(Error::from(e)),
        }
    }

    pub async fn put(&self, name: &str, doc: &serde_yaml::Value) -> Result<()> {
        let text = serde_yaml::to_string(doc)?;
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(CONFIG_KEY.to_string(), text)])),
            ..Default::default()
        };

        match self.config_maps.get(name).await {
            Ok(_) => {
                self.config_maps
                    .replace(name, &PostParams::default(), &cm)
                    .await
                    .map_err(Error::from)?;
            }
            Err(kube::Error::Api(err)) if err.code == 404 => {
                self.config_maps.create(&PostParams::default(), &cm).await.map_err(Error::from)?;
            }
            Err(e) => return Err(Error::from(e)),
        }
        Ok(())
    }
}
