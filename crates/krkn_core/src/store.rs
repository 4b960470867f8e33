use k8s_openapi::Resource;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{Error, Result};

pub const FIELD_MANAGER: &str = "krkn-operator";

/// Typed wrapper around a namespaced `Api<K>`, following the teacher's
/// habit of doing `Api::namespaced(client, ns)` at every call site, but
/// centralised so every CR kind shares get/list/create/update/delete
/// and optimistic-concurrency status patching.
pub struct Store<K> {
    api: Api<K>,
}

impl<K> Store<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + std::fmt::Debug
        + Serialize
        + Send
        + Sync
        + 'static,
    K::DynamicType: Default,
{
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }

    pub async fn get(&self, name: &str) -> Result<K> {
        self.api.get(name).await.map_err(|e| match e {
            kube::Error::Api(ref err) if err.code == 404 => Error::NotFound(name.to_string()),
            e => Error::from(e),
        })
    }

    pub async fn get_opt(&self, name: &str) -> Result<Option<K>> {
        match self.api.get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
            Err(e) => Err(Error::from(e)),
        }
    }

    pub async fn list(&self, label_selector: Option<&str>) -> Result<Vec<K>> {
        let mut lp = ListParams::default();
        if let Some(sel) = label_selector {
            lp = lp.labels(sel);
        }
        Ok(self.api.list(&lp).await.map_err(Error::from)?.items)
    }

    pub async fn create(&self, obj: &K) -> Result<K> {
        self.api.create(&PostParams::default(), obj).await.map_err(|e| match e {
            kube::Error::Api(ref err) if err.code == 409 => Error::Conflict(obj.name_any()),
            e => Error::from(e),
        })
    }

    /// Server-side apply, the teacher's preferred mutation path
    /// (`cluster_controller::reconcile`): force a named field manager so
    /// repeated applies from this operator always win.
    pub async fn apply(&self, name: &str, obj: &K) -> Result<K> {
        let pp = PatchParams::apply(FIELD_MANAGER).force();
        self.api.patch(name, &pp, &Patch::Apply(obj)).await.map_err(Error::from)
    }

    pub async fn apply_status(&self, name: &str, status_json: serde_json::Value) -> Result<K> {
        let pp = PatchParams::apply(FIELD_MANAGER).force();
        self.api
            .patch_status(name, &pp, &Patch::Apply(status_json))
            .await
            .map_err(Error::from)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        match self.api.delete(name, &Default::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }
}

/// All-namespaces variant, used for cross-namespace lookups such as
/// locating a provider by name regardless of where it was created.
pub struct ClusterStore<K> {
    api: Api<K>,
}

impl<K> ClusterStore<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + std::fmt::Debug
        + Send
        + Sync
        + 'static,
    K::DynamicType: Default,
{
    pub fn new(client: Client) -> Self {
        Self { api: Api::all(client) }
    }

    pub async fn list(&self, label_selector: Option<&str>) -> Result<Vec<K>> {
        let mut lp = ListParams::default();
        if let Some(sel) = label_selector {
            lp = lp.labels(sel);
        }
        Ok(self.api.list(&lp).await.map_err(Error::from)?.items)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<K>> {
        Ok(self
            .list(None)
            .await?
            .into_iter()
            .find(|obj| obj.name_any() == name))
    }
}

/// A helper used widely across the kind-specific facades: K's kind
/// string, for building labels and log lines without repeating string
/// literals.
pub fn kind_of<K: Resource>() -> &'static str {
    K::KIND
}
