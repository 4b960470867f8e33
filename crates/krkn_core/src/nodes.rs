use serde::Deserialize;
use tokio::time::{timeout, Duration};
use tracing::error;

use crate::errors::{Error, Result, StdError};

const ENUMERATE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct EnumerateNodesResponse {
    nodes: Vec<String>,
}

/// Client for the external data-provider node-enumeration RPC, an
/// opaque remote call `EnumerateNodes(kubeconfig) -> [name]` treated as
/// a collaborator the core does not implement (spec §1, §4.9).
/// Grounded in the teacher's `StorageControllerClient` (reqwest +
/// explicit JSON parsing), with the spec's 10 s hard deadline layered
/// on via `tokio::time::timeout`.
pub struct NodeEnumerationClient {
    base_url: String,
    client: reqwest::Client,
}

impl NodeEnumerationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn enumerate_nodes(&self, base64_kubeconfig: &str) -> Result<Vec<String>> {
        let url = format!("{}/enumerate-nodes", self.base_url);

        let call = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "kubeconfig": base64_kubeconfig }))
            .send();

        let response = timeout(ENUMERATE_TIMEOUT, call)
            .await
            .map_err(|_| Error::internal(StdError::HttpError("node enumeration timed out after 10s".into())))?
            .map_err(|e| {
                error!(error = %e, "node enumeration request failed");
                Error::internal(StdError::HttpError(e.to_string()))
            })?;

        if !response.status().is_success() {
            return Err(Error::internal(StdError::HttpError(format!(
                "node enumeration returned {}",
                response.status()
            ))));
        }

        let parsed: EnumerateNodesResponse = timeout(ENUMERATE_TIMEOUT, response.json())
            .await
            .map_err(|_| Error::internal(StdError::HttpError("node enumeration response timed out".into())))?
            .map_err(|e| Error::internal(StdError::HttpError(e.to_string())))?;

        Ok(parsed.nodes)
    }
}
