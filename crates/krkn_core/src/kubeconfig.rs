use base64::{engine::general_purpose::STANDARD, Engine as _};
use kube::config::{
    AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext, NamedExtension,
};

use crate::errors::{Error, Result, StdError};

/// Codec around `kube::config::Kubeconfig`, reused rather than
/// hand-rolling a YAML string builder (spec §4.4, "Credential
/// normalisation").
pub struct KubeconfigCodec;

impl KubeconfigCodec {
    /// Build a single cluster/user/context kubeconfig named after
    /// `cluster_name`, authenticating with a bearer token.
    pub fn from_token(cluster_name: &str, api_url: &str, token: &str, ca_bundle: Option<&str>) -> Result<String> {
        let cluster = Self::cluster(api_url, ca_bundle);
        let auth_info = AuthInfo {
            token: Some(token.to_string().into()),
            ..Default::default()
        };
        Self::assemble(cluster_name, cluster, auth_info)
    }

    /// Build a single cluster/user/context kubeconfig authenticating
    /// with a username/password pair.
    pub fn from_credentials(cluster_name: &str, api_url: &str, username: &str, password: &str, ca_bundle: Option<&str>) -> Result<String> {
        let cluster = Self::cluster(api_url, ca_bundle);
        let auth_info = AuthInfo {
            username: Some(username.to_string()),
            password: Some(password.to_string().into()),
            ..Default::default()
        };
        Self::assemble(cluster_name, cluster, auth_info)
    }

    fn cluster(api_url: &str, ca_bundle: Option<&str>) -> Cluster {
        Cluster {
            server: Some(api_url.to_string()),
            insecure_skip_tls_verify: Some(ca_bundle.is_none()),
            certificate_authority_data: ca_bundle.map(|ca| STANDARD.encode(ca.as_bytes())),
            extensions: None::<Vec<NamedExtension>>,
            proxy_url: None,
            certificate_authority: None,
            tls_server_name: None,
        }
    }

    fn assemble(cluster_name: &str, cluster: Cluster, auth_info: AuthInfo) -> Result<String> {
        let kubeconfig = Kubeconfig {
            clusters: vec![NamedCluster {
                name: cluster_name.to_string(),
                cluster: Some(cluster),
            }],
            auth_infos: vec![NamedAuthInfo {
                name: cluster_name.to_string(),
                auth_info: Some(auth_info),
            }],
            contexts: vec![NamedContext {
                name: cluster_name.to_string(),
                context: Some(Context {
                    cluster: cluster_name.to_string(),
                    user: cluster_name.to_string(),
                    namespace: None,
                    extensions: None,
                }),
            }],
            current_context: Some(cluster_name.to_string()),
            ..Default::default()
        };

        serde_yaml::to_string(&kubeconfig).map_err(|e| Error::internal(StdError::YamlSerializationError(e)))
    }

    /// Validate a document contains at least one cluster, one auth
    /// info, one context, and a resolvable current-context (spec §8,
    /// round-trip laws).
    pub fn validate(kubeconfig_yaml: &str) -> Result<()> {
        let _ = Self::parse(kubeconfig_yaml)?;
        Ok(())
    }

    fn parse(kubeconfig_yaml: &str) -> Result<Kubeconfig> {
        let kubeconfig: Kubeconfig = serde_yaml::from_str(kubeconfig_yaml)
            .map_err(|e| Error::internal(StdError::YamlSerializationError(e)))?;

        if kubeconfig.clusters.is_empty() {
            return Err(Error::InvalidValue {
                field: "kubeconfig".into(),
                reason: "no clusters defined".into(),
            });
        }
        if kubeconfig.auth_infos.is_empty() {
            return Err(Error::InvalidValue {
                field: "kubeconfig".into(),
                reason: "no users defined".into(),
            });
        }
        if kubeconfig.contexts.is_empty() {
            return Err(Error::InvalidValue {
                field: "kubeconfig".into(),
                reason: "no contexts defined".into(),
            });
        }
        let current = kubeconfig.current_context.as_deref().ok_or_else(|| Error::InvalidValue {
            field: "kubeconfig".into(),
            reason: "current-context not set".into(),
        })?;
        kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == current)
            .ok_or_else(|| Error::InvalidValue {
                field: "kubeconfig".into(),
                reason: format!("current-context `{current}` not found among contexts"),
            })?;

        Ok(kubeconfig)
    }

    /// Extract the API URL from the current context's cluster (spec
    /// §4.4, kubeconfig-dialect credential normalisation).
    pub fn extract_api_url(kubeconfig_yaml: &str) -> Result<String> {
        let kubeconfig = Self::parse(kubeconfig_yaml)?;
        let current = kubeconfig.current_context.as_deref().expect("validated above");
        let context = kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == current)
            .and_then(|c| c.context.as_ref())
            .ok_or_else(|| Error::InvalidValue {
                field: "kubeconfig".into(),
                reason: "current context has no body".into(),
            })?;

        let cluster = kubeconfig
            .clusters
            .iter()
            .find(|c| c.name == context.cluster)
            .and_then(|c| c.cluster.as_ref())
            .ok_or_else(|| Error::InvalidValue {
                field: "kubeconfig".into(),
                reason: format!("cluster `{}` referenced by context not found", context.cluster),
            })?;

        cluster.server.clone().ok_or_else(|| Error::InvalidValue {
            field: "kubeconfig".into(),
            reason: "cluster has no server URL".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrips_and_extracts_api_url() {
        let doc = KubeconfigCodec::from_token("c1", "https://c1.example.com:6443", "tok-abc", None).unwrap();
        KubeconfigCodec::validate(&doc).unwrap();
        assert_eq!(KubeconfigCodec::extract_api_url(&doc).unwrap(), "https://c1.example.com:6443");
    }

    #[test]
    fn credentials_roundtrip_with_ca_bundle() {
        let doc = KubeconfigCodec::from_credentials(
            "c2",
            "https://c2.example.com:6443",
            "alice",
            "hunter2",
            Some("-----BEGIN CERTIFICATE-----\nabc\n-----END CERTIFICATE-----\n"),
        )
        .unwrap();
        KubeconfigCodec::validate(&doc).unwrap();
        assert_eq!(KubeconfigCodec::extract_api_url(&doc).unwrap(), "https://c2.example.com:6443");
    }

    #[test]
    fn rejects_document_with_no_clusters() {
        let bad = "apiVersion: v1\nkind: Config\nclusters: []\nusers: []\ncontexts: []\n";
        assert!(KubeconfigCodec::validate(bad).is_err());
    }
}
