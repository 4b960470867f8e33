use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use k8s_openapi::api::batch::v1::{Job, JobSpec, JobStatus};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, KeyToPath, LocalObjectReference, Pod, PodSecurityContext, PodSpec,
    PodTemplateSpec, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, DeleteParams, ListParams, PostParams, PropagationPolicy};
use kube::Client;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use crate::api::v1::{
    ClusterJobStatus, FailureReason, JobPhase, RegistryCredential, ScenarioRun as ScenarioRunCr, ScenarioRunPhase,
    ScenarioRunSpec, ScenarioRunStatus,
};
use crate::errors::{Error, Result};
use crate::metrics::Metrics;
use crate::store::Store;
use crate::target::TargetService;
use crate::vault::Vault;

const DEFAULT_MAX_RETRIES: u32 = 2;
const CANCEL_GRACE_SECONDS: i64 = 5;
const SCENARIO_SERVICE_ACCOUNT: &str = "krkn-operator-krkn-scenario-runner";

#[derive(Debug, Clone, Deserialize)]
pub struct CreateScenarioRunRequest {
    pub target_request_id: String,
    #[serde(default)]
    pub cluster_names: Vec<String>,
    #[serde(default)]
    pub scenario_image: String,
    #[serde(default)]
    pub scenario_name: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub files: Vec<crate::api::v1::ScenarioFile>,
    #[serde(default)]
    pub registry_auth: Option<crate::api::v1::RegistryAuth>,
    #[serde(default)]
    pub kubeconfig_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateScenarioRunResponse {
    pub run_name: String,
    pub cluster_names: Vec<String>,
    pub total_targets: usize,
}

/// Fans out one sandboxed workload per target cluster, tracks
/// per-cluster lifecycle, and re-derives aggregate status (spec §4.5).
/// Workloads are modelled as Kubernetes `Job`s: the teacher's
/// controllers only ever manage long-lived Deployments/StatefulSets,
/// so the short-lived-workload shape is enriched from the pack's batch
/// job conventions while keeping the teacher's `Patch`/label/owner-ref
/// idioms.
pub struct ScenarioRunController {
    store: Store<ScenarioRunCr>,
    jobs: Api<Job>,
    pods: Api<Pod>,
    vault: Vault,
    targets: TargetService,
    namespace: String,
    metrics: Metrics,
}

impl ScenarioRunController {
    pub fn new(client: Client, namespace: &str, metrics: Metrics) -> Self {
        Self {
            store: Store::new(client.clone(), namespace),
            jobs: Api::namespaced(client.clone(), namespace),
            pods: Api::namespaced(client.clone(), namespace),
            vault: Vault::new(client.clone(), namespace),
            targets: TargetService::new(client, namespace),
            namespace: namespace.to_string(),
            metrics,
        }
    }

    /// Validate and persist the run request; actual provisioning
    /// happens in `reconcile_cluster` per cluster (spec §4.5 "Creation
    /// contract").
    pub async fn create(&self, req: CreateScenarioRunRequest) -> Result<CreateScenarioRunResponse> {
        if req.target_request_id.trim().is_empty() {
            return Err(Error::BadRequest("targetRequestId must not be empty".into()));
        }
        if req.scenario_image.trim().is_empty() {
            return Err(Error::BadRequest("scenarioImage must not be empty".into()));
        }
        if req.scenario_name.trim().is_empty() {
            return Err(Error::BadRequest("scenarioName must not be empty".into()));
        }
        if req.cluster_names.is_empty() {
            return Err(Error::BadRequest("clusterNames must not be empty".into()));
        }
        if req.cluster_names.iter().any(|c| c.trim().is_empty()) {
            return Err(Error::BadRequest("clusterNames must not contain empty strings".into()));
        }
        let mut seen = std::collections::HashSet::new();
        if !req.cluster_names.iter().all(|c| seen.insert(c.clone())) {
            return Err(Error::BadRequest("clusterNames must not contain duplicates".into()));
        }

        let run_name = format!("{}-{}", req.scenario_name, random_suffix(8));
        let cluster_jobs: Vec<ClusterJobStatus> = req
            .cluster_names
            .iter()
            .map(|c| ClusterJobStatus::new(c, "", DEFAULT_MAX_RETRIES))
            .collect();

        let spec = ScenarioRunSpec {
            target_request_id: req.target_request_id.clone(),
            cluster_names: req.cluster_names.clone(),
            scenario_image: req.scenario_image.clone(),
            scenario_name: req.scenario_name.clone(),
            environment: req.environment.clone(),
            files: req.files.clone(),
            registry_auth: req.registry_auth.clone(),
            kubeconfig_path: req.kubeconfig_path.clone().unwrap_or_else(|| "/home/krkn/.kube/config".to_string()),
        };

        let cr = ScenarioRunCr::new(&run_name, spec);
        self.store.create(&cr).await?;

        let mut status = ScenarioRunStatus {
            cluster_jobs,
            ..Default::default()
        };
        status.recompute();
        self.store
            .apply_status(
                &run_name,
                json!({ "apiVersion": "krkn.io/v1", "kind": "ScenarioRun", "status": status }),
            )
            .await?;

        Ok(CreateScenarioRunResponse {
            run_name,
            cluster_names: req.cluster_names,
            total_targets: seen.len(),
        })
    }

    pub async fn get(&self, run_name: &str) -> Result<ScenarioRunCr> {
        self.store.get(run_name).await
    }

    pub async fn list(&self) -> Result<Vec<ScenarioRunCr>> {
        self.store.list(None).await
    }

    /// Per-cluster reconciliation (spec §4.5 steps 1-4): resolve
    /// credentials, provision artifacts in order, emit the workload,
    /// and stamp initial job state.
    pub async fn reconcile_cluster(&self, run_name: &str, cluster_name: &str) -> Result<()> {
        let _measurer = self.metrics.count_and_measure(run_name);
        let result = self.reconcile_cluster_inner(run_name, cluster_name).await;
        if let Err(e) = &result {
            self.metrics.reconcile_failure(run_name, e);
        }
        result
    }

    async fn reconcile_cluster_inner(&self, run_name: &str, cluster_name: &str) -> Result<()> {
        let run = self.store.get(run_name).await?;

        let kubeconfig_b64 = match self.resolve_kubeconfig(cluster_name).await {
            Ok(b64) => b64,
            Err(_) => {
                self.mark_cluster_failed(run_name, cluster_name, FailureReason::CredentialUnavailable, "target kubeconfig unavailable")
                    .await?;
                return Ok(());
            }
        };

        let job_id = format!("{}-{}", cluster_name, random_suffix(6));
        match self.provision_and_launch(&run, cluster_name, &job_id, &kubeconfig_b64).await {
            Ok(()) => {
                self.update_cluster_job(run_name, cluster_name, |job| {
                    job.job_id = job_id.clone();
                    job.phase = JobPhase::Pending;
                    job.start_time = Some(Utc::now());
                })
                .await
            }
            Err(e) => {
                error!(run = run_name, cluster = cluster_name, error = %e, "provisioning failed, rolling back");
                self.cleanup_job_artifacts(&job_id).await;
                self.mark_cluster_failed(run_name, cluster_name, FailureReason::Transient, &e.to_string())
                    .await
            }
        }
    }

    async fn resolve_kubeconfig(&self, cluster_name: &str) -> Result<String> {
        let targets = self.targets.list().await?;
        let target = targets
            .into_iter()
            .find(|t| t.cluster_name == cluster_name)
            .ok_or_else(|| Error::NotFound(format!("no target registered for cluster `{cluster_name}`")))?;
        let yaml = self.targets.get_kubeconfig(&target.uuid).await?;
        Ok(STANDARD.encode(yaml.as_bytes()))
    }

    /// Provisioning order: kubeconfig doc → files → registry auth →
    /// workload (spec §4.5 step 2, §5 "Ordering guarantees").
    async fn provision_and_launch(&self, run: &ScenarioRunCr, cluster_name: &str, job_id: &str, kubeconfig_b64: &str) -> Result<()> {
        let labels = job_labels(job_id, &run.spec.scenario_name, cluster_name, &run.spec.target_request_id);

        let kubeconfig_doc_name = format!("{job_id}-kubeconfig");
        let decoded = STANDARD
            .decode(kubeconfig_b64)
            .map_err(|e| Error::internal(crate::errors::StdError::DecodingError(e.to_string())))?;
        self.vault.put_blob(&kubeconfig_doc_name, "config", &decoded, labels.clone()).await?;

        for file in &run.spec.files {
            let doc_name = format!("{job_id}-{}", sanitize(&file.name));
            let decoded = STANDARD
                .decode(&file.base64_content)
                .map_err(|e| Error::InvalidValue {
                    field: format!("files.{}", file.name),
                    reason: e.to_string(),
                })?;
            self.vault.put_blob(&doc_name, &file.name, &decoded, labels.clone()).await?;
        }

        let mut image_pull_secret = None;
        if let Some(auth) = &run.spec.registry_auth {
            let auth_name = format!("{job_id}-registry");
            let blob = docker_config_json(auth);
            self.vault.put_blob(&auth_name, ".dockerconfigjson", blob.as_bytes(), labels.clone()).await?;
            image_pull_secret = Some(auth_name);
        }

        let job = build_job_descriptor(run, job_id, &kubeconfig_doc_name, image_pull_secret.as_deref(), &labels, &self.namespace);
        self.jobs.create(&PostParams::default(), &job).await.map_err(Error::from)?;

        Ok(())
    }

    /// Best-effort rollback of artifacts sharing `job_id` (spec §4.5
    /// "Failure semantics").
    async fn cleanup_job_artifacts(&self, job_id: &str) {
        let selector = format!("krkn.io/job-id={job_id}");
        if let Ok(names) = self.vault.list_by_label(&selector).await {
            for name in names {
                let _ = self.vault.delete(&name).await;
            }
        }
        let dp = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };
        match self.jobs.delete(job_id, &dp).await {
            Ok(_) => {}
            Err(kube::Error::Api(err)) if err.code == 404 => {}
            Err(e) => warn!(job_id, error = %e, "rollback job delete failed"),
        }
    }

    async fn mark_cluster_failed(&self, run_name: &str, cluster_name: &str, reason: FailureReason, message: &str) -> Result<()> {
        self.update_cluster_job(run_name, cluster_name, |job| {
            job.phase = JobPhase::Failed;
            job.failure_reason = Some(reason.clone());
            job.message = Some(message.to_string());
            job.completion_time = Some(Utc::now());
        })
        .await
    }

    /// Sync a cluster job's phase from the underlying `Job` object,
    /// applying the retry policy on `Failed` (spec §4.5 steps 4-5).
    pub async fn sync_cluster_job(&self, run_name: &str, cluster_name: &str) -> Result<()> {
        let run = self.store.get(run_name).await?;
        let status = run.status.clone().unwrap_or_default();
        let Some(existing) = status.cluster_jobs.iter().find(|j| j.cluster_name == cluster_name).cloned() else {
            return Ok(());
        };
        if existing.job_id.is_empty() || existing.phase.is_terminal() {
            return Ok(());
        }

        if existing.cancel_requested {
            return self.cancel_cluster_job(run_name, cluster_name, &existing.job_id).await;
        }

        let job = match self.jobs.get(&existing.job_id).await {
            Ok(job) => job,
            Err(kube::Error::Api(err)) if err.code == 404 => return Ok(()),
            Err(e) => return Err(Error::from(e)),
        };

        let (phase, message, failure_reason) = classify_job_phase(job.status.as_ref());
        let pod_name = self.resolve_pod_name(&existing.job_id).await;

        if phase == JobPhase::Failed
            && failure_reason.as_ref().is_some_and(FailureReason::is_retryable)
            && existing.retry_count < existing.max_retries
        {
            self.update_cluster_job(run_name, cluster_name, |j| {
                j.retry_count += 1;
                j.phase = JobPhase::Pending;
                j.message = Some(format!("retry {}/{}: {}", j.retry_count, j.max_retries, message.clone().unwrap_or_default()));
                if pod_name.is_some() {
                    j.pod_name = pod_name.clone();
                }
            })
            .await?;
            self.reconcile_cluster(run_name, cluster_name).await?;
            return Ok(());
        }

        self.update_cluster_job(run_name, cluster_name, |j| {
            j.phase = phase.clone();
            j.message = message.clone();
            if pod_name.is_some() {
                j.pod_name = pod_name.clone();
            }
            if phase.is_terminal() {
                j.completion_time = Some(Utc::now());
            }
            if phase == JobPhase::Failed {
                j.failure_reason = failure_reason.clone();
            }
        })
        .await
    }

    /// Resolve the single pod backing a job, for status display and
    /// log-stream discovery (spec §3 `clusterJobs[i].podName`).
    async fn resolve_pod_name(&self, job_id: &str) -> Option<String> {
        let selector = format!("job-name={job_id}");
        let list = self.pods.list(&ListParams::default().labels(&selector)).await.ok()?;
        list.items.into_iter().next().and_then(|p| p.metadata.name)
    }

    /// `cancelRequested=true` short-circuits retries and deletes the
    /// running workload with a 5s grace (spec §4.5 step 5).
    pub async fn request_cancel(&self, run_name: &str, job_id: &str) -> Result<()> {
        let run = self.store.get(run_name).await?;
        let status = run.status.unwrap_or_default();
        let cluster_name = status
            .cluster_jobs
            .iter()
            .find(|j| j.job_id == job_id)
            .map(|j| j.cluster_name.clone())
            .ok_or_else(|| Error::NotFound(format!("job `{job_id}` not found on run `{run_name}`")))?;

        self.update_cluster_job(run_name, &cluster_name, |j| {
            j.cancel_requested = true;
        })
        .await?;
        self.cancel_cluster_job(run_name, &cluster_name, job_id).await
    }

    async fn cancel_cluster_job(&self, run_name: &str, cluster_name: &str, job_id: &str) -> Result<()> {
        let dp = DeleteParams {
            grace_period_seconds: Some(CANCEL_GRACE_SECONDS as u32),
            propagation_policy: Some(PropagationPolicy::Foreground),
            ..Default::default()
        };
        match self.jobs.delete(job_id, &dp).await {
            Ok(_) => {}
            Err(kube::Error::Api(err)) if err.code == 404 => {}
            Err(e) => warn!(job_id, error = %e, "cancel delete failed"),
        }
        self.update_cluster_job(run_name, cluster_name, |j| {
            j.phase = JobPhase::Failed;
            j.failure_reason = Some(FailureReason::Other("cancelled".into()));
            j.completion_time = Some(Utc::now());
        })
        .await
    }

    /// Mutate one `clusterJobs[i]` entry, re-derive aggregate rollup,
    /// and persist (spec §4.5 step 6).
    async fn update_cluster_job(&self, run_name: &str, cluster_name: &str, f: impl FnOnce(&mut ClusterJobStatus)) -> Result<()> {
        let run = self.store.get(run_name).await?;
        let mut status = run.status.unwrap_or_default();
        let was_terminal = matches!(
            status.phase,
            ScenarioRunPhase::Completed | ScenarioRunPhase::Failed | ScenarioRunPhase::PartiallyFailed
        );
        let Some(job) = status.cluster_jobs.iter_mut().find(|j| j.cluster_name == cluster_name) else {
            return Err(Error::NotFound(format!("cluster `{cluster_name}` not part of run `{run_name}`")));
        };
        f(job);
        status.recompute();
        if !was_terminal {
            match status.phase {
                ScenarioRunPhase::Completed => self.metrics.scenario_run_terminal.with_label_values(&["completed"]).inc(),
                ScenarioRunPhase::Failed => self.metrics.scenario_run_terminal.with_label_values(&["failed"]).inc(),
                ScenarioRunPhase::PartiallyFailed => self.metrics.scenario_run_terminal.with_label_values(&["partially_failed"]).inc(),
                _ => {}
            }
        }

        self.store
            .apply_status(
                run_name,
                json!({ "apiVersion": "krkn.io/v1", "kind": "ScenarioRun", "status": status }),
            )
            .await?;
        Ok(())
    }

    /// Delete a run's workloads (5s grace), config documents, and auth
    /// blobs sharing its jobIds (spec §4.5 "Cleanup").
    pub async fn delete(&self, run_name: &str) -> Result<()> {
        if let Some(run) = self.store.get_opt(run_name).await? {
            let status = run.status.unwrap_or_default();
            for job in &status.cluster_jobs {
                if job.job_id.is_empty() {
                    continue;
                }
                self.cleanup_job_artifacts(&job.job_id).await;
            }
        }
        self.store.delete(run_name).await
    }
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).map(|c| c.to_ascii_lowercase()).collect()
}

fn sanitize(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' }).collect()
}

fn job_labels(job_id: &str, scenario_name: &str, cluster_name: &str, target_request: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), "krkn-scenario".to_string()),
        ("krkn.io/job-id".to_string(), job_id.to_string()),
        ("krkn.io/scenario-name".to_string(), scenario_name.to_string()),
        ("krkn.io/cluster-name".to_string(), cluster_name.to_string()),
        ("krkn.io/target-request".to_string(), target_request.to_string()),
    ])
}

/// Classify a `Job`'s status into a phase, a human message, and (for
/// `Failed`) a `FailureReason` the retry policy can gate on (spec §4.5
/// step 5): a hard deadline is not retryable, anything else observed
/// at the workload level is treated as transient.
fn classify_job_phase(status: Option<&JobStatus>) -> (JobPhase, Option<String>, Option<FailureReason>) {
    let Some(status) = status else {
        return (JobPhase::Pending, None, None);
    };
    if status.succeeded.unwrap_or(0) > 0 {
        return (JobPhase::Succeeded, None, None);
    }
    if status.failed.unwrap_or(0) > 0 {
        let condition = status.conditions.as_ref().and_then(|cs| cs.iter().find(|c| c.type_ == "Failed"));
        let message = condition.and_then(|c| c.message.clone());
        let reason = match condition.and_then(|c| c.reason.as_deref()) {
            Some("DeadlineExceeded") => FailureReason::Other(message.clone().unwrap_or_else(|| "deadline exceeded".to_string())),
            _ => FailureReason::Transient,
        };
        return (JobPhase::Failed, message, Some(reason));
    }
    if status.active.unwrap_or(0) > 0 {
        return (JobPhase::Running, None, None);
    }
    (JobPhase::Unknown, None, None)
}

/// Docker-style registry auth blob, keyed the same way `kubectl create
/// secret docker-registry` would shape it.
fn docker_config_json(auth: &crate::api::v1::RegistryAuth) -> String {
    let auth_value = match &auth.credential {
        RegistryCredential::Token { token } => json!({ "auth": STANDARD.encode(format!(":{token}")) }),
        RegistryCredential::UsernamePassword { username, password } => json!({
            "username": username,
            "password": password,
            "auth": STANDARD.encode(format!("{username}:{password}")),
        }),
    };
    json!({ "auths": { auth.registry_url.clone(): auth_value } }).to_string()
}

/// Build the per-cluster workload descriptor (spec §4.5 step 3).
fn build_job_descriptor(
    run: &ScenarioRunCr,
    job_id: &str,
    kubeconfig_doc_name: &str,
    image_pull_secret: Option<&str>,
    labels: &BTreeMap<String, String>,
    namespace: &str,
) -> Job {
    let mut volumes = vec![
        Volume {
            name: "kubeconfig".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(kubeconfig_doc_name.to_string()),
                items: Some(vec![KeyToPath {
                    key: "config".to_string(),
                    path: "config".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: "tmp".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    ];
    let mut mounts = vec![
        VolumeMount {
            name: "kubeconfig".to_string(),
            mount_path: run.spec.kubeconfig_path.clone(),
            sub_path: Some("config".to_string()),
            ..Default::default()
        },
        VolumeMount {
            name: "tmp".to_string(),
            mount_path: "/tmp".to_string(),
            ..Default::default()
        },
    ];

    for file in &run.spec.files {
        let doc_name = format!("{job_id}-{}", sanitize(&file.name));
        let volume_name = format!("file-{}", sanitize(&file.name));
        volumes.push(Volume {
            name: volume_name.clone(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(doc_name),
                items: Some(vec![KeyToPath {
                    key: file.name.clone(),
                    path: file.name.clone(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: volume_name,
            mount_path: file.mount_path.clone(),
            sub_path: Some(file.name.clone()),
            ..Default::default()
        });
    }

    let env: Vec<EnvVar> = run
        .spec
        .environment
        .iter()
        .map(|(k, v)| EnvVar {
            name: k.clone(),
            value: Some(v.clone()),
            ..Default::default()
        })
        .collect();

    Job {
        metadata: ObjectMeta {
            name: Some(job_id.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(SCENARIO_SERVICE_ACCOUNT.to_string()),
                    restart_policy: Some("Never".to_string()),
                    security_context: Some(PodSecurityContext {
                        run_as_user: Some(1001),
                        run_as_group: Some(1001),
                        fs_group: Some(1001),
                        ..Default::default()
                    }),
                    image_pull_secrets: image_pull_secret.map(|name| {
                        vec![LocalObjectReference {
                            name: Some(name.to_string()),
                        }]
                    }),
                    containers: vec![Container {
                        name: "scenario".to_string(),
                        image: Some(run.spec.scenario_image.clone()),
                        image_pull_policy: Some("Always".to_string()),
                        env: Some(env),
                        volume_mounts: Some(mounts),
                        ..Default::default()
                    }],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            selector: None::<LabelSelector>,
            ..Default::default()
        }),
        status: None,
    }
}
