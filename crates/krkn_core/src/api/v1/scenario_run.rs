use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct ScenarioFile {
    pub name: String,
    pub base64_content: String,
    pub mount_path: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryCredential {
    Token { token: String },
    UsernamePassword { username: String, password: String },
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct RegistryAuth {
    pub registry_url: String,
    pub scenario_repository: String,
    pub credential: RegistryCredential,
}

fn default_kubeconfig_path() -> String {
    "/home/krkn/.kube/config".to_string()
}

/// `ScenarioRun` is a fan-out request materialising one sandboxed
/// workload per named target cluster (spec §3).
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    group = "krkn.io",
    version = "v1",
    kind = "ScenarioRun",
    namespaced,
    shortname = "run"
)]
#[kube(status = "ScenarioRunStatus")]
pub struct ScenarioRunSpec {
    /// Legacy linkage to a target inventory request.
    pub target_request_id: String,
    pub cluster_names: Vec<String>,
    pub scenario_image: String,
    pub scenario_name: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub files: Vec<ScenarioFile>,
    #[serde(default)]
    pub registry_auth: Option<RegistryAuth>,
    #[serde(default = "default_kubeconfig_path")]
    pub kubeconfig_path: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
pub enum JobPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub enum FailureReason {
    Transient,
    CredentialUnavailable,
    Other(String),
}

impl FailureReason {
    /// Failure reasons eligible for the controller's retry policy
    /// (spec §4.5 step 5).
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureReason::Transient | FailureReason::CredentialUnavailable)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct ClusterJobStatus {
    pub cluster_name: String,
    pub job_id: String,
    #[serde(default)]
    pub pod_name: Option<String>,
    pub phase: JobPhase,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(default)]
    pub cancel_requested: bool,
    #[serde(default)]
    pub failure_reason: Option<FailureReason>,
}

impl ClusterJobStatus {
    pub fn new(cluster_name: impl Into<String>, job_id: impl Into<String>, max_retries: u32) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            job_id: job_id.into(),
            pod_name: None,
            phase: JobPhase::Pending,
            message: None,
            start_time: None,
            completion_time: None,
            retry_count: 0,
            max_retries,
            cancel_requested: false,
            failure_reason: None,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
pub enum ScenarioRunPhase {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    PartiallyFailed,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct ScenarioRunStatus {
    #[serde(default)]
    pub cluster_jobs: Vec<ClusterJobStatus>,
    pub total_targets: usize,
    pub successful_jobs: usize,
    pub failed_jobs: usize,
    pub running_jobs: usize,
    pub phase: ScenarioRunPhase,
}

impl ScenarioRunStatus {
    /// Re-derive counters and overall phase from `cluster_jobs`
    /// (spec §4.5 step 6).
    pub fn recompute(&mut self) {
        let total = self.cluster_jobs.len();
        let succeeded = self
            .cluster_jobs
            .iter()
            .filter(|j| j.phase == JobPhase::Succeeded)
            .count();
        let failed = self
            .cluster_jobs
            .iter()
            .filter(|j| j.phase == JobPhase::Failed)
            .count();
        let running = self
            .cluster_jobs
            .iter()
            .filter(|j| j.phase == JobPhase::Running)
            .count();

        self.total_targets = total;
        self.successful_jobs = succeeded;
        self.failed_jobs = failed;
        self.running_jobs = running;

        let all_terminal = total > 0 && self.cluster_jobs.iter().all(|j| j.phase.is_terminal());
        self.phase = if !all_terminal {
            ScenarioRunPhase::Running
        } else if failed == 0 {
            ScenarioRunPhase::Completed
        } else if succeeded == 0 {
            ScenarioRunPhase::Failed
        } else {
            ScenarioRunPhase::PartiallyFailed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(phase: JobPhase) -> ClusterJobStatus {
        ClusterJobStatus {
            phase,
            ..ClusterJobStatus::new("c", "job-1", 3)
        }
    }

    #[test]
    fn recompute_partially_failed() {
        let mut status = ScenarioRunStatus {
            cluster_jobs: vec![
                job(JobPhase::Succeeded),
                job(JobPhase::Failed),
                job(JobPhase::Succeeded),
            ],
            ..Default::default()
        };
        status.recompute();
        assert_eq!(status.phase, ScenarioRunPhase::PartiallyFailed);
        assert_eq!(status.successful_jobs, 2);
        assert_eq!(status.failed_jobs, 1);
        assert_eq!(status.total_targets, 3);
    }

    #[test]
    fn recompute_running_while_any_pending() {
        let mut status = ScenarioRunStatus {
            cluster_jobs: vec![job(JobPhase::Succeeded), job(JobPhase::Pending)],
            ..Default::default()
        };
        status.recompute();
        assert_eq!(status.phase, ScenarioRunPhase::Running);
    }

    #[test]
    fn recompute_all_failed() {
        let mut status = ScenarioRunStatus {
            cluster_jobs: vec![job(JobPhase::Failed), job(JobPhase::Failed)],
            ..Default::default()
        };
        status.recompute();
        assert_eq!(status.phase, ScenarioRunPhase::Failed);
    }

    #[test]
    fn recompute_all_succeeded() {
        let mut status = ScenarioRunStatus {
            cluster_jobs: vec![job(JobPhase::Succeeded), job(JobPhase::Succeeded)],
            ..Default::default()
        };
        status.recompute();
        assert_eq!(status.phase, ScenarioRunPhase::Completed);
    }
}
