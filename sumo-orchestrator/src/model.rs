//! Domain-level mirrors of the orchestrator resources, kept
//! free of `k8s-openapi` types so that downstream crates (provisioner,
//! submission, reconciler, storage planner) depend only on this narrow
//! port, never directly on the concrete Kubernetes client.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// The three caps a tenant's quota and limit range are derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSpec {
    pub cpu: i32,
    pub memory_gi: i32,
    pub max_pods: i32,
}

#[derive(Debug, Clone)]
pub struct StorageClassInfo {
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PodInfo {
    pub name: String,
    pub phase: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfigBlobMeta {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// What a volume mount draws from: a config blob (ConfigMap) or the
/// tenant's result volume (PersistentVolumeClaim).
#[derive(Debug, Clone)]
pub enum VolumeSource {
    ConfigBlob(String),
    Pvc(String),
}

#[derive(Debug, Clone)]
pub struct VolumeSpec {
    pub name: String,
    pub source: VolumeSource,
}

#[derive(Debug, Clone)]
pub struct VolumeMountSpec {
    pub volume_name: String,
    pub mount_path: String,
}

#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cpu_request: Option<i32>,
    pub memory_gi_request: Option<i32>,
    pub volume_mounts: Vec<VolumeMountSpec>,
    pub working_dir: Option<String>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cpu_request: None,
            memory_gi_request: None,
            volume_mounts: Vec::new(),
            working_dir: None,
        }
    }
}

/// A one-shot, single-attempt container run (analogous to a
/// Kubernetes `batch/v1 Job`).
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub node_selector: BTreeMap<String, String>,
    pub containers: Vec<ContainerSpec>,
    pub volumes: Vec<VolumeSpec>,
    pub active_deadline_seconds: Option<i64>,
    pub ttl_seconds_after_finished: Option<i32>,
    pub backoff_limit: i32,
    pub restart_policy: String,
}

impl WorkloadSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            node_selector: BTreeMap::new(),
            containers: Vec::new(),
            volumes: Vec::new(),
            active_deadline_seconds: None,
            ttl_seconds_after_finished: None,
            backoff_limit: 0,
            restart_policy: "Never".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkloadStatus {
    pub active: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub start_time: Option<DateTime<Utc>>,
    pub condition_complete_true: bool,
    pub condition_failed_true: bool,
}
