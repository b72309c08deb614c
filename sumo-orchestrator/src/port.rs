use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Error;
use crate::model::{ConfigBlobMeta, NodeInfo, PodInfo, QuotaSpec, StorageClassInfo, WorkloadSpec, WorkloadStatus};

/// Thin typed facade over the cluster API. A real client
/// (`KubeClientPort`) and an in-memory fake (`fake::FakeOrchestrator`)
/// satisfy the same trait, which is the seam the reconciler, provisioner
/// and submission pipeline are tested against.
#[async_trait]
pub trait OrchestratorPort: Send + Sync {
    /// `false` once the two-step credential probe has failed; every other
    /// method then returns `Error::Unavailable` rather than hanging.
    fn is_available(&self) -> bool;

    async fn ensure_namespace(&self, name: &str) -> Result<(), Error>;

    /// Creates the resource quota if absent, or patches it in place if its
    /// CPU/memory/pod caps have drifted from `quota` (string comparison).
    /// Returns whether a write occurred.
    async fn apply_resource_quota(&self, namespace: &str, name: &str, quota: QuotaSpec) -> Result<bool, Error>;

    async fn apply_limit_range(&self, namespace: &str, name: &str, quota: QuotaSpec) -> Result<bool, Error>;

    /// Creates a single-RWO PVC sized `size_gi` if absent. No-op if present
    /// (PVC size/class are immutable post-creation in this design).
    async fn ensure_pvc(
        &self,
        namespace: &str,
        name: &str,
        size_gi: i32,
        storage_class: Option<&str>,
    ) -> Result<bool, Error>;

    async fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>, Error>;

    async fn create_config_blob(
        &self,
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
        data: BTreeMap<String, String>,
    ) -> Result<(), Error>;

    async fn delete_config_blob(&self, namespace: &str, name: &str) -> Result<(), Error>;

    async fn list_config_blobs(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<ConfigBlobMeta>, Error>;

    async fn create_workload(&self, namespace: &str, spec: WorkloadSpec) -> Result<(), Error>;

    async fn get_workload(&self, namespace: &str, name: &str) -> Result<WorkloadStatus, Error>;

    async fn delete_workload(&self, namespace: &str, name: &str) -> Result<(), Error>;

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<PodInfo>, Error>;

    /// `tail_lines = None` reads the full, untailed log.
    async fn read_pod_log(
        &self,
        namespace: &str,
        pod_name: &str,
        tail_lines: Option<i64>,
    ) -> Result<String, Error>;

    /// All namespace names except `kube-`-prefixed system namespaces
    /// (the reconciler's orphan sweep runs over these).
    async fn list_non_system_namespaces(&self) -> Result<Vec<String>, Error>;

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, Error>;
}
