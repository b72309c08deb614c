//! In-memory stand-in for [`OrchestratorPort`], backing the submission,
//! provisioner and reconciler test suites without a real cluster.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Error;
use crate::model::{
    ConfigBlobMeta, NodeInfo, PodInfo, QuotaSpec, StorageClassInfo, WorkloadSpec, WorkloadStatus,
};
use crate::port::OrchestratorPort;

#[derive(Default)]
struct State {
    namespaces: Vec<String>,
    quotas: BTreeMap<String, QuotaSpec>,
    limit_ranges: BTreeMap<String, QuotaSpec>,
    pvcs: BTreeMap<String, i32>,
    config_blobs: BTreeMap<String, (BTreeMap<String, String>, BTreeMap<String, String>)>,
    workloads: BTreeMap<String, WorkloadStatus>,
    pods: BTreeMap<String, Vec<PodInfo>>,
    pod_logs: BTreeMap<String, String>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Every method succeeds unless `available` is flipped to `false`, at
/// which point it behaves exactly like a real client that lost its
/// credentials mid-run.
pub struct FakeOrchestrator {
    state: Mutex<State>,
    available: Mutex<bool>,
    storage_classes: Mutex<Vec<StorageClassInfo>>,
    nodes: Mutex<Vec<NodeInfo>>,
}

impl Default for FakeOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            available: Mutex::new(true),
            storage_classes: Mutex::new(vec![StorageClassInfo {
                name: "standard".to_string(),
                is_default: true,
            }]),
            nodes: Mutex::new(Vec::new()),
        }
    }

    pub fn set_available(&self, available: bool) {
        *self.available.lock().unwrap() = available;
    }

    pub fn set_storage_classes(&self, classes: Vec<StorageClassInfo>) {
        *self.storage_classes.lock().unwrap() = classes;
    }

    pub fn set_nodes(&self, nodes: Vec<NodeInfo>) {
        *self.nodes.lock().unwrap() = nodes;
    }

    pub fn set_workload_status(&self, namespace: &str, name: &str, status: WorkloadStatus) {
        self.state.lock().unwrap().workloads.insert(key(namespace, name), status);
    }

    pub fn set_pods(&self, namespace: &str, label_selector: &str, pods: Vec<PodInfo>) {
        self.state
            .lock()
            .unwrap()
            .pods
            .insert(key(namespace, label_selector), pods);
    }

    pub fn set_pod_log(&self, namespace: &str, pod_name: &str, log: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .pod_logs
            .insert(key(namespace, pod_name), log.into());
    }

    pub fn config_blob_names(&self, namespace: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .config_blobs
            .keys()
            .filter_map(|k| k.strip_prefix(&format!("{namespace}/")).map(str::to_string))
            .collect()
    }

    fn check_available(&self) -> Result<(), Error> {
        if *self.available.lock().unwrap() {
            Ok(())
        } else {
            Err(Error::Unavailable("fake orchestrator offline".to_string()))
        }
    }
}

#[async_trait]
impl OrchestratorPort for FakeOrchestrator {
    fn is_available(&self) -> bool {
        *self.available.lock().unwrap()
    }

    async fn ensure_namespace(&self, name: &str) -> Result<(), Error> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        if !state.namespaces.iter().any(|n| n == name) {
            state.namespaces.push(name.to_string());
        }
        Ok(())
    }

    async fn apply_resource_quota(&self, namespace: &str, name: &str, quota: QuotaSpec) -> Result<bool, Error> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let k = key(namespace, name);
        let changed = state.quotas.get(&k) != Some(&quota);
        if changed {
            state.quotas.insert(k, quota);
        }
        Ok(changed)
    }

    async fn apply_limit_range(&self, namespace: &str, name: &str, quota: QuotaSpec) -> Result<bool, Error> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let k = key(namespace, name);
        let changed = state.limit_ranges.get(&k) != Some(&quota);
        if changed {
            state.limit_ranges.insert(k, quota);
        }
        Ok(changed)
    }

    async fn ensure_pvc(
        &self,
        namespace: &str,
        name: &str,
        size_gi: i32,
        _storage_class: Option<&str>,
    ) -> Result<bool, Error> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let k = key(namespace, name);
        if state.pvcs.contains_key(&k) {
            return Ok(false);
        }
        state.pvcs.insert(k, size_gi);
        Ok(true)
    }

    async fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>, Error> {
        self.check_available()?;
        Ok(self.storage_classes.lock().unwrap().clone())
    }

    async fn create_config_blob(
        &self,
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
        data: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        self.check_available()?;
        self.state
            .lock()
            .unwrap()
            .config_blobs
            .insert(key(namespace, name), (labels, data));
        Ok(())
    }

    async fn delete_config_blob(&self, namespace: &str, name: &str) -> Result<(), Error> {
        self.check_available()?;
        self.state.lock().unwrap().config_blobs.remove(&key(namespace, name));
        Ok(())
    }

    async fn list_config_blobs(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<ConfigBlobMeta>, Error> {
        self.check_available()?;
        let prefix = format!("{namespace}/");
        let state = self.state.lock().unwrap();
        Ok(state
            .config_blobs
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .filter(|(_, (labels, _))| {
                label_selector.is_none_or(|selector| {
                    selector.split(',').all(|pair| {
                        let mut parts = pair.splitn(2, '=');
                        let (k, v) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
                        labels.get(k).map(|actual| actual == v).unwrap_or(false)
                    })
                })
            })
            .map(|(k, (labels, _))| ConfigBlobMeta {
                name: k.strip_prefix(&prefix).unwrap_or(k).to_string(),
                labels: labels.clone(),
                created_at: None,
            })
            .collect())
    }

    async fn create_workload(&self, namespace: &str, spec: WorkloadSpec) -> Result<(), Error> {
        self.check_available()?;
        self.state
            .lock()
            .unwrap()
            .workloads
            .insert(key(namespace, &spec.name), WorkloadStatus::default());
        Ok(())
    }

    async fn get_workload(&self, namespace: &str, name: &str) -> Result<WorkloadStatus, Error> {
        self.check_available()?;
        self.state
            .lock()
            .unwrap()
            .workloads
            .get(&key(namespace, name))
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn delete_workload(&self, namespace: &str, name: &str) -> Result<(), Error> {
        self.check_available()?;
        self.state.lock().unwrap().workloads.remove(&key(namespace, name));
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<PodInfo>, Error> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .pods
            .get(&key(namespace, label_selector))
            .cloned()
            .unwrap_or_default())
    }

    async fn read_pod_log(
        &self,
        namespace: &str,
        pod_name: &str,
        _tail_lines: Option<i64>,
    ) -> Result<String, Error> {
        self.check_available()?;
        self.state
            .lock()
            .unwrap()
            .pod_logs
            .get(&key(namespace, pod_name))
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn list_non_system_namespaces(&self) -> Result<Vec<String>, Error> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .namespaces
            .iter()
            .filter(|n| !n.starts_with("kube-"))
            .cloned()
            .collect())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, Error> {
        self.check_available()?;
        Ok(self.nodes.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_namespace_idempotent() {
        let fake = FakeOrchestrator::new();
        fake.ensure_namespace("tenant-a").await.unwrap();
        fake.ensure_namespace("tenant-a").await.unwrap();
        assert_eq!(fake.state.lock().unwrap().namespaces.len(), 1);
    }

    #[tokio::test]
    async fn quota_write_only_on_change() {
        let fake = FakeOrchestrator::new();
        let quota = QuotaSpec {
            cpu: 4,
            memory_gi: 8,
            max_pods: 10,
        };
        assert!(fake.apply_resource_quota("tenant-a", "tenant-a-quota", quota).await.unwrap());
        assert!(!fake.apply_resource_quota("tenant-a", "tenant-a-quota", quota).await.unwrap());
        let drifted = QuotaSpec { cpu: 8, ..quota };
        assert!(fake.apply_resource_quota("tenant-a", "tenant-a-quota", drifted).await.unwrap());
    }

    #[tokio::test]
    async fn unavailable_short_circuits_every_call() {
        let fake = FakeOrchestrator::new();
        fake.set_available(false);
        assert!(!fake.is_available());
        let err = fake.ensure_namespace("tenant-a").await.unwrap_err();
        assert_eq!(err.kind(), sumo_types::ErrorKind::OrchestratorUnavailable);
    }

    #[tokio::test]
    async fn config_blob_label_selector_filters() {
        let fake = FakeOrchestrator::new();
        fake.create_config_blob(
            "tenant-a",
            "sumo-abc-chunk0",
            BTreeMap::from([("job".to_string(), "abc".to_string())]),
            BTreeMap::new(),
        )
        .await
        .unwrap();
        fake.create_config_blob(
            "tenant-a",
            "sumo-def-chunk0",
            BTreeMap::from([("job".to_string(), "def".to_string())]),
            BTreeMap::new(),
        )
        .await
        .unwrap();
        let matched = fake.list_config_blobs("tenant-a", Some("job=abc")).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "sumo-abc-chunk0");
    }
}
