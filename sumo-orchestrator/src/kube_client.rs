use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, EnvVar, LimitRange, LimitRangeItem, LimitRangeSpec, Namespace,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, Pod, PodSpec,
    PodTemplateSpec, ResourceQuota, ResourceQuotaSpec, ResourceRequirements, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};

use crate::error::{Error, from_kube};
use crate::model::{
    ConfigBlobMeta, ContainerSpec, NodeInfo, PodInfo, QuotaSpec, StorageClassInfo, VolumeSource, VolumeSpec,
    WorkloadSpec, WorkloadStatus,
};
use crate::port::OrchestratorPort;

const FIELD_MANAGER: &str = "sumo-controller";

/// Kubernetes binding of [`OrchestratorPort`]. Initialised with the
/// two-step probe: in-cluster credentials first, then an
/// external kubeconfig. If both fail, `client` stays `None` and every
/// method returns `Error::Unavailable` without attempting a call.
pub struct KubeClientPort {
    client: Option<Client>,
}

impl KubeClientPort {
    pub async fn connect() -> Self {
        match Client::try_default().await {
            Ok(client) => {
                tracing::info!("orchestrator port: connected to cluster");
                Self { client: Some(client) }
            }
            Err(e) => {
                tracing::warn!(error = %e, "orchestrator port: no cluster credentials, entering degraded mode");
                Self { client: None }
            }
        }
    }

    fn client(&self) -> Result<Client, Error> {
        self.client
            .clone()
            .ok_or_else(|| Error::Unavailable("no cluster credentials".to_string()))
    }
}

fn quantity_cpu(cores: i32) -> Quantity {
    Quantity(cores.to_string())
}

fn quantity_mem_gi(gi: i32) -> Quantity {
    Quantity(format!("{gi}Gi"))
}

fn quota_hard(quota: QuotaSpec) -> BTreeMap<String, Quantity> {
    BTreeMap::from([
        ("requests.cpu".to_string(), quantity_cpu(quota.cpu)),
        ("limits.cpu".to_string(), quantity_cpu(quota.cpu)),
        ("requests.memory".to_string(), quantity_mem_gi(quota.memory_gi)),
        ("limits.memory".to_string(), quantity_mem_gi(quota.memory_gi)),
        ("pods".to_string(), Quantity(quota.max_pods.to_string())),
    ])
}

fn quota_drifted(existing: &BTreeMap<String, Quantity>, quota: QuotaSpec) -> bool {
    existing.get("requests.cpu").map(|q| q.0.as_str()) != Some(quota.cpu.to_string().as_str())
        || existing.get("requests.memory").map(|q| q.0.as_str())
            != Some(format!("{}Gi", quota.memory_gi).as_str())
}

fn limit_range_max(existing: &LimitRangeSpec, quota: QuotaSpec) -> bool {
    let Some(item) = existing.limits.first() else {
        return true;
    };
    let max = item.max.as_ref();
    max.and_then(|m| m.get("cpu")).map(|q| q.0.as_str()) != Some(quota.cpu.to_string().as_str())
        || max.and_then(|m| m.get("memory")).map(|q| q.0.as_str())
            != Some(format!("{}Gi", quota.memory_gi).as_str())
}

fn to_resource_requirements(container: &ContainerSpec) -> Option<ResourceRequirements> {
    let (cpu, mem) = (container.cpu_request?, container.memory_gi_request?);
    let mut limits = BTreeMap::new();
    limits.insert("cpu".to_string(), quantity_cpu(cpu));
    limits.insert("memory".to_string(), quantity_mem_gi(mem));
    Some(ResourceRequirements {
        requests: Some(limits.clone()),
        limits: Some(limits),
        claims: None,
    })
}

fn to_k8s_container(container: &ContainerSpec) -> Container {
    Container {
        name: container.name.clone(),
        image: Some(container.image.clone()),
        command: (!container.command.is_empty()).then(|| container.command.clone()),
        args: (!container.args.is_empty()).then(|| container.args.clone()),
        env: (!container.env.is_empty()).then(|| {
            container
                .env
                .iter()
                .map(|(k, v)| EnvVar {
                    name: k.clone(),
                    value: Some(v.clone()),
                    value_from: None,
                })
                .collect()
        }),
        resources: to_resource_requirements(container),
        volume_mounts: (!container.volume_mounts.is_empty()).then(|| {
            container
                .volume_mounts
                .iter()
                .map(|m| VolumeMount {
                    name: m.volume_name.clone(),
                    mount_path: m.mount_path.clone(),
                    ..Default::default()
                })
                .collect()
        }),
        working_dir: container.working_dir.clone(),
        ..Default::default()
    }
}

fn to_k8s_volume(volume: &VolumeSpec) -> Volume {
    match &volume.source {
        VolumeSource::ConfigBlob(name) => Volume {
            name: volume.name.clone(),
            config_map: Some(ConfigMapVolumeSource {
                name: name.clone(),
                ..Default::default()
            }),
            ..Default::default()
        },
        VolumeSource::Pvc(claim_name) => Volume {
            name: volume.name.clone(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim_name.clone(),
                read_only: None,
            }),
            ..Default::default()
        },
    }
}

fn to_k8s_job(spec: WorkloadSpec) -> Job {
    let pod_spec = PodSpec {
        containers: spec.containers.iter().map(to_k8s_container).collect(),
        volumes: (!spec.volumes.is_empty()).then(|| spec.volumes.iter().map(to_k8s_volume).collect()),
        restart_policy: Some(spec.restart_policy.clone()),
        node_selector: (!spec.node_selector.is_empty()).then(|| spec.node_selector.clone()),
        ..Default::default()
    };
    Job {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            labels: (!spec.labels.is_empty()).then(|| spec.labels.clone()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(spec.backoff_limit),
            active_deadline_seconds: spec.active_deadline_seconds,
            ttl_seconds_after_finished: spec.ttl_seconds_after_finished,
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: (!spec.labels.is_empty()).then(|| spec.labels.clone()),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            ..Default::default()
        }),
        status: None,
    }
}

#[async_trait]
impl OrchestratorPort for KubeClientPort {
    fn is_available(&self) -> bool {
        self.client.is_some()
    }

    async fn ensure_namespace(&self, name: &str) -> Result<(), Error> {
        let client = self.client()?;
        let api: Api<Namespace> = Api::all(client);
        match api.get(name).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = from_kube(e);
                if !err.is_not_found() {
                    return Err(err);
                }
                let ns = Namespace {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                };
                api.create(&PostParams::default(), &ns).await.map_err(from_kube)?;
                tracing::info!(namespace = name, "created namespace");
                Ok(())
            }
        }
    }

    async fn apply_resource_quota(&self, namespace: &str, name: &str, quota: QuotaSpec) -> Result<bool, Error> {
        let client = self.client()?;
        let api: Api<ResourceQuota> = Api::namespaced(client, namespace);
        match api.get(name).await {
            Ok(existing) => {
                let hard = existing.spec.and_then(|s| s.hard).unwrap_or_default();
                if !quota_drifted(&hard, quota) {
                    return Ok(false);
                }
                let patch = serde_json::json!({ "spec": { "hard": quota_hard(quota) } });
                api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
                    .await
                    .map_err(from_kube)?;
                tracing::info!(namespace, name, "patched resource quota");
                Ok(true)
            }
            Err(e) => {
                let err = from_kube(e);
                if !err.is_not_found() {
                    return Err(err);
                }
                let obj = ResourceQuota {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        namespace: Some(namespace.to_string()),
                        ..Default::default()
                    },
                    spec: Some(ResourceQuotaSpec {
                        hard: Some(quota_hard(quota)),
                        ..Default::default()
                    }),
                    status: None,
                };
                api.create(&PostParams::default(), &obj).await.map_err(from_kube)?;
                tracing::info!(namespace, name, "created resource quota");
                Ok(true)
            }
        }
    }

    async fn apply_limit_range(&self, namespace: &str, name: &str, quota: QuotaSpec) -> Result<bool, Error> {
        let client = self.client()?;
        let api: Api<LimitRange> = Api::namespaced(client, namespace);
        let item = LimitRangeItem {
            type_: Some("Container".to_string()),
            default: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity("1".to_string())),
                ("memory".to_string(), Quantity("2Gi".to_string())),
            ])),
            default_request: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity("100m".to_string())),
                ("memory".to_string(), Quantity("256Mi".to_string())),
            ])),
            max: Some(BTreeMap::from([
                ("cpu".to_string(), quantity_cpu(quota.cpu)),
                ("memory".to_string(), quantity_mem_gi(quota.memory_gi)),
            ])),
            min: None,
            max_limit_request_ratio: None,
        };
        match api.get(name).await {
            Ok(existing) => {
                let spec = existing.spec.unwrap_or(LimitRangeSpec { limits: vec![] });
                if !limit_range_max(&spec, quota) {
                    return Ok(false);
                }
                let patch = serde_json::json!({ "spec": { "limits": [item] } });
                api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
                    .await
                    .map_err(from_kube)?;
                tracing::info!(namespace, name, "patched limit range");
                Ok(true)
            }
            Err(e) => {
                let err = from_kube(e);
                if !err.is_not_found() {
                    return Err(err);
                }
                let obj = LimitRange {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        namespace: Some(namespace.to_string()),
                        ..Default::default()
                    },
                    spec: Some(LimitRangeSpec { limits: vec![item] }),
                };
                api.create(&PostParams::default(), &obj).await.map_err(from_kube)?;
                tracing::info!(namespace, name, "created limit range");
                Ok(true)
            }
        }
    }

    async fn ensure_pvc(
        &self,
        namespace: &str,
        name: &str,
        size_gi: i32,
        storage_class: Option<&str>,
    ) -> Result<bool, Error> {
        let client = self.client()?;
        let api: Api<PersistentVolumeClaim> = Api::namespaced(client, namespace);
        match api.get(name).await {
            Ok(_) => Ok(false),
            Err(e) => {
                let err = from_kube(e);
                if !err.is_not_found() {
                    return Err(err);
                }
                let obj = PersistentVolumeClaim {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        namespace: Some(namespace.to_string()),
                        ..Default::default()
                    },
                    spec: Some(PersistentVolumeClaimSpec {
                        access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                        resources: Some(VolumeResourceRequirements {
                            requests: Some(BTreeMap::from([(
                                "storage".to_string(),
                                Quantity(format!("{size_gi}Gi")),
                            )])),
                            limits: None,
                        }),
                        storage_class_name: storage_class.map(str::to_string),
                        ..Default::default()
                    }),
                    status: None,
                };
                api.create(&PostParams::default(), &obj).await.map_err(from_kube)?;
                tracing::info!(namespace, name, size_gi, "created result volume");
                Ok(true)
            }
        }
    }

    async fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>, Error> {
        let client = self.client()?;
        let api: Api<StorageClass> = Api::all(client);
        let list = api.list(&ListParams::default()).await.map_err(from_kube)?;
        Ok(list
            .items
            .into_iter()
            .map(|sc| {
                let is_default = sc
                    .metadata
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get("storageclass.kubernetes.io/is-default-class"))
                    .map(|v| v == "true")
                    .unwrap_or(false);
                StorageClassInfo {
                    name: sc.metadata.name.unwrap_or_default(),
                    is_default,
                }
            })
            .collect())
    }

    async fn create_config_blob(
        &self,
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
        data: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let client = self.client()?;
        let api: Api<ConfigMap> = Api::namespaced(client, namespace);
        let obj = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: (!labels.is_empty()).then_some(labels),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        };
        api.create(&PostParams::default(), &obj).await.map_err(from_kube)?;
        Ok(())
    }

    async fn delete_config_blob(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let client = self.client()?;
        let api: Api<ConfigMap> = Api::namespaced(client, namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = from_kube(e);
                if err.is_not_found() { Ok(()) } else { Err(err) }
            }
        }
    }

    async fn list_config_blobs(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<ConfigBlobMeta>, Error> {
        let client = self.client()?;
        let api: Api<ConfigMap> = Api::namespaced(client, namespace);
        let mut lp = ListParams::default();
        if let Some(selector) = label_selector {
            lp = lp.labels(selector);
        }
        let list = api.list(&lp).await.map_err(from_kube)?;
        Ok(list
            .items
            .into_iter()
            .map(|cm| ConfigBlobMeta {
                name: cm.metadata.name.unwrap_or_default(),
                labels: cm.metadata.labels.unwrap_or_default(),
                created_at: cm.metadata.creation_timestamp.map(|t| t.0),
            })
            .collect())
    }

    async fn create_workload(&self, namespace: &str, spec: WorkloadSpec) -> Result<(), Error> {
        let client = self.client()?;
        let api: Api<Job> = Api::namespaced(client, namespace);
        let job = to_k8s_job(spec);
        api.create(&PostParams::default(), &job).await.map_err(from_kube)?;
        Ok(())
    }

    async fn get_workload(&self, namespace: &str, name: &str) -> Result<WorkloadStatus, Error> {
        let client = self.client()?;
        let api: Api<Job> = Api::namespaced(client, namespace);
        let job = api.get(name).await.map_err(from_kube)?;
        let status = job.status.unwrap_or_default();
        let conditions = status.conditions.unwrap_or_default();
        Ok(WorkloadStatus {
            active: status.active.unwrap_or(0),
            succeeded: status.succeeded.unwrap_or(0),
            failed: status.failed.unwrap_or(0),
            start_time: status.start_time.map(|t| t.0),
            condition_complete_true: conditions
                .iter()
                .any(|c| c.type_ == "Complete" && c.status == "True"),
            condition_failed_true: conditions.iter().any(|c| c.type_ == "Failed" && c.status == "True"),
        })
    }

    async fn delete_workload(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let client = self.client()?;
        let api: Api<Job> = Api::namespaced(client, namespace);
        let dp = DeleteParams::background();
        match api.delete(name, &dp).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = from_kube(e);
                if err.is_not_found() { Ok(()) } else { Err(err) }
            }
        }
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<PodInfo>, Error> {
        let client = self.client()?;
        let api: Api<Pod> = Api::namespaced(client, namespace);
        let lp = ListParams::default().labels(label_selector);
        let list = api.list(&lp).await.map_err(from_kube)?;
        Ok(list
            .items
            .into_iter()
            .map(|p| PodInfo {
                name: p.metadata.name.unwrap_or_default(),
                phase: p.status.and_then(|s| s.phase),
            })
            .collect())
    }

    async fn read_pod_log(
        &self,
        namespace: &str,
        pod_name: &str,
        tail_lines: Option<i64>,
    ) -> Result<String, Error> {
        let client = self.client()?;
        let api: Api<Pod> = Api::namespaced(client, namespace);
        let lp = LogParams {
            tail_lines,
            ..Default::default()
        };
        api.logs(pod_name, &lp).await.map_err(from_kube)
    }

    async fn list_non_system_namespaces(&self) -> Result<Vec<String>, Error> {
        let client = self.client()?;
        let api: Api<Namespace> = Api::all(client);
        let list = api.list(&ListParams::default()).await.map_err(from_kube)?;
        Ok(list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .filter(|name| !name.starts_with("kube-"))
            .collect())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, Error> {
        let client = self.client()?;
        let api: Api<k8s_openapi::api::core::v1::Node> = Api::all(client);
        let list = api.list(&ListParams::default()).await.map_err(from_kube)?;
        Ok(list
            .items
            .into_iter()
            .map(|n| {
                let labels = n.metadata.labels.unwrap_or_default();
                let hostname = labels.get("kubernetes.io/hostname").cloned();
                NodeInfo {
                    name: n.metadata.name.unwrap_or_default(),
                    labels,
                    hostname,
                }
            })
            .collect())
    }
}
