//! Chooses where a job's results land (the tenant's result volume or an
//! object store), and emits the side-workloads that copy results out to
//! the object store and then reclaim the volume copy.
//!
//! The controller process never calls an object-store SDK itself: `detect`
//! and `location_for` are pure decisions, and `start_upload`/`cleanup_volume`
//! only generate shell scripts that run inside the cluster, reading
//! credentials from this process's own environment at emission time.

mod error;

use std::collections::BTreeMap;

use sumo_orchestrator::{ContainerSpec, OrchestratorPort, VolumeMountSpec, VolumeSource, VolumeSpec, WorkloadSpec};
use sumo_types::{StorageBackend, StorageLocation, short_id};
use uuid::Uuid;

pub use error::Error;

const S3_PREFIX: &str = "sumo-k8-results";
const GCS_PREFIX: &str = "results";
const AZURE_PREFIX: &str = "results";

/// Operator-provided object-store configuration, read once at startup from
/// environment variables (§6) and threaded into every planner call.
#[derive(Debug, Clone, Default)]
pub struct PlannerConfig {
    /// `RESULT_STORAGE_TYPE`, when not `auto`.
    pub pinned: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub gcs_bucket: Option<String>,
    pub azure_storage_account: Option<String>,
    pub azure_container: Option<String>,
}

fn result_pvc_name(namespace: &str) -> String {
    format!("results-{namespace}")
}

/// Inspects the orchestrator's node list for a single cluster-identifying
/// label or hostname substring. Matches one of `{gke, eks, ec2, aks, azure}`
/// and falls back to `volume` for anything else, an absent node list, an
/// unconfigured bucket/account for the detected provider, or any
/// orchestrator error — all of which mirror the original's behaviour of
/// defaulting to local storage rather than failing detection outright.
///
/// Only the first node is consulted: in a heterogeneous cluster this is
/// non-deterministic by design (§9); operators who need a guaranteed
/// answer pin `RESULT_STORAGE_TYPE` instead of relying on detection.
pub async fn detect(port: &dyn OrchestratorPort, cfg: &PlannerConfig) -> StorageBackend {
    if let Some(pinned) = cfg.pinned {
        return pinned;
    }

    let nodes = match port.list_nodes().await {
        Ok(nodes) => nodes,
        Err(e) => {
            tracing::warn!(error = %e, "error detecting storage type, defaulting to volume");
            return StorageBackend::Volume;
        }
    };

    for node in &nodes {
        let hostname = node.hostname.clone().unwrap_or_default().to_lowercase();
        let label_keys_lower: Vec<String> = node.labels.keys().map(|k| k.to_lowercase()).collect();

        if hostname.contains("gke") || label_keys_lower.iter().any(|k| k.contains("gke")) {
            return if cfg.gcs_bucket.is_some() { StorageBackend::Gcs } else { StorageBackend::Volume };
        }
        if hostname.contains("eks") || hostname.contains("ec2") {
            return if cfg.s3_bucket.is_some() { StorageBackend::S3 } else { StorageBackend::Volume };
        }
        if hostname.contains("aks") || label_keys_lower.iter().any(|k| k.contains("azure")) {
            return if cfg.azure_storage_account.is_some() && cfg.azure_container.is_some() {
                StorageBackend::Azure
            } else {
                StorageBackend::Volume
            };
        }
    }

    StorageBackend::Volume
}

/// Resolves a job's result location handle for the given backend. Does not
/// itself consult the orchestrator — the backend is decided by `detect`
/// and passed in.
pub fn location_for(job_id: &Uuid, tenant_id: &str, namespace: &str, backend: StorageBackend, cfg: &PlannerConfig) -> StorageLocation {
    match backend {
        StorageBackend::Volume => StorageLocation {
            backend,
            location: format!("/results/{job_id}"),
            pvc_name: Some(result_pvc_name(namespace)),
            bucket_or_account: None,
        },
        StorageBackend::S3 => StorageLocation {
            backend,
            location: format!("{S3_PREFIX}/{tenant_id}/{job_id}/"),
            pvc_name: None,
            bucket_or_account: cfg.s3_bucket.clone(),
        },
        StorageBackend::Gcs => StorageLocation {
            backend,
            location: format!("{GCS_PREFIX}/{tenant_id}/{job_id}/"),
            pvc_name: None,
            bucket_or_account: cfg.gcs_bucket.clone(),
        },
        StorageBackend::Azure => StorageLocation {
            backend,
            location: format!("{AZURE_PREFIX}/{tenant_id}/{job_id}/"),
            pvc_name: None,
            bucket_or_account: cfg.azure_storage_account.clone(),
        },
    }
}

fn upload_script(backend: StorageBackend, tenant_id: &str, job_id: &Uuid, cfg: &PlannerConfig) -> String {
    let results_dir = format!("/results/{job_id}");
    match backend {
        StorageBackend::S3 => {
            let bucket = cfg.s3_bucket.clone().unwrap_or_default();
            let region = cfg.s3_region.clone();
            let prefix = format!("{S3_PREFIX}/{tenant_id}/{job_id}/");
            format!(
                r#"#!/bin/sh
set -e
echo "Installing boto3..."
pip install -q boto3
echo "Uploading results from PVC to S3..."
python3 <<EOF
import boto3
from pathlib import Path

s3 = boto3.client('s3', region_name='{region}')
bucket = '{bucket}'
prefix = '{prefix}'
results_dir = Path('{results_dir}')

if not results_dir.exists():
    print(f"Results directory not found: {{results_dir}}")
    exit(1)

uploaded = []
for file_path in results_dir.rglob('*'):
    if file_path.is_file():
        rel_path = file_path.relative_to(results_dir)
        s3_key = f"{{prefix}}{{rel_path}}"
        s3.upload_file(str(file_path), bucket, s3_key)
        uploaded.append(str(rel_path))
        print(f"Uploaded {{rel_path}}")

print(f"Uploaded {{len(uploaded)}} files")
EOF
"#
            )
        }
        StorageBackend::Gcs => {
            let bucket = cfg.gcs_bucket.clone().unwrap_or_default();
            let prefix = format!("{GCS_PREFIX}/{tenant_id}/{job_id}/");
            format!(
                r#"#!/bin/sh
set -e
echo "Installing google-cloud-storage..."
pip install -q google-cloud-storage
echo "Uploading results from PVC to GCS..."
python3 <<EOF
from google.cloud import storage
from pathlib import Path

client = storage.Client()
bucket = client.bucket('{bucket}')
prefix = '{prefix}'
results_dir = Path('{results_dir}')

if not results_dir.exists():
    print(f"Results directory not found: {{results_dir}}")
    exit(1)

uploaded = []
for file_path in results_dir.rglob('*'):
    if file_path.is_file():
        rel_path = file_path.relative_to(results_dir)
        blob = bucket.blob(f"{{prefix}}{{rel_path}}")
        blob.upload_from_filename(str(file_path))
        uploaded.append(str(rel_path))
        print(f"Uploaded {{rel_path}}")

print(f"Uploaded {{len(uploaded)}} files")
EOF
"#
            )
        }
        StorageBackend::Azure => {
            let account = cfg.azure_storage_account.clone().unwrap_or_default();
            let container = cfg.azure_container.clone().unwrap_or_default();
            let prefix = format!("{AZURE_PREFIX}/{tenant_id}/{job_id}/");
            format!(
                r#"#!/bin/sh
set -e
echo "Installing azure-storage-blob..."
pip install -q azure-storage-blob
echo "Uploading results from PVC to Azure..."
python3 <<EOF
from azure.storage.blob import BlobServiceClient
from pathlib import Path
import os

conn_str = os.getenv('AZURE_STORAGE_CONNECTION_STRING')
if not conn_str:
    print("AZURE_STORAGE_CONNECTION_STRING not set")
    exit(1)

blob_service = BlobServiceClient.from_connection_string(conn_str)
container_client = blob_service.get_container_client('{container}')
prefix = '{prefix}'
results_dir = Path('{results_dir}')

if not results_dir.exists():
    print(f"Results directory not found: {{results_dir}}")
    exit(1)

uploaded = []
for file_path in results_dir.rglob('*'):
    if file_path.is_file():
        rel_path = file_path.relative_to(results_dir)
        blob_name = f"{{prefix}}{{rel_path}}"
        with open(file_path, 'rb') as data:
            container_client.upload_blob(name=blob_name, data=data, overwrite=True)
        uploaded.append(str(rel_path))
        print(f"Uploaded {{rel_path}} to {account}/{container}")

print(f"Uploaded {{len(uploaded)}} files")
EOF
"#
            )
        }
        StorageBackend::Volume => String::new(),
    }
}

fn credential_env(backend: StorageBackend) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    let mut carry = |key: &str| {
        if let Ok(value) = std::env::var(key) {
            if !value.is_empty() {
                env.insert(key.to_string(), value);
            }
        }
    };
    match backend {
        StorageBackend::S3 => {
            carry("AWS_ACCESS_KEY_ID");
            carry("AWS_SECRET_ACCESS_KEY");
            carry("AWS_SESSION_TOKEN");
        }
        StorageBackend::Gcs => {
            carry("GOOGLE_APPLICATION_CREDENTIALS");
            carry("GCS_SERVICE_ACCOUNT_KEY");
        }
        StorageBackend::Azure => {
            carry("AZURE_STORAGE_CONNECTION_STRING");
        }
        StorageBackend::Volume => {}
    }
    env
}

/// Emits the upload side-workload for a completed job: writes the upload
/// script into a sibling config blob, then a single-shot workload that
/// mounts the tenant's result volume and the script and runs it.
pub async fn start_upload(
    port: &dyn OrchestratorPort,
    namespace: &str,
    tenant_id: &str,
    job_id: &Uuid,
    backend: StorageBackend,
    cfg: &PlannerConfig,
) -> Result<(), Error> {
    let sid = short_id(job_id);
    let script_blob_name = format!("upload-script-{sid}");
    let mut data = BTreeMap::new();
    data.insert("upload.sh".to_string(), upload_script(backend, tenant_id, job_id, cfg));
    port.create_config_blob(namespace, &script_blob_name, BTreeMap::new(), data).await?;

    let container = ContainerSpec {
        name: "uploader".to_string(),
        image: "python:3.11-slim".to_string(),
        command: vec!["/bin/sh".to_string(), "/config/upload.sh".to_string()],
        env: credential_env(backend),
        volume_mounts: vec![
            VolumeMountSpec { volume_name: "results".to_string(), mount_path: "/results".to_string() },
            VolumeMountSpec { volume_name: "upload-script".to_string(), mount_path: "/config".to_string() },
        ],
        ..ContainerSpec::new("uploader", "python:3.11-slim")
    };

    let mut labels = BTreeMap::new();
    labels.insert("job-id".to_string(), job_id.to_string());
    labels.insert("type".to_string(), "upload".to_string());

    let spec = WorkloadSpec {
        labels,
        containers: vec![container],
        volumes: vec![
            VolumeSpec { name: "results".to_string(), source: VolumeSource::Pvc(result_pvc_name(namespace)) },
            VolumeSpec { name: "upload-script".to_string(), source: VolumeSource::ConfigBlob(script_blob_name) },
        ],
        ttl_seconds_after_finished: Some(60),
        ..WorkloadSpec::new(format!("upload-{sid}"))
    };

    port.create_workload(namespace, spec).await?;
    Ok(())
}

/// Emits the volume-cleanup side-workload. Callers must only invoke this
/// after confirming the matching upload side-workload succeeded (§5
/// ordering guarantee); the planner itself does not check that here.
pub async fn cleanup_volume(port: &dyn OrchestratorPort, namespace: &str, job_id: &Uuid) -> Result<(), Error> {
    let sid = short_id(job_id);
    let script_blob_name = format!("cleanup-script-{sid}");
    let script = format!(
        r#"#!/bin/sh
set -e
echo "Cleaning up results from PVC for job {job_id}..."
if [ -d /results/{job_id} ]; then
    rm -rf /results/{job_id}
    echo "Deleted /results/{job_id} from PVC"
else
    echo "Results directory /results/{job_id} not found, nothing to clean"
fi
"#
    );
    let mut data = BTreeMap::new();
    data.insert("cleanup.sh".to_string(), script);
    port.create_config_blob(namespace, &script_blob_name, BTreeMap::new(), data).await?;

    let container = ContainerSpec {
        volume_mounts: vec![
            VolumeMountSpec { volume_name: "results".to_string(), mount_path: "/results".to_string() },
            VolumeMountSpec { volume_name: "cleanup-script".to_string(), mount_path: "/config".to_string() },
        ],
        command: vec!["/bin/sh".to_string(), "/config/cleanup.sh".to_string()],
        ..ContainerSpec::new("cleanup", "busybox:latest")
    };

    let mut labels = BTreeMap::new();
    labels.insert("job-id".to_string(), job_id.to_string());
    labels.insert("type".to_string(), "cleanup".to_string());

    let spec = WorkloadSpec {
        labels,
        containers: vec![container],
        volumes: vec![
            VolumeSpec { name: "results".to_string(), source: VolumeSource::Pvc(result_pvc_name(namespace)) },
            VolumeSpec { name: "cleanup-script".to_string(), source: VolumeSource::ConfigBlob(script_blob_name) },
        ],
        ttl_seconds_after_finished: Some(60),
        ..WorkloadSpec::new(format!("cleanup-{sid}"))
    };

    port.create_workload(namespace, spec).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap as Map;

    use sumo_orchestrator::{NodeInfo, fake::FakeOrchestrator};

    use super::*;

    #[tokio::test]
    async fn pinned_backend_skips_node_inspection() {
        let port = FakeOrchestrator::new();
        let cfg = PlannerConfig { pinned: Some(StorageBackend::S3), ..Default::default() };
        assert_eq!(detect(&port, &cfg).await, StorageBackend::S3);
    }

    #[tokio::test]
    async fn gke_node_without_bucket_falls_back_to_volume() {
        let port = FakeOrchestrator::new();
        port.set_nodes(vec![NodeInfo { name: "n1".to_string(), labels: Map::new(), hostname: Some("gke-pool-1".to_string()) }]);
        let cfg = PlannerConfig::default();
        assert_eq!(detect(&port, &cfg).await, StorageBackend::Volume);
    }

    #[tokio::test]
    async fn gke_node_with_bucket_selects_gcs() {
        let port = FakeOrchestrator::new();
        port.set_nodes(vec![NodeInfo { name: "n1".to_string(), labels: Map::new(), hostname: Some("gke-pool-1".to_string()) }]);
        let cfg = PlannerConfig { gcs_bucket: Some("my-bucket".to_string()), ..Default::default() };
        assert_eq!(detect(&port, &cfg).await, StorageBackend::Gcs);
    }

    #[tokio::test]
    async fn no_nodes_defaults_to_volume() {
        let port = FakeOrchestrator::new();
        let cfg = PlannerConfig::default();
        assert_eq!(detect(&port, &cfg).await, StorageBackend::Volume);
    }

    #[test]
    fn volume_location_is_the_mounted_path() {
        let job_id = Uuid::new_v4();
        let loc = location_for(&job_id, "acme", "acme", StorageBackend::Volume, &PlannerConfig::default());
        assert_eq!(loc.location, format!("/results/{job_id}"));
        assert!(loc.pvc_name.is_some());
    }

    #[test]
    fn s3_location_uses_the_dedicated_prefix() {
        let job_id = Uuid::new_v4();
        let cfg = PlannerConfig { s3_bucket: Some("b".to_string()), ..Default::default() };
        let loc = location_for(&job_id, "acme", "acme", StorageBackend::S3, &cfg);
        assert!(loc.location.starts_with("sumo-k8-results/acme/"));
    }

    #[tokio::test]
    async fn upload_then_cleanup_both_create_their_workloads() {
        let port = FakeOrchestrator::new();
        let job_id = Uuid::new_v4();
        let cfg = PlannerConfig { s3_bucket: Some("b".to_string()), ..Default::default() };
        start_upload(&port, "acme", "acme", &job_id, StorageBackend::S3, &cfg).await.unwrap();
        let sid = short_id(&job_id);
        port.get_workload("acme", &format!("upload-{sid}")).await.unwrap();
        cleanup_volume(&port, "acme", &job_id).await.unwrap();
        port.get_workload("acme", &format!("cleanup-{sid}")).await.unwrap();
    }
}
