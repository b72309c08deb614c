//! The submission pipeline: validates an incoming job request, persists a
//! `PENDING` row, ensures the tenant's namespace is provisioned, and
//! materialises the payload into the cluster as a workload. The row is
//! always inserted before the workload is emitted (see `lib.rs` for why).

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use sumo_orchestrator::{ContainerSpec, OrchestratorPort, VolumeMountSpec, VolumeSource, VolumeSpec, WorkloadSpec};
use sumo_types::{Job, JobStatus, Tenant, short_id};
use uuid::Uuid;

use crate::error::Error;

/// Shards larger than this many base64 bytes are split across multiple
/// config blobs, leaving margin below the cluster's ~1 MiB per-object cap.
pub const SHARD_THRESHOLD_BYTES: usize = 900_000;

pub struct SubmissionRequest {
    pub tenant: Tenant,
    pub scenario_id: String,
    pub cpu_request: i32,
    pub memory_gi: i32,
    pub zip_bytes: Vec<u8>,
    pub config_file: String,
    pub max_job_duration_hours: i64,
    pub result_volume_size_gi: i32,
}

pub fn validate_resource_request(cpu_request: i32, memory_gi: i32, tenant: &Tenant) -> Result<(), Error> {
    if cpu_request <= 0 || cpu_request > tenant.max_cpu {
        return Err(Error::InvalidInput(format!(
            "CPU request ({cpu_request}) must be between 1 and {}",
            tenant.max_cpu
        )));
    }
    if memory_gi <= 0 || memory_gi > tenant.max_memory_gi {
        return Err(Error::InvalidInput(format!(
            "Memory request ({memory_gi}Gi) must be between 1 and {}Gi",
            tenant.max_memory_gi
        )));
    }
    Ok(())
}

fn reassembly_script(num_chunks: usize, job_id: &Uuid) -> String {
    let last = num_chunks - 1;
    format!(
        r#"#!/bin/sh
set -e
echo "Setting up workspace..."
mkdir -p /workspace
cd /workspace

echo "Reassembling SUMO files from {num_chunks} chunks..."
for i in $(seq 0 {last}); do
    cat /config/chunk$i/chunk >> sumo_files.zip.b64
done
base64 -d sumo_files.zip.b64 > sumo_files.zip
rm sumo_files.zip.b64

if ! command -v unzip >/dev/null 2>&1; then
    echo "Installing unzip..."
    apt-get update -qq && apt-get install -y -qq unzip >/dev/null 2>&1 || apk add --no-cache unzip >/dev/null 2>&1 || yum install -y -q unzip >/dev/null 2>&1
fi

unzip -q sumo_files.zip
rm sumo_files.zip

echo "Finding SUMO config file..."
CONFIG_FILE=$(find . -name "*.sumocfg" | head -1)
if [ -z "$CONFIG_FILE" ]; then
    echo "Error: No .sumocfg file found"
    find . -type f | head -10
    exit 1
fi

echo "Running SUMO simulation: sumo -c $CONFIG_FILE"
sumo -c "$CONFIG_FILE" || exit 1

echo "Simulation completed successfully"
ls -lah

if [ -d /results ]; then
    echo "Copying results to persistent storage..."
    mkdir -p /results/{job_id}
    cp -r /workspace/*.xml /workspace/*.txt /workspace/*.log /results/{job_id}/ 2>/dev/null || true
    echo "Results saved to /results/{job_id}/"
    ls -lah /results/{job_id}/ || true
fi
"#
    )
}

fn single_blob_script(job_id: &Uuid) -> String {
    format!(
        r#"#!/bin/sh
set -e
echo "Setting up workspace..."
mkdir -p /workspace
cd /workspace

echo "Extracting SUMO files from ConfigMap..."
cat /config/sumo_files.zip.b64 | base64 -d > sumo_files.zip

if ! command -v unzip >/dev/null 2>&1; then
    echo "Installing unzip..."
    apt-get update -qq && apt-get install -y -qq unzip >/dev/null 2>&1 || apk add --no-cache unzip >/dev/null 2>&1 || yum install -y -q unzip >/dev/null 2>&1
fi

unzip -q sumo_files.zip
rm sumo_files.zip

echo "Finding SUMO config file..."
CONFIG_FILE=$(find . -name "*.sumocfg" | head -1)
if [ -z "$CONFIG_FILE" ]; then
    echo "Error: No .sumocfg file found"
    find . -type f | head -10
    exit 1
fi

echo "Running SUMO simulation: sumo -c $CONFIG_FILE"
sumo -c "$CONFIG_FILE" || exit 1

echo "Simulation completed successfully"
ls -lah

if [ -d /results ]; then
    echo "Copying results to persistent storage..."
    mkdir -p /results/{job_id}
    cp -r /workspace/*.xml /workspace/*.txt /workspace/*.log /results/{job_id}/ 2>/dev/null || true
    echo "Results saved to /results/{job_id}/"
    ls -lah /results/{job_id}/ || true
fi
"#
    )
}

/// Creates the config blob(s) holding the base64-encoded payload, rolling
/// back every already-created shard if a later one fails. Returns the run
/// script plus the volumes/mounts the caller should attach to the container.
async fn materialise_payload(
    port: &dyn OrchestratorPort,
    namespace: &str,
    job_id: &Uuid,
    zip_bytes: &[u8],
) -> Result<(String, Vec<VolumeSpec>, Vec<VolumeMountSpec>), Error> {
    let zip_b64 = BASE64.encode(zip_bytes);
    let sid = short_id(job_id);

    if zip_b64.len() > SHARD_THRESHOLD_BYTES {
        let num_chunks = zip_b64.len().div_ceil(SHARD_THRESHOLD_BYTES);
        let mut created = Vec::with_capacity(num_chunks);
        for i in 0..num_chunks {
            let start = i * SHARD_THRESHOLD_BYTES;
            let end = ((i + 1) * SHARD_THRESHOLD_BYTES).min(zip_b64.len());
            let chunk_name = format!("sumo-{sid}-chunk{i}");
            let mut data = BTreeMap::new();
            data.insert("chunk".to_string(), zip_b64[start..end].to_string());
            let mut labels = BTreeMap::new();
            labels.insert("job-id".to_string(), job_id.to_string());
            labels.insert("cleanup".to_string(), "true".to_string());

            if let Err(e) = port.create_config_blob(namespace, &chunk_name, labels, data).await {
                for done in &created {
                    let _ = port.delete_config_blob(namespace, done).await;
                }
                return Err(Error::Orchestrator(e));
            }
            created.push(chunk_name);
        }

        let mut volumes = Vec::with_capacity(num_chunks);
        let mut mounts = Vec::with_capacity(num_chunks);
        for (i, chunk_name) in created.iter().enumerate() {
            let vol_name = format!("sumo-chunk-{i}");
            volumes.push(VolumeSpec {
                name: vol_name.clone(),
                source: VolumeSource::ConfigBlob(chunk_name.clone()),
            });
            mounts.push(VolumeMountSpec {
                volume_name: vol_name,
                mount_path: format!("/config/chunk{i}"),
            });
        }
        Ok((reassembly_script(num_chunks, job_id), volumes, mounts))
    } else {
        let blob_name = format!("sumo-{sid}");
        let mut data = BTreeMap::new();
        data.insert("sumo_files.zip.b64".to_string(), zip_b64);
        let mut labels = BTreeMap::new();
        labels.insert("job-id".to_string(), job_id.to_string());
        labels.insert("cleanup".to_string(), "true".to_string());
        port.create_config_blob(namespace, &blob_name, labels, data)
            .await
            .map_err(Error::Orchestrator)?;

        let volumes = vec![VolumeSpec {
            name: "sumo-files".to_string(),
            source: VolumeSource::ConfigBlob(blob_name),
        }];
        let mounts = vec![VolumeMountSpec {
            volume_name: "sumo-files".to_string(),
            mount_path: "/config".to_string(),
        }];
        Ok((single_blob_script(job_id), volumes, mounts))
    }
}

/// Emits the job's workload: materialises the payload, attaches the
/// tenant's result volume, and submits a single-attempt container run
/// pinned to the simulation node class.
pub async fn emit_workload(
    port: &dyn OrchestratorPort,
    req: &SubmissionRequest,
    job_id: &Uuid,
    workload_name: &str,
    result_pvc_name: &str,
) -> Result<(), Error> {
    let namespace = &req.tenant.namespace;
    let (run_script, mut volumes, mut mounts) =
        materialise_payload(port, namespace, job_id, &req.zip_bytes).await?;

    volumes.push(VolumeSpec {
        name: "results".to_string(),
        source: VolumeSource::Pvc(result_pvc_name.to_string()),
    });
    mounts.push(VolumeMountSpec {
        volume_name: "results".to_string(),
        mount_path: "/results".to_string(),
    });

    let mut env = BTreeMap::new();
    env.insert("SCENARIO_ID".to_string(), req.scenario_id.clone());

    let container = ContainerSpec {
        name: "sumo".to_string(),
        image: "ghcr.io/eclipse-sumo/sumo:latest".to_string(),
        command: vec!["/bin/sh".to_string(), "-c".to_string()],
        args: vec![run_script],
        env,
        cpu_request: Some(req.cpu_request),
        memory_gi_request: Some(req.memory_gi),
        volume_mounts: mounts,
        working_dir: Some("/workspace".to_string()),
    };

    let mut labels = BTreeMap::new();
    labels.insert("job-id".to_string(), job_id.to_string());
    labels.insert("tenant".to_string(), req.tenant.tenant_id.clone());

    let mut node_selector = BTreeMap::new();
    node_selector.insert("node-type".to_string(), "simulation".to_string());

    let spec = WorkloadSpec {
        name: workload_name.to_string(),
        labels,
        node_selector,
        containers: vec![container],
        volumes,
        active_deadline_seconds: Some(req.max_job_duration_hours * 3600),
        ttl_seconds_after_finished: Some(120),
        ..WorkloadSpec::new(workload_name)
    };

    port.create_workload(namespace, spec).await.map_err(Error::Orchestrator)
}

/// Runs the full admission-and-materialisation flow and returns the
/// inserted job row. The row is always persisted before the workload is
/// emitted: a workload-emission failure leaves a recoverable `PENDING` row
/// that the reconciler's orphan handling will eventually fail out.
pub async fn submit(
    pool: &deadpool_postgres::Pool,
    port: &dyn OrchestratorPort,
    req: SubmissionRequest,
) -> Result<Job, Error> {
    validate_resource_request(req.cpu_request, req.memory_gi, &req.tenant)?;

    let active = sumo_store::count_active_jobs(pool, &req.tenant.tenant_id).await?;
    if active >= req.tenant.max_concurrent_jobs as i64 {
        return Err(Error::TooManyJobs {
            active,
            max: req.tenant.max_concurrent_jobs,
        });
    }

    let job_id = Uuid::new_v4();
    let workload_name = Job::derive_workload_name(&job_id);
    let scenario_data = serde_json::json!({
        "scenario_id": req.scenario_id,
        "config_file": req.config_file,
    });

    let job = Job {
        job_id,
        tenant_id: req.tenant.tenant_id.clone(),
        workload_name: workload_name.clone(),
        namespace: req.tenant.namespace.clone(),
        status: JobStatus::Pending,
        scenario_data,
        cpu_request: req.cpu_request,
        memory_gi: req.memory_gi,
        submitted_at: Utc::now(),
        started_at: None,
        finished_at: None,
        result_location: None,
        result_files: None,
    };
    let inserted = sumo_store::insert_job(pool, &job).await?;

    sumo_provisioner::ensure_tenant_isolation(port, &req.tenant, req.result_volume_size_gi)
        .await
        .map_err(Error::Orchestrator)?;

    let result_pvc_name = sumo_provisioner::result_pvc_name(&req.tenant.namespace);
    emit_workload(port, &req, &job_id, &workload_name, &result_pvc_name).await?;

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> Tenant {
        Tenant {
            tenant_id: "acme".to_string(),
            namespace: "acme".to_string(),
            api_token: "tok".to_string(),
            max_cpu: 4,
            max_memory_gi: 8,
            max_concurrent_jobs: 3,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn resource_request_within_bounds_is_accepted() {
        assert!(validate_resource_request(2, 4, &tenant()).is_ok());
    }

    #[test]
    fn cpu_above_tenant_cap_is_rejected() {
        assert!(validate_resource_request(8, 4, &tenant()).is_err());
    }

    #[test]
    fn zero_cpu_is_rejected() {
        assert!(validate_resource_request(0, 4, &tenant()).is_err());
    }

    #[test]
    fn memory_above_tenant_cap_is_rejected() {
        assert!(validate_resource_request(2, 64, &tenant()).is_err());
    }

    #[tokio::test]
    async fn small_payload_materialises_a_single_blob() {
        let port = sumo_orchestrator::fake::FakeOrchestrator::new();
        let job_id = Uuid::new_v4();
        let (script, volumes, mounts) =
            materialise_payload(&port, "acme", &job_id, b"not actually a zip, just short").await.unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(mounts.len(), 1);
        assert!(script.contains("sumo_files.zip.b64"));
        assert_eq!(port.config_blob_names("acme").len(), 1);
    }

    #[tokio::test]
    async fn oversized_payload_is_sharded_across_chunks() {
        let port = sumo_orchestrator::fake::FakeOrchestrator::new();
        let job_id = Uuid::new_v4();
        let bytes = vec![0u8; SHARD_THRESHOLD_BYTES * 2];
        let (script, volumes, mounts) = materialise_payload(&port, "acme", &job_id, &bytes).await.unwrap();
        assert!(volumes.len() >= 3);
        assert_eq!(volumes.len(), mounts.len());
        assert!(script.contains("seq 0"));
        assert_eq!(port.config_blob_names("acme").len(), volumes.len());
    }
}
