//! The job submission pipeline: turns an uploaded ZIP bundle and resource
//! request into a durable `PENDING` row and a running workload.
//!
//! The row is inserted *before* the workload is emitted. If workload
//! emission then fails partway (a partial shard, a rejected container
//! spec), the row is left in `PENDING` with no corresponding workload; the
//! reconciler's active-job pass notices the orchestrator's 404 on the next
//! sweep and fails it out, rather than this pipeline trying to undo a
//! database write it already committed.

mod error;
mod payload;
mod pipeline;

pub use error::Error;
pub use payload::{check_payload_size, find_sumocfg_entry};
pub use pipeline::{SHARD_THRESHOLD_BYTES, SubmissionRequest, emit_workload, submit, validate_resource_request};

use sumo_orchestrator::OrchestratorPort;
use sumo_types::{Job, Tenant};

/// Validates an upload end to end and admits it as a job. Combines the
/// payload checks (`payload.rs`) with the persistence-then-materialisation
/// flow (`pipeline.rs`); callers that already hold a parsed config file
/// name (e.g. a retry path) can call `pipeline::submit` directly instead.
#[allow(clippy::too_many_arguments)]
pub async fn submit_job(
    pool: &deadpool_postgres::Pool,
    port: &dyn OrchestratorPort,
    tenant: Tenant,
    scenario_id: String,
    cpu_request: i32,
    memory_gi: i32,
    zip_bytes: Vec<u8>,
    max_file_size_bytes: usize,
    max_job_duration_hours: i64,
    result_volume_size_gi: i32,
) -> Result<Job, Error> {
    validate_resource_request(cpu_request, memory_gi, &tenant)?;
    check_payload_size(zip_bytes.len(), max_file_size_bytes)?;
    let config_file = find_sumocfg_entry(&zip_bytes)?;

    let req = SubmissionRequest {
        tenant,
        scenario_id,
        cpu_request,
        memory_gi,
        zip_bytes,
        config_file,
        max_job_duration_hours,
        result_volume_size_gi,
    };
    submit(pool, port, req).await
}
