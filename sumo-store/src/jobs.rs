use std::str::FromStr;

use deadpool_postgres::Pool;
use sumo_types::{Job, JobStatus, JobUpdate};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::Error;

fn from_row(row: Row) -> Job {
    let status: String = row.get("status");
    Job {
        job_id: row.get("job_id"),
        tenant_id: row.get("tenant_id"),
        workload_name: row.get("workload_name"),
        namespace: row.get("namespace"),
        status: JobStatus::from_str(&status).unwrap_or(JobStatus::Failed),
        scenario_data: row.get("scenario_data"),
        cpu_request: row.get("cpu_request"),
        memory_gi: row.get("memory_gi"),
        submitted_at: row.get("submitted_at"),
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
        result_location: row.get("result_location"),
        result_files: row.get("result_files"),
    }
}

const COLUMNS: &str = "job_id, tenant_id, workload_name, namespace, status, scenario_data, \
    cpu_request, memory_gi, submitted_at, started_at, finished_at, result_location, result_files";

/// Inserts a new job row in `PENDING` status, ahead of the workload being
/// submitted to the cluster. If the workload never gets created the job
/// simply never leaves `PENDING` and the orphan sweep reclaims it.
pub async fn insert_job(pool: &Pool, job: &Job) -> Result<Job, Error> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            &format!(
                r#"
                INSERT INTO jobs (job_id, tenant_id, workload_name, namespace, status, scenario_data,
                                   cpu_request, memory_gi, submitted_at, started_at, finished_at,
                                   result_location, result_files)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING {COLUMNS}
                "#
            ),
            &[
                &job.job_id,
                &job.tenant_id,
                &job.workload_name,
                &job.namespace,
                &job.status.to_string(),
                &job.scenario_data,
                &job.cpu_request,
                &job.memory_gi,
                &job.submitted_at,
                &job.started_at,
                &job.finished_at,
                &job.result_location,
                &job.result_files,
            ],
        )
        .await?;
    Ok(from_row(row))
}

pub async fn get_job(pool: &Pool, job_id: Uuid) -> Result<Option<Job>, Error> {
    let client = pool.get().await?;
    let row = client
        .query_opt(&format!("SELECT {COLUMNS} FROM jobs WHERE job_id = $1"), &[&job_id])
        .await?;
    Ok(row.map(from_row))
}

/// Same as [`get_job`] but scoped to a tenant, so one tenant can never read
/// another's job by guessing a UUID.
pub async fn get_job_for_tenant(pool: &Pool, job_id: Uuid, tenant_id: &str) -> Result<Option<Job>, Error> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!("SELECT {COLUMNS} FROM jobs WHERE job_id = $1 AND tenant_id = $2"),
            &[&job_id, &tenant_id],
        )
        .await?;
    Ok(row.map(from_row))
}

pub async fn list_jobs_for_tenant(pool: &Pool, tenant_id: &str, limit: i64, offset: i64) -> Result<Vec<Job>, Error> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {COLUMNS} FROM jobs WHERE tenant_id = $1 ORDER BY submitted_at DESC LIMIT $2 OFFSET $3"
            ),
            &[&tenant_id, &limit, &offset],
        )
        .await?;
    Ok(rows.into_iter().map(from_row).collect())
}

pub async fn list_all_jobs(pool: &Pool, limit: i64, offset: i64) -> Result<Vec<Job>, Error> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!("SELECT {COLUMNS} FROM jobs ORDER BY submitted_at DESC LIMIT $1 OFFSET $2"),
            &[&limit, &offset],
        )
        .await?;
    Ok(rows.into_iter().map(from_row).collect())
}

/// Jobs in a given status, used by each reconciler pass to pull its own
/// working set without scanning the whole table.
pub async fn list_jobs_by_status(pool: &Pool, status: JobStatus) -> Result<Vec<Job>, Error> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!("SELECT {COLUMNS} FROM jobs WHERE status = $1"),
            &[&status.to_string()],
        )
        .await?;
    Ok(rows.into_iter().map(from_row).collect())
}

/// Active (`PENDING` or `RUNNING`) jobs across every tenant, polled each
/// sweep to watch for orchestrator-side status transitions.
pub async fn list_active_jobs(pool: &Pool) -> Result<Vec<Job>, Error> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!("SELECT {COLUMNS} FROM jobs WHERE status IN ('PENDING', 'RUNNING')"),
            &[],
        )
        .await?;
    Ok(rows.into_iter().map(from_row).collect())
}

/// Terminal jobs whose `result_location` still looks like an unfinished
/// volume path rather than a finalized object-store key, picked up by the
/// result-upload pass.
pub async fn list_jobs_pending_upload(pool: &Pool) -> Result<Vec<Job>, Error> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {COLUMNS} FROM jobs WHERE status IN ('SUCCEEDED', 'FAILED') \
                 AND result_location LIKE '%results/%'"
            ),
            &[],
        )
        .await?;
    Ok(rows.into_iter().map(from_row).collect())
}

/// Applies a sparse set of column changes produced by a reconciler pass.
/// No-op (and no round trip) if `update.is_empty()`.
pub async fn update_job(pool: &Pool, job_id: Uuid, update: &JobUpdate) -> Result<bool, Error> {
    if update.is_empty() {
        return Ok(false);
    }

    let client = pool.get().await?;
    let mut set_clauses = Vec::new();
    let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = Vec::new();
    let mut idx = 1;

    let status_str = update.status.map(|s| s.to_string());
    if let Some(ref s) = status_str {
        set_clauses.push(format!("status = ${idx}"));
        params.push(s);
        idx += 1;
    }
    if let Some(ref t) = update.started_at {
        set_clauses.push(format!("started_at = ${idx}"));
        params.push(t);
        idx += 1;
    }
    if let Some(ref t) = update.finished_at {
        set_clauses.push(format!("finished_at = ${idx}"));
        params.push(t);
        idx += 1;
    }
    if let Some(ref loc) = update.result_location {
        set_clauses.push(format!("result_location = ${idx}"));
        params.push(loc);
        idx += 1;
    }
    if let Some(ref files) = update.result_files {
        set_clauses.push(format!("result_files = ${idx}"));
        params.push(files);
        idx += 1;
    }

    let query = format!("UPDATE jobs SET {} WHERE job_id = ${idx}", set_clauses.join(", "));
    params.push(&job_id);

    let rows = client.execute(&query, &params).await?;
    Ok(rows > 0)
}
