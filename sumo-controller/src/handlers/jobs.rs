//! `/jobs/*`: submission, lookup, log retrieval, and results. Every route
//! here is tenant-scoped — a job id that belongs to another tenant reads
//! as `not-found`, never `unauthorized`, so an id can't be used to probe
//! for another tenant's jobs.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::StreamExt;
use serde::Serialize;
use sumo_types::{Job, JobStatus};
use uuid::Uuid;

use crate::app::App;
use crate::auth::AuthenticatedTenant;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub scenario_data: serde_json::Value,
    pub cpu_request: i32,
    pub memory_gi: i32,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub result_location: Option<String>,
}

impl From<Job> for JobView {
    fn from(j: Job) -> Self {
        Self {
            job_id: j.job_id,
            status: j.status,
            scenario_data: j.scenario_data,
            cpu_request: j.cpu_request,
            memory_gi: j.memory_gi,
            submitted_at: j.submitted_at,
            started_at: j.started_at,
            finished_at: j.finished_at,
            result_location: j.result_location,
        }
    }
}

/// `POST /jobs`: multipart with a `scenario_id` field, integer
/// `cpu_request`/`memory_gi` fields, and a `file` field carrying the
/// zipped scenario bundle.
pub async fn submit(
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    State(app): State<App>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut scenario_id: Option<String> = None;
    let mut cpu_request: Option<i32> = None;
    let mut memory_gi: Option<i32> = None;
    let mut zip_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::invalid_input(e.to_string()))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "scenario_id" => {
                scenario_id = Some(field.text().await.map_err(|e| ApiError::invalid_input(e.to_string()))?);
            }
            "cpu_request" => {
                let text = field.text().await.map_err(|e| ApiError::invalid_input(e.to_string()))?;
                cpu_request =
                    Some(text.trim().parse().map_err(|_| ApiError::invalid_input("cpu_request must be an integer"))?);
            }
            "memory_gi" => {
                let text = field.text().await.map_err(|e| ApiError::invalid_input(e.to_string()))?;
                memory_gi =
                    Some(text.trim().parse().map_err(|_| ApiError::invalid_input("memory_gi must be an integer"))?);
            }
            "file" => {
                let bytes = field.bytes().await.map_err(|e| ApiError::invalid_input(e.to_string()))?;
                zip_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let scenario_id = scenario_id.ok_or_else(|| ApiError::invalid_input("missing scenario_id"))?;
    let cpu_request = cpu_request.ok_or_else(|| ApiError::invalid_input("missing cpu_request"))?;
    let memory_gi = memory_gi.ok_or_else(|| ApiError::invalid_input("missing memory_gi"))?;
    let zip_bytes = zip_bytes.ok_or_else(|| ApiError::invalid_input("missing file"))?;

    let job = sumo_submission::submit_job(
        &app.pool,
        app.port.as_ref(),
        tenant,
        scenario_id,
        cpu_request,
        memory_gi,
        zip_bytes,
        app.max_file_size_bytes,
        app.max_job_duration_hours,
        app.result_storage_size_gi,
    )
    .await?;

    Ok((axum::http::StatusCode::CREATED, Json(JobView::from(job))))
}

/// `GET /jobs/:id`.
pub async fn get(
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    State(app): State<App>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = sumo_store::get_job_for_tenant(&app.pool, job_id, &tenant.tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} not found")))?;
    Ok(Json(JobView::from(job)))
}

/// `GET /jobs/:id/logs`: the whole log relay collected to completion, as
/// a plain JSON array. Unlike the streaming variant this blocks until the
/// workload reaches a terminal phase (or the relay itself gives up).
pub async fn logs(
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    State(app): State<App>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = sumo_store::get_job_for_tenant(&app.pool, job_id, &tenant.tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} not found")))?;

    let events: Vec<sumo_logrelay::LogEvent> =
        sumo_logrelay::relay(app.port.clone(), job.namespace.clone(), job.workload_name.clone()).collect().await;
    Ok(Json(events))
}

/// `GET /jobs/:id/logs/stream`: the same relay as a Server-Sent Events
/// response, one JSON-encoded event per `data:` line.
pub async fn logs_stream(
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    State(app): State<App>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = sumo_store::get_job_for_tenant(&app.pool, job_id, &tenant.tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} not found")))?;

    let stream = sumo_logrelay::relay(app.port.clone(), job.namespace, job.workload_name).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok::<_, std::convert::Infallible>(Event::default().data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub result_location: Option<String>,
    pub result_files: Option<serde_json::Value>,
}

/// `GET /jobs/:id/results`: only meaningful once the job has reached a
/// terminal status; `result_location`/`result_files` are `None` until then.
pub async fn results(
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    State(app): State<App>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = sumo_store::get_job_for_tenant(&app.pool, job_id, &tenant.tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} not found")))?;

    if !job.status.is_terminal() {
        return Err(ApiError::invalid_input("job has not finished yet"));
    }

    Ok(Json(ResultsResponse {
        job_id: job.job_id,
        status: job.status,
        result_location: job.result_location,
        result_files: job.result_files,
    }))
}
