//! Pure(-ish) per-row decision functions: each takes a job snapshot plus
//! whatever orchestrator state it needs to observe, and returns a planned
//! write. None of these touch the state store — the driver in `driver.rs`
//! applies the returned `JobUpdate` and carries out any `SideAction`.

use chrono::Utc;
use sumo_orchestrator::OrchestratorPort;
use sumo_storage_planner::{self as planner, PlannerConfig};
use sumo_types::{Job, JobStatus, JobUpdate, StorageBackend, short_id};
use uuid::Uuid;

/// A cluster-facing effect a pass decided to trigger, carried out by the
/// driver after the corresponding `JobUpdate` is durably written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideAction {
    TriggerUpload { namespace: String, tenant_id: String, backend: StorageBackend },
    TriggerCleanupVolume { namespace: String },
    ScheduleConfigBlobCleanup { namespace: String },
}

#[derive(Debug, Clone, Default)]
pub struct PlannedWrite {
    pub job_id: Uuid,
    pub update: JobUpdate,
    pub actions: Vec<SideAction>,
}

impl PlannedWrite {
    fn new(job_id: Uuid) -> Self {
        Self { job_id, update: JobUpdate::default(), actions: Vec::new() }
    }

    fn is_noop(&self) -> bool {
        self.update.is_empty() && self.actions.is_empty()
    }
}

/// Pass 1: for terminal rows missing a timestamp, fill it in from the
/// workload's reported start time, or fall back to `submitted_at`/`now`
/// if the workload is gone or never reported one.
pub async fn plan_timestamp_backfill(port: &dyn OrchestratorPort, job: &Job) -> Option<PlannedWrite> {
    if job.started_at.is_some() && job.finished_at.is_some() {
        return None;
    }
    let mut write = PlannedWrite::new(job.job_id);

    match port.get_workload(&job.namespace, &job.workload_name).await {
        Ok(status) => {
            if job.started_at.is_none() {
                write.update.started_at = Some(status.start_time.unwrap_or(job.submitted_at));
            }
            if job.finished_at.is_none() {
                write.update.finished_at = Some(Utc::now());
            }
        }
        Err(e) if e.is_not_found() => {
            if job.started_at.is_none() {
                write.update.started_at = Some(job.submitted_at);
            }
            if job.finished_at.is_none() {
                write.update.finished_at = Some(Utc::now());
            }
        }
        Err(e) => {
            tracing::debug!(job_id = %job.job_id, error = %e, "could not backfill timestamps");
            return None;
        }
    }

    (!write.is_noop()).then_some(write)
}

/// Pass 2: for terminal rows with no `result_location` yet, ask the
/// storage planner for a handle. A `SUCCEEDED` row on an object-store
/// backend also triggers the upload side-workload. Mirrors the grounding
/// source's behaviour of leaving `FAILED` rows without a result location.
pub fn plan_result_location_backfill(job: &Job, backend: StorageBackend, cfg: &PlannerConfig) -> Option<PlannedWrite> {
    if job.result_location.is_some() {
        return None;
    }
    if job.status != JobStatus::Succeeded {
        return None;
    }

    let mut write = PlannedWrite::new(job.job_id);
    let loc = planner::location_for(&job.job_id, &job.tenant_id, &job.namespace, backend, cfg);
    write.update.result_location = Some(loc.location);
    if backend != StorageBackend::Volume {
        write.actions.push(SideAction::TriggerUpload {
            namespace: job.namespace.clone(),
            tenant_id: job.tenant_id.clone(),
            backend,
        });
    }
    Some(write)
}

/// Pass 3: for `SUCCEEDED` rows with a pending upload (result location set,
/// `result_files` still null), check whether the upload side-workload has
/// finished; if so, record the stub result and, on object-store backends,
/// trigger the volume cleanup.
pub async fn plan_upload_completion(port: &dyn OrchestratorPort, job: &Job, backend: StorageBackend) -> Option<PlannedWrite> {
    if job.status != JobStatus::Succeeded || job.result_files.is_some() {
        return None;
    }
    let Some(ref location) = job.result_location else { return None };
    if !location.contains("results/") {
        return None;
    }

    let sid = short_id(&job.job_id);
    let upload_name = format!("upload-{sid}");
    match port.get_workload(&job.namespace, &upload_name).await {
        Ok(status) if status.succeeded > 0 => {
            let mut write = PlannedWrite::new(job.job_id);
            write.update.result_files = Some(serde_json::json!({
                "storage_type": backend.to_string(),
                "uploaded": true,
                "prefix": location,
            }));
            if backend != StorageBackend::Volume {
                write.actions.push(SideAction::TriggerCleanupVolume { namespace: job.namespace.clone() });
            }
            Some(write)
        }
        Ok(_) => None,
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            tracing::debug!(job_id = %job.job_id, error = %e, "could not check upload job status");
            None
        }
    }
}

/// Pass 4: for active rows, observe the workload's conditions and map them
/// onto a status transition. Mirrors the original's evaluation order
/// exactly: condition-derived transitions are computed first, then (yes,
/// unconditionally) overwritten to `RUNNING` if the workload has an active
/// pod and the row is still `PENDING`.
pub async fn plan_active_job_transition(
    port: &dyn OrchestratorPort,
    job: &Job,
    backend: StorageBackend,
    cfg: &PlannerConfig,
) -> Option<PlannedWrite> {
    match port.get_workload(&job.namespace, &job.workload_name).await {
        Ok(status) => {
            let mut new_status = job.status;
            if status.condition_failed_true {
                new_status = JobStatus::Failed;
            } else if status.condition_complete_true {
                new_status = JobStatus::Succeeded;
            }
            if status.active >= 1 && job.status == JobStatus::Pending {
                new_status = JobStatus::Running;
            }

            if new_status == job.status {
                return None;
            }

            let mut write = PlannedWrite::new(job.job_id);
            write.update.status = Some(new_status);

            match new_status {
                JobStatus::Running => {
                    write.update.started_at = Some(Utc::now());
                }
                JobStatus::Succeeded | JobStatus::Failed => {
                    write.update.finished_at = Some(Utc::now());
                    write.update.started_at = Some(job.started_at.unwrap_or_else(Utc::now));

                    if new_status == JobStatus::Succeeded {
                        let loc = planner::location_for(&job.job_id, &job.tenant_id, &job.namespace, backend, cfg);
                        write.update.result_location = Some(loc.location);
                        if backend != StorageBackend::Volume {
                            write.actions.push(SideAction::TriggerUpload {
                                namespace: job.namespace.clone(),
                                tenant_id: job.tenant_id.clone(),
                                backend,
                            });
                        }
                    }
                    write.actions.push(SideAction::ScheduleConfigBlobCleanup { namespace: job.namespace.clone() });
                }
                JobStatus::Pending => {}
            }

            Some(write)
        }
        Err(e) if e.is_not_found() => {
            let mut write = PlannedWrite::new(job.job_id);
            write.update.status = Some(JobStatus::Failed);
            write.update.finished_at = Some(Utc::now());
            Some(write)
        }
        Err(e) => {
            tracing::error!(job_id = %job.job_id, error = %e, "failed to sync job");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use sumo_orchestrator::{WorkloadStatus, fake::FakeOrchestrator};

    use super::*;

    fn job(status: JobStatus) -> Job {
        let job_id = Uuid::new_v4();
        Job {
            job_id,
            tenant_id: "acme".to_string(),
            workload_name: Job::derive_workload_name(&job_id),
            namespace: "acme".to_string(),
            status,
            scenario_data: serde_json::json!({}),
            cpu_request: 1,
            memory_gi: 1,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result_location: None,
            result_files: None,
        }
    }

    fn cfg() -> PlannerConfig {
        PlannerConfig::default()
    }

    #[tokio::test]
    async fn pending_becomes_running_when_workload_goes_active() {
        let port = FakeOrchestrator::new();
        let j = job(JobStatus::Pending);
        port.set_workload_status(&j.namespace, &j.workload_name, WorkloadStatus { active: 1, ..Default::default() });
        let write = plan_active_job_transition(&port, &j, StorageBackend::Volume, &cfg()).await.unwrap();
        assert_eq!(write.update.status, Some(JobStatus::Running));
        assert!(write.update.started_at.is_some());
    }

    #[tokio::test]
    async fn complete_condition_marks_succeeded_and_schedules_cleanup() {
        let port = FakeOrchestrator::new();
        let j = job(JobStatus::Running);
        port.set_workload_status(
            &j.namespace,
            &j.workload_name,
            WorkloadStatus { condition_complete_true: true, ..Default::default() },
        );
        let write = plan_active_job_transition(&port, &j, StorageBackend::Volume, &cfg()).await.unwrap();
        assert_eq!(write.update.status, Some(JobStatus::Succeeded));
        assert!(write.update.result_location.is_some());
        assert!(write.actions.iter().any(|a| matches!(a, SideAction::ScheduleConfigBlobCleanup { .. })));
    }

    #[tokio::test]
    async fn missing_workload_fails_the_row() {
        let port = FakeOrchestrator::new();
        let j = job(JobStatus::Running);
        let write = plan_active_job_transition(&port, &j, StorageBackend::Volume, &cfg()).await.unwrap();
        assert_eq!(write.update.status, Some(JobStatus::Failed));
        assert!(write.update.finished_at.is_some());
    }

    #[tokio::test]
    async fn unchanged_status_plans_nothing() {
        let port = FakeOrchestrator::new();
        let j = job(JobStatus::Running);
        port.set_workload_status(&j.namespace, &j.workload_name, WorkloadStatus { active: 1, ..Default::default() });
        assert!(plan_active_job_transition(&port, &j, StorageBackend::Volume, &cfg()).await.is_none());
    }

    #[test]
    fn failed_rows_get_no_result_location_from_backfill() {
        let mut j = job(JobStatus::Failed);
        j.finished_at = Some(Utc::now());
        j.started_at = Some(Utc::now());
        let write = plan_result_location_backfill(&j, StorageBackend::Volume, &cfg());
        assert!(write.is_none());
    }

    #[test]
    fn succeeded_row_on_object_store_triggers_upload() {
        let mut j = job(JobStatus::Succeeded);
        j.finished_at = Some(Utc::now());
        j.started_at = Some(Utc::now());
        let cfg = PlannerConfig { s3_bucket: Some("b".to_string()), ..Default::default() };
        let write = plan_result_location_backfill(&j, StorageBackend::S3, &cfg).unwrap();
        assert!(write.update.result_location.is_some());
        assert!(write.actions.iter().any(|a| matches!(a, SideAction::TriggerUpload { .. })));
    }

    #[tokio::test]
    async fn upload_completion_is_a_no_op_until_the_upload_job_succeeds() {
        let port = FakeOrchestrator::new();
        let mut j = job(JobStatus::Succeeded);
        j.result_location = Some("sumo-k8-results/acme/results/".to_string());
        assert!(plan_upload_completion(&port, &j, StorageBackend::S3).await.is_none());

        port.set_workload_status(
            &j.namespace,
            &format!("upload-{}", short_id(&j.job_id)),
            WorkloadStatus { succeeded: 1, ..Default::default() },
        );
        let write = plan_upload_completion(&port, &j, StorageBackend::S3).await.unwrap();
        assert!(write.update.result_files.is_some());
        assert!(write.actions.iter().any(|a| matches!(a, SideAction::TriggerCleanupVolume { .. })));
    }

    #[tokio::test]
    async fn timestamp_backfill_falls_back_to_submitted_at_on_404() {
        let port = FakeOrchestrator::new();
        let mut j = job(JobStatus::Failed);
        j.finished_at = None;
        let write = plan_timestamp_backfill(&port, &j).await.unwrap();
        assert_eq!(write.update.started_at, Some(j.submitted_at));
        assert!(write.update.finished_at.is_some());
    }
}
