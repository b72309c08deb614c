//! Owns the actual database writes and cluster side-effects the passes in
//! [`crate::passes`] only plan. Two independently-cadenced loops: the main
//! sweep (5 passes, 30 s) and the orphan config-blob sweep (5 min).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use deadpool_postgres::Pool;
use sumo_orchestrator::OrchestratorPort;
use sumo_storage_planner::{self as planner, PlannerConfig};
use sumo_types::{Job, JobStatus, StorageBackend, short_id};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ReconcilerConfig;
use crate::passes::{self, PlannedWrite, SideAction};

/// Runs both loops until `cancel` fires, returning once each has wound
/// down. Intended to be spawned once from the controller's `main`.
pub async fn run(
    pool: Pool,
    port: Arc<dyn OrchestratorPort>,
    planner_cfg: PlannerConfig,
    recon_cfg: ReconcilerConfig,
    cancel: CancellationToken,
) {
    let sweep = tokio::spawn(main_sweep_loop(
        pool.clone(),
        port.clone(),
        planner_cfg,
        recon_cfg.clone(),
        cancel.clone(),
    ));
    let orphans = tokio::spawn(orphan_sweep_loop(pool, port, recon_cfg, cancel));

    let _ = sweep.await;
    let _ = orphans.await;
}

async fn main_sweep_loop(
    pool: Pool,
    port: Arc<dyn OrchestratorPort>,
    planner_cfg: PlannerConfig,
    recon_cfg: ReconcilerConfig,
    cancel: CancellationToken,
) {
    loop {
        let interval = if port.is_available() { recon_cfg.sweep_interval } else { recon_cfg.unavailable_sweep_interval };
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("reconciler: main sweep loop shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        if !port.is_available() {
            tracing::warn!("reconciler: orchestrator unavailable, skipping sweep");
            continue;
        }

        sweep_once(&pool, &port, &planner_cfg, &recon_cfg, &cancel).await;
    }
}

async fn orphan_sweep_loop(pool: Pool, port: Arc<dyn OrchestratorPort>, recon_cfg: ReconcilerConfig, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("reconciler: orphan sweep loop shutting down");
                return;
            }
            _ = tokio::time::sleep(recon_cfg.orphan_sweep_interval) => {}
        }

        if !port.is_available() {
            continue;
        }

        sweep_orphan_config_blobs(&pool, port.as_ref(), recon_cfg.orphan_max_age).await;
    }
}

/// One iteration of the five-pass sweep, detecting the storage backend
/// once and re-using it across the passes that need it.
async fn sweep_once(
    pool: &Pool,
    port: &Arc<dyn OrchestratorPort>,
    planner_cfg: &PlannerConfig,
    recon_cfg: &ReconcilerConfig,
    cancel: &CancellationToken,
) {
    let backend = planner::detect(port.as_ref(), planner_cfg).await;

    run_timestamp_backfill(pool, port, planner_cfg, recon_cfg, cancel).await;
    run_result_location_backfill(pool, port, backend, planner_cfg, recon_cfg, cancel).await;
    run_upload_completion(pool, port, backend, planner_cfg, recon_cfg, cancel).await;
    run_active_job_transition(pool, port, backend, planner_cfg, recon_cfg, cancel).await;
}

async fn terminal_rows(pool: &Pool) -> Vec<Job> {
    let mut rows = Vec::new();
    for status in [JobStatus::Succeeded, JobStatus::Failed] {
        match sumo_store::list_jobs_by_status(pool, status).await {
            Ok(mut r) => rows.append(&mut r),
            Err(e) => tracing::warn!(error = %e, ?status, "reconciler: could not list terminal jobs"),
        }
    }
    rows
}

async fn run_timestamp_backfill(
    pool: &Pool,
    port: &Arc<dyn OrchestratorPort>,
    planner_cfg: &PlannerConfig,
    recon_cfg: &ReconcilerConfig,
    cancel: &CancellationToken,
) {
    for job in terminal_rows(pool).await {
        if let Some(write) = passes::plan_timestamp_backfill(port.as_ref(), &job).await {
            apply(pool, port, planner_cfg, recon_cfg, cancel, write).await;
        }
    }
}

async fn run_result_location_backfill(
    pool: &Pool,
    port: &Arc<dyn OrchestratorPort>,
    backend: StorageBackend,
    planner_cfg: &PlannerConfig,
    recon_cfg: &ReconcilerConfig,
    cancel: &CancellationToken,
) {
    for job in terminal_rows(pool).await {
        if let Some(write) = passes::plan_result_location_backfill(&job, backend, planner_cfg) {
            apply(pool, port, planner_cfg, recon_cfg, cancel, write).await;
        }
    }
}

async fn run_upload_completion(
    pool: &Pool,
    port: &Arc<dyn OrchestratorPort>,
    backend: StorageBackend,
    planner_cfg: &PlannerConfig,
    recon_cfg: &ReconcilerConfig,
    cancel: &CancellationToken,
) {
    let rows = match sumo_store::list_jobs_pending_upload(pool).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "reconciler: could not list jobs pending upload");
            return;
        }
    };
    for job in rows.into_iter().filter(|j| j.result_files.is_none()) {
        if let Some(write) = passes::plan_upload_completion(port.as_ref(), &job, backend).await {
            apply(pool, port, planner_cfg, recon_cfg, cancel, write).await;
        }
    }
}

async fn run_active_job_transition(
    pool: &Pool,
    port: &Arc<dyn OrchestratorPort>,
    backend: StorageBackend,
    planner_cfg: &PlannerConfig,
    recon_cfg: &ReconcilerConfig,
    cancel: &CancellationToken,
) {
    let rows = match sumo_store::list_active_jobs(pool).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "reconciler: could not list active jobs");
            return;
        }
    };
    for job in rows {
        if let Some(write) = passes::plan_active_job_transition(port.as_ref(), &job, backend, planner_cfg).await {
            apply(pool, port, planner_cfg, recon_cfg, cancel, write).await;
        }
    }
}

/// Commits the planned row update, then carries out whatever side effects
/// it produced. Side effects only run once the update is durably applied
/// (§4.5 tie-break: the upload side-workload follows the terminal-edge
/// transition, never precedes it).
async fn apply(
    pool: &Pool,
    port: &Arc<dyn OrchestratorPort>,
    planner_cfg: &PlannerConfig,
    recon_cfg: &ReconcilerConfig,
    cancel: &CancellationToken,
    write: PlannedWrite,
) {
    let job_id = write.job_id;
    if write.update.is_empty() && write.actions.is_empty() {
        return;
    }

    if !write.update.is_empty() {
        if let Err(e) = sumo_store::update_job(pool, job_id, &write.update).await {
            tracing::warn!(job_id = %job_id, error = %e, "reconciler: failed to apply planned update");
            return;
        }
    }

    for action in write.actions {
        apply_side_action(port, planner_cfg, recon_cfg, cancel, job_id, action).await;
    }
}

async fn apply_side_action(
    port: &Arc<dyn OrchestratorPort>,
    planner_cfg: &PlannerConfig,
    recon_cfg: &ReconcilerConfig,
    cancel: &CancellationToken,
    job_id: Uuid,
    action: SideAction,
) {
    match action {
        SideAction::TriggerUpload { namespace, tenant_id, backend } => {
            if let Err(e) = planner::start_upload(port.as_ref(), &namespace, &tenant_id, &job_id, backend, planner_cfg).await {
                tracing::warn!(job_id = %job_id, error = %e, "reconciler: failed to start upload side-workload");
            }
        }
        SideAction::TriggerCleanupVolume { namespace } => {
            if let Err(e) = planner::cleanup_volume(port.as_ref(), &namespace, &job_id).await {
                tracing::warn!(job_id = %job_id, error = %e, "reconciler: failed to start cleanup side-workload");
            }
        }
        SideAction::ScheduleConfigBlobCleanup { namespace } => {
            schedule_configmap_cleanup(port.clone(), job_id, namespace, recon_cfg.configmap_cleanup_delay, cancel.clone());
        }
    }
}

/// Spawns a short-lived task that sleeps `delay` then deletes every config
/// blob in `namespace` whose name begins with `sumo-<shortId>` (the
/// submission-time payload shards). Observes `cancel` so a shutdown mid-wait
/// doesn't leave a detached task running past process exit.
fn schedule_configmap_cleanup(port: Arc<dyn OrchestratorPort>, job_id: Uuid, namespace: String, delay: Duration, cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let prefix = format!("sumo-{}", short_id(&job_id));
        let blobs = match port.list_config_blobs(&namespace, None).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "reconciler: could not list config blobs for deferred cleanup");
                return;
            }
        };
        for blob in blobs.into_iter().filter(|b| b.name.starts_with(&prefix)) {
            if let Err(e) = port.delete_config_blob(&namespace, &blob.name).await {
                tracing::debug!(job_id = %job_id, name = %blob.name, error = %e, "reconciler: could not delete config blob");
            }
        }
    });
}

async fn sweep_orphan_config_blobs(pool: &Pool, port: &dyn OrchestratorPort, max_age: Duration) {
    let namespaces = match port.list_non_system_namespaces().await {
        Ok(ns) => ns,
        Err(e) => {
            tracing::warn!(error = %e, "reconciler: could not list namespaces for orphan sweep");
            return;
        }
    };

    for namespace in namespaces {
        let blobs = match port.list_config_blobs(&namespace, Some("cleanup=true")).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(namespace = %namespace, error = %e, "reconciler: could not list config blobs for orphan sweep");
                continue;
            }
        };

        for blob in blobs {
            let Some(created_at) = blob.created_at else { continue };
            let age = Utc::now().signed_duration_since(created_at);
            if age.num_seconds() < max_age.as_secs() as i64 {
                continue;
            }

            let Some(job_id_label) = blob.labels.get("job-id") else { continue };
            let Ok(job_id) = job_id_label.parse::<Uuid>() else { continue };

            match sumo_store::get_job(pool, job_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::info!(namespace = %namespace, name = %blob.name, "reconciler: deleting orphaned config blob");
                    if let Err(e) = port.delete_config_blob(&namespace, &blob.name).await {
                        tracing::debug!(name = %blob.name, error = %e, "reconciler: could not delete orphaned config blob");
                    }
                }
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "reconciler: could not check orphan candidate against the state store");
                }
            }
        }
    }
}
