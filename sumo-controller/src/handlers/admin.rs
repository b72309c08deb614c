//! `/admin/*`: operator-facing cluster, job, and tenant-activity views.
//! Every route here is gated by [`crate::auth::AdminAuth`], not a tenant
//! token.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::handlers::jobs::JobView;

#[derive(Debug, Serialize)]
pub struct ClusterView {
    pub orchestrator_available: bool,
    pub node_count: usize,
    pub namespace_count: usize,
}

/// `GET /admin/cluster`: a coarse snapshot of orchestrator reachability
/// and scale, used by operators as a quick health check independent of
/// any one tenant's namespace.
pub async fn cluster(_admin: AdminAuth, State(app): State<App>) -> Result<impl IntoResponse, ApiError> {
    if !app.port.is_available() {
        return Ok(Json(ClusterView { orchestrator_available: false, node_count: 0, namespace_count: 0 }));
    }

    let nodes = app.port.list_nodes().await.map_err(ApiError::from)?;
    let namespaces = app.port.list_non_system_namespaces().await.map_err(ApiError::from)?;

    Ok(Json(ClusterView {
        orchestrator_available: true,
        node_count: nodes.len(),
        namespace_count: namespaces.len(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// `GET /admin/jobs`: every job, across all tenants, newest first.
pub async fn jobs(_admin: AdminAuth, State(app): State<App>, Query(q): Query<PageQuery>) -> Result<impl IntoResponse, ApiError> {
    let jobs = sumo_store::list_all_jobs(&app.pool, q.limit, q.offset).await?;
    Ok(Json(jobs.into_iter().map(JobView::from).collect::<Vec<_>>()))
}

#[derive(Debug, Serialize)]
pub struct ActivityEntry {
    pub tenant_id: String,
    pub active_jobs: i64,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub tenants: Vec<ActivityEntry>,
}

/// `GET /admin/activity`: per-tenant active-job counts, the same figure
/// admission checks against `max_concurrent_jobs`.
pub async fn activity(_admin: AdminAuth, State(app): State<App>) -> Result<impl IntoResponse, ApiError> {
    let tenants = sumo_store::list_tenants(&app.pool).await?;
    let mut entries = Vec::with_capacity(tenants.len());
    for tenant in tenants {
        let active_jobs = sumo_store::count_active_jobs(&app.pool, &tenant.tenant_id).await?;
        entries.push(ActivityEntry { tenant_id: tenant.tenant_id, active_jobs });
    }
    Ok(Json(ActivityResponse { tenants: entries }))
}
