//! `GET /tenants/me/dashboard`: a tenant's own quota, usage, and recent
//! job history in one response.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::auth::AuthenticatedTenant;
use crate::error::ApiError;
use crate::handlers::jobs::JobView;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub tenant_id: String,
    pub max_cpu: i32,
    pub max_memory_gi: i32,
    pub max_concurrent_jobs: i32,
    pub active_jobs: i64,
    pub recent_jobs: Vec<JobView>,
}

pub async fn dashboard(
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    State(app): State<App>,
    Query(q): Query<DashboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let active_jobs = sumo_store::count_active_jobs(&app.pool, &tenant.tenant_id).await?;
    let recent = sumo_store::list_jobs_for_tenant(&app.pool, &tenant.tenant_id, q.limit, q.offset).await?;

    Ok(Json(DashboardResponse {
        tenant_id: tenant.tenant_id,
        max_cpu: tenant.max_cpu,
        max_memory_gi: tenant.max_memory_gi,
        max_concurrent_jobs: tenant.max_concurrent_jobs,
        active_jobs,
        recent_jobs: recent.into_iter().map(JobView::from).collect(),
    }))
}
