//! `/auth/*`: tenant registration, key regeneration, and tenant
//! read/update. Registration and regeneration are the only two operations
//! that ever return `api_token` on the wire (§3 row-to-wire projection).

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use sumo_types::Tenant;

use crate::app::App;
use crate::auth::AdminAuth;
use crate::error::ApiError;

fn generate_token(prefix: &str, length: usize) -> String {
    let body: String = rand::rng().sample_iter(&Alphanumeric).take(length).map(char::from).collect();
    format!("{prefix}{body}")
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub tenant_id: String,
    pub max_cpu: Option<i32>,
    pub max_memory_gi: Option<i32>,
    pub max_concurrent_jobs: Option<i32>,
}

/// Tenant projection that still carries `api_token`, used only by
/// `register` and `regenerate_key`.
#[derive(Debug, Serialize)]
pub struct TenantWithToken {
    pub tenant_id: String,
    pub namespace: String,
    pub api_token: String,
    pub max_cpu: i32,
    pub max_memory_gi: i32,
    pub max_concurrent_jobs: i32,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<Tenant> for TenantWithToken {
    fn from(t: Tenant) -> Self {
        Self {
            tenant_id: t.tenant_id,
            namespace: t.namespace,
            api_token: t.api_token,
            max_cpu: t.max_cpu,
            max_memory_gi: t.max_memory_gi,
            max_concurrent_jobs: t.max_concurrent_jobs,
            created_at: t.created_at,
        }
    }
}

/// Public tenant projection: no `api_token`.
#[derive(Debug, Serialize)]
pub struct TenantView {
    pub tenant_id: String,
    pub namespace: String,
    pub max_cpu: i32,
    pub max_memory_gi: i32,
    pub max_concurrent_jobs: i32,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<Tenant> for TenantView {
    fn from(t: Tenant) -> Self {
        Self {
            tenant_id: t.tenant_id,
            namespace: t.namespace,
            max_cpu: t.max_cpu,
            max_memory_gi: t.max_memory_gi,
            max_concurrent_jobs: t.max_concurrent_jobs,
            created_at: t.created_at,
        }
    }
}

/// `POST /auth/register`, admin-gated. Validates the tenant id, derives
/// its namespace, mints a token, provisions cluster isolation, and
/// persists the row.
pub async fn register(
    _admin: AdminAuth,
    State(app): State<App>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.tenant_id.is_empty() || req.tenant_id.len() > 100 {
        return Err(ApiError::invalid_input("tenant_id must be 1-100 characters"));
    }

    let tenant = Tenant {
        tenant_id: req.tenant_id.clone(),
        namespace: Tenant::derive_namespace(&req.tenant_id),
        api_token: generate_token(&app.api_key.prefix, app.api_key.length),
        max_cpu: req.max_cpu.unwrap_or(app.tenant_defaults.max_cpu),
        max_memory_gi: req.max_memory_gi.unwrap_or(app.tenant_defaults.max_memory_gi),
        max_concurrent_jobs: req.max_concurrent_jobs.unwrap_or(app.tenant_defaults.max_concurrent_jobs),
        created_at: Utc::now(),
    };

    let inserted = sumo_store::insert_tenant(&app.pool, &tenant).await?;

    sumo_provisioner::ensure_tenant_isolation(app.port.as_ref(), &inserted, app.result_storage_size_gi)
        .await
        .map_err(ApiError::from)?;

    Ok((axum::http::StatusCode::CREATED, Json(TenantWithToken::from(inserted))))
}

#[derive(Debug, Deserialize)]
pub struct RegenerateKeyRequest {
    pub tenant_id: String,
}

/// `POST /auth/regenerate-key`, admin-gated.
pub async fn regenerate_key(
    _admin: AdminAuth,
    State(app): State<App>,
    Json(req): Json<RegenerateKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_token = generate_token(&app.api_key.prefix, app.api_key.length);
    let updated = sumo_store::regenerate_token(&app.pool, &req.tenant_id, &new_token).await?;
    if !updated {
        return Err(ApiError::not_found(format!("tenant {} not found", req.tenant_id)));
    }
    let tenant = sumo_store::get_tenant(&app.pool, &req.tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("tenant {} not found", req.tenant_id)))?;
    Ok(Json(TenantWithToken::from(tenant)))
}

/// `GET /auth/tenants`, admin-gated: every tenant, token omitted.
pub async fn list_tenants(_admin: AdminAuth, State(app): State<App>) -> Result<impl IntoResponse, ApiError> {
    let tenants = sumo_store::list_tenants(&app.pool).await?;
    Ok(Json(tenants.into_iter().map(TenantView::from).collect::<Vec<_>>()))
}

/// `GET /auth/tenants/:tenant_id`, admin-gated.
pub async fn get_tenant(
    _admin: AdminAuth,
    State(app): State<App>,
    Path(tenant_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = sumo_store::get_tenant(&app.pool, &tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("tenant {tenant_id} not found")))?;
    Ok(Json(TenantView::from(tenant)))
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchTenantRequest {
    pub max_cpu: Option<i32>,
    pub max_memory_gi: Option<i32>,
    pub max_concurrent_jobs: Option<i32>,
}

/// `PATCH /auth/tenants/:tenant_id`, admin-gated. Any changed limit
/// re-runs `ensure_tenant_isolation` so the cluster quota/limit range
/// patches in the same request (§4.3: called "at every limit update").
pub async fn patch_tenant(
    _admin: AdminAuth,
    State(app): State<App>,
    Path(tenant_id): Path<String>,
    Json(req): Json<PatchTenantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.max_cpu.is_none() && req.max_memory_gi.is_none() && req.max_concurrent_jobs.is_none() {
        return Err(ApiError::invalid_input("no fields to update"));
    }

    let mut tenant = sumo_store::get_tenant(&app.pool, &tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("tenant {tenant_id} not found")))?;

    if let Some(v) = req.max_cpu {
        tenant.max_cpu = v;
    }
    if let Some(v) = req.max_memory_gi {
        tenant.max_memory_gi = v;
    }
    if let Some(v) = req.max_concurrent_jobs {
        tenant.max_concurrent_jobs = v;
    }

    sumo_store::update_tenant_limits(&app.pool, &tenant_id, tenant.max_cpu, tenant.max_memory_gi, tenant.max_concurrent_jobs)
        .await?;

    sumo_provisioner::ensure_tenant_isolation(app.port.as_ref(), &tenant, app.result_storage_size_gi)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(TenantView::from(tenant)))
}
