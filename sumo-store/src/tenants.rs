use deadpool_postgres::Pool;
use sumo_types::Tenant;
use tokio_postgres::Row;

use crate::error::Error;

fn from_row(row: Row) -> Tenant {
    Tenant {
        tenant_id: row.get("tenant_id"),
        namespace: row.get("namespace"),
        api_token: row.get("api_token"),
        max_cpu: row.get("max_cpu"),
        max_memory_gi: row.get("max_memory_gi"),
        max_concurrent_jobs: row.get("max_concurrent_jobs"),
        created_at: row.get("created_at"),
    }
}

const COLUMNS: &str =
    "tenant_id, namespace, api_token, max_cpu, max_memory_gi, max_concurrent_jobs, created_at";

/// Registers a tenant. Fails with `Error::TenantExists` if the id is
/// already taken, mirroring the `UNIQUE` constraint on `tenant_id`.
pub async fn insert_tenant(pool: &Pool, tenant: &Tenant) -> Result<Tenant, Error> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                r#"
                INSERT INTO tenants (tenant_id, namespace, api_token, max_cpu, max_memory_gi, max_concurrent_jobs, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (tenant_id) DO NOTHING
                RETURNING {COLUMNS}
                "#
            ),
            &[
                &tenant.tenant_id,
                &tenant.namespace,
                &tenant.api_token,
                &tenant.max_cpu,
                &tenant.max_memory_gi,
                &tenant.max_concurrent_jobs,
                &tenant.created_at,
            ],
        )
        .await?;

    match row {
        Some(row) => Ok(from_row(row)),
        None => Err(Error::TenantExists(tenant.tenant_id.clone())),
    }
}

pub async fn get_tenant(pool: &Pool, tenant_id: &str) -> Result<Option<Tenant>, Error> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!("SELECT {COLUMNS} FROM tenants WHERE tenant_id = $1"),
            &[&tenant_id],
        )
        .await?;
    Ok(row.map(from_row))
}

pub async fn get_tenant_by_token(pool: &Pool, api_token: &str) -> Result<Option<Tenant>, Error> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!("SELECT {COLUMNS} FROM tenants WHERE api_token = $1"),
            &[&api_token],
        )
        .await?;
    Ok(row.map(from_row))
}

pub async fn list_tenants(pool: &Pool) -> Result<Vec<Tenant>, Error> {
    let client = pool.get().await?;
    let rows = client
        .query(&format!("SELECT {COLUMNS} FROM tenants ORDER BY created_at ASC"), &[])
        .await?;
    Ok(rows.into_iter().map(from_row).collect())
}

/// Swaps a tenant's API token, e.g. after a `regenerate-key` request.
/// Returns `false` if the tenant does not exist.
pub async fn regenerate_token(pool: &Pool, tenant_id: &str, new_token: &str) -> Result<bool, Error> {
    let client = pool.get().await?;
    let rows = client
        .execute(
            "UPDATE tenants SET api_token = $2 WHERE tenant_id = $1",
            &[&tenant_id, &new_token],
        )
        .await?;
    Ok(rows > 0)
}

/// Patches a tenant's quota fields, e.g. after an admin limit update.
/// Returns `false` if the tenant does not exist.
pub async fn update_tenant_limits(
    pool: &Pool,
    tenant_id: &str,
    max_cpu: i32,
    max_memory_gi: i32,
    max_concurrent_jobs: i32,
) -> Result<bool, Error> {
    let client = pool.get().await?;
    let rows = client
        .execute(
            "UPDATE tenants SET max_cpu = $2, max_memory_gi = $3, max_concurrent_jobs = $4 WHERE tenant_id = $1",
            &[&tenant_id, &max_cpu, &max_memory_gi, &max_concurrent_jobs],
        )
        .await?;
    Ok(rows > 0)
}

/// Number of jobs currently PENDING or RUNNING for a tenant, used at
/// admission time to enforce `max_concurrent_jobs`.
pub async fn count_active_jobs(pool: &Pool, tenant_id: &str) -> Result<i64, Error> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            "SELECT COUNT(*) AS n FROM jobs WHERE tenant_id = $1 AND status IN ('PENDING', 'RUNNING')",
            &[&tenant_id],
        )
        .await?;
    Ok(row.get("n"))
}
