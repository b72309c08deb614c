use deadpool_postgres::Pool;

use crate::error::Error;

/// Creates the `tenants` and `jobs` tables if absent, and applies any
/// column additions needed by a schema that predates them. Safe to run on
/// every startup.
pub async fn init_schema(pool: &Pool) -> Result<(), Error> {
    let client = pool.get().await?;

    client
        .execute(
            r#"
            CREATE TABLE IF NOT EXISTS tenants (
                tenant_id TEXT PRIMARY KEY,
                namespace TEXT NOT NULL UNIQUE,
                api_token TEXT NOT NULL UNIQUE,
                max_cpu INT NOT NULL,
                max_memory_gi INT NOT NULL,
                max_concurrent_jobs INT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            &[],
        )
        .await?;

    client
        .execute(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                job_id UUID PRIMARY KEY,
                tenant_id TEXT NOT NULL REFERENCES tenants(tenant_id),
                workload_name TEXT NOT NULL,
                namespace TEXT NOT NULL,
                status TEXT NOT NULL,
                scenario_data JSONB NOT NULL,
                cpu_request INT NOT NULL,
                memory_gi INT NOT NULL,
                submitted_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                started_at TIMESTAMPTZ,
                finished_at TIMESTAMPTZ,
                result_location TEXT,
                result_files JSONB
            )
            "#,
            &[],
        )
        .await?;

    client
        .execute("CREATE INDEX IF NOT EXISTS idx_jobs_tenant_id ON jobs (tenant_id)", &[])
        .await?;
    client
        .execute("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status)", &[])
        .await?;

    // Column added after the original rollout; safe to re-run on every start.
    client
        .execute("ALTER TABLE jobs ADD COLUMN IF NOT EXISTS result_files JSONB", &[])
        .await?;

    tracing::info!("store schema initialized");
    Ok(())
}
