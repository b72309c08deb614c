use std::ops::Deref;
use std::sync::Arc;

use deadpool_postgres::Pool;
use sumo_orchestrator::OrchestratorPort;
use sumo_storage_planner::PlannerConfig;
use sumo_types::StorageBackend;

use crate::args::Args;

/// Everything admission needs to know about tenant defaults (new tenants
/// get these quotas unless the registration request overrides them) and
/// the token shape used when minting or regenerating an API key.
#[derive(Debug, Clone)]
pub struct TenantDefaults {
    pub max_cpu: i32,
    pub max_memory_gi: i32,
    pub max_concurrent_jobs: i32,
}

#[derive(Debug, Clone)]
pub struct ApiKeyConfig {
    pub prefix: String,
    pub length: usize,
}

pub struct AppInner {
    pub pool: Pool,
    pub port: Arc<dyn OrchestratorPort>,
    pub planner_cfg: PlannerConfig,
    pub admin_token: String,
    pub tenant_defaults: TenantDefaults,
    pub api_key: ApiKeyConfig,
    pub max_file_size_bytes: usize,
    pub max_job_duration_hours: i64,
    pub result_storage_size_gi: i32,
}

#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl Deref for App {
    type Target = AppInner;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl App {
    pub fn new(pool: Pool, port: Arc<dyn OrchestratorPort>, args: &Args) -> Self {
        let pinned = if args.result_storage_type == "auto" {
            None
        } else {
            args.result_storage_type.parse::<StorageBackend>().ok()
        };

        let planner_cfg = PlannerConfig {
            pinned,
            s3_bucket: args.s3_bucket.clone(),
            s3_region: args.s3_region.clone(),
            gcs_bucket: args.gcs_bucket.clone(),
            azure_storage_account: args.azure_storage_account.clone(),
            azure_container: args.azure_container.clone(),
        };

        Self {
            inner: Arc::new(AppInner {
                pool,
                port,
                planner_cfg,
                admin_token: args.admin_token.clone(),
                tenant_defaults: TenantDefaults {
                    max_cpu: args.default_max_cpu,
                    max_memory_gi: args.default_max_memory_gi,
                    max_concurrent_jobs: args.default_max_concurrent_jobs,
                },
                api_key: ApiKeyConfig { prefix: args.api_key_prefix.clone(), length: args.api_key_length },
                max_file_size_bytes: args.max_file_size_bytes(),
                max_job_duration_hours: args.max_job_duration_hours,
                result_storage_size_gi: args.result_storage_size_gi,
            }),
        }
    }
}
