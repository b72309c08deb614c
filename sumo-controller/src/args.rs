use clap::Parser;
use sumo_common::args::PostgresArgs;

/// Every runtime knob this binary reads, per §6 of the design: size
/// limits, deadlines, pool bounds, tenant defaults, token shape, storage
/// selection, CORS, and the bind address. All `env`-backed so an operator
/// can run this purely off environment variables in a container.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "multi-tenant SUMO simulation job controller")]
pub struct Args {
    #[command(flatten)]
    pub postgres: PostgresArgs,

    #[arg(long, env = "BIND_PORT", default_value_t = 8080)]
    pub bind_port: u16,

    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Bearer token guarding `/auth/register` and every `/admin/*` route.
    /// Out of scope per the design (token *issuance* is an external
    /// concern); this binary only checks a single operator-configured
    /// shared secret.
    #[arg(long, env = "ADMIN_TOKEN", required = true)]
    pub admin_token: String,

    #[arg(long, env = "MAX_FILE_SIZE_MB", default_value_t = 100)]
    pub max_file_size_mb: u64,

    #[arg(long, env = "RESULT_STORAGE_SIZE_GI", default_value_t = 10)]
    pub result_storage_size_gi: i32,

    #[arg(long, env = "MAX_JOB_DURATION_HOURS", default_value_t = 24)]
    pub max_job_duration_hours: i64,

    #[arg(long, env = "CONFIGMAP_CLEANUP_DELAY_SECONDS", default_value_t = 300)]
    pub configmap_cleanup_delay_seconds: u64,

    #[arg(long, env = "DEFAULT_MAX_CPU", default_value_t = 10)]
    pub default_max_cpu: i32,

    #[arg(long, env = "DEFAULT_MAX_MEMORY_GI", default_value_t = 20)]
    pub default_max_memory_gi: i32,

    #[arg(long, env = "DEFAULT_MAX_CONCURRENT_JOBS", default_value_t = 2)]
    pub default_max_concurrent_jobs: i32,

    #[arg(long, env = "API_KEY_PREFIX", default_value = "sk-")]
    pub api_key_prefix: String,

    #[arg(long, env = "API_KEY_LENGTH", default_value_t = 32)]
    pub api_key_length: usize,

    /// `auto`, `volume`, `s3`, `gcs`, or `azure`.
    #[arg(long, env = "RESULT_STORAGE_TYPE", default_value = "auto")]
    pub result_storage_type: String,

    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,

    #[arg(long, env = "GCS_BUCKET")]
    pub gcs_bucket: Option<String>,

    #[arg(long, env = "AZURE_STORAGE_ACCOUNT")]
    pub azure_storage_account: Option<String>,

    #[arg(long, env = "AZURE_CONTAINER")]
    pub azure_container: Option<String>,

    /// Comma-separated allow-list; `*` (the default) is permissive dev CORS.
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn max_file_size_bytes(&self) -> usize {
        (self.max_file_size_mb as usize) * 1024 * 1024
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
    }
}
