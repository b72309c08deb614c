use clap::Args;

/// Connection arguments for the state store's Postgres backend.
///
/// Mirrors the flattened argument-group convention used elsewhere in this
/// codebase for grouping a backend's connection knobs under one `#[command(flatten)]`.
#[derive(Args, Debug, Clone)]
pub struct PostgresArgs {
    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    pub postgres_host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    #[arg(long, env = "POSTGRES_DATABASE", default_value = "sumo_controller")]
    pub postgres_database: String,

    #[arg(long, env = "POSTGRES_USERNAME", default_value = "postgres")]
    pub postgres_username: String,

    #[arg(long, env = "POSTGRES_PASSWORD")]
    pub postgres_password: Option<String>,

    /// PEM-encoded CA certificate bundle; when set, the pool connects over TLS.
    #[arg(long, env = "POSTGRES_CA_CERT")]
    pub postgres_ca_cert: Option<String>,

    #[arg(long, env = "DB_POOL_MIN", default_value_t = 2)]
    pub db_pool_min: usize,

    #[arg(long, env = "DB_POOL_MAX", default_value_t = 10)]
    pub db_pool_max: usize,
}
