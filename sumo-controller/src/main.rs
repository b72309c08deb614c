mod app;
mod args;
mod auth;
mod error;
mod handlers;
mod server;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use owo_colors::OwoColorize;
use sumo_orchestrator::{KubeClientPort, OrchestratorPort};
use sumo_reconciler::ReconcilerConfig;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sumo_common::init();

    let args = Args::parse();
    if std::env::var("RUST_LOG").is_err() {
        // SAFETY: single-threaded at this point, before any other task is spawned.
        unsafe { std::env::set_var("RUST_LOG", &args.log_level) };
    }
    tracing_subscriber::fmt::init();

    println!("{}", "sumo-controller starting".green());

    let pool = sumo_common::postgres::create_pool(args.postgres.clone()).await;
    sumo_store::init_schema(&pool).await?;

    let port: Arc<dyn OrchestratorPort> = Arc::new(KubeClientPort::connect().await);
    if !port.is_available() {
        println!("{}", "orchestrator unavailable: starting in degraded mode".yellow());
    }

    let app = App::new(pool.clone(), port.clone(), &args);

    sumo_common::metrics::maybe_spawn_metrics_server(args.metrics_port);

    let cancel = CancellationToken::new();

    let recon_cfg = ReconcilerConfig {
        configmap_cleanup_delay: Duration::from_secs(args.configmap_cleanup_delay_seconds),
        ..ReconcilerConfig::default()
    };
    let reconciler = tokio::spawn(sumo_reconciler::run(
        pool.clone(),
        port.clone(),
        app.planner_cfg.clone(),
        recon_cfg,
        cancel.clone(),
    ));

    let shutdown_cancel = cancel.clone();
    let shutdown = tokio::spawn(async move {
        sumo_common::shutdown::shutdown_signal().await;
        shutdown_cancel.cancel();
    });

    let server_cancel = cancel.clone();
    let cors_origins = args.cors_origin_list();
    server::serve(app, args.bind_port, &cors_origins, server_cancel).await?;

    cancel.cancel();
    let _ = reconciler.await;
    let _ = shutdown.await;

    println!("{}", "sumo-controller stopped".green());
    Ok(())
}
