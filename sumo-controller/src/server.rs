//! Router assembly: one `Router` over three auth classes (tenant-bearer,
//! admin-bearer, unauthenticated) sharing a single bind port, mirroring
//! this codebase's public/internal split convention but collapsed onto
//! one listener since every route here shares the same configuration
//! surface.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use sumo_common::access_log;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::handlers::{admin, auth, dashboard, health, jobs};

pub fn router(app: App, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.iter().any(|o| o == "*") {
        sumo_common::cors::dev()
    } else {
        sumo_common::cors::prod(cors_origins)
    };

    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/regenerate-key", post(auth::regenerate_key))
        .route("/auth/tenants", get(auth::list_tenants))
        .route("/auth/tenants/{tenant_id}", get(auth::get_tenant))
        .route("/auth/tenants/{tenant_id}", patch(auth::patch_tenant));

    let admin_routes = Router::new()
        .route("/admin/cluster", get(admin::cluster))
        .route("/admin/jobs", get(admin::jobs))
        .route("/admin/activity", get(admin::activity))
        .layer(axum::middleware::from_fn(access_log::admin));

    let job_routes = Router::new()
        .route("/jobs", post(jobs::submit))
        .route("/jobs/{id}", get(jobs::get))
        .route("/jobs/{id}/logs", get(jobs::logs))
        .route("/jobs/{id}/logs/stream", get(jobs::logs_stream))
        .route("/jobs/{id}/results", get(jobs::results))
        .layer(DefaultBodyLimit::max(app.max_file_size_bytes + 1024 * 1024))
        .layer(axum::middleware::from_fn(access_log::public));

    let tenant_routes = Router::new()
        .route("/tenants/me/dashboard", get(dashboard::dashboard))
        .layer(axum::middleware::from_fn(access_log::public));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready));

    Router::new()
        .merge(auth_routes)
        .merge(admin_routes)
        .merge(job_routes)
        .merge(tenant_routes)
        .merge(health_routes)
        .layer(sumo_common::metrics::MetricsLayer)
        .layer(axum::middleware::from_fn(sumo_common::extract_context))
        .layer(cors)
        .with_state(app)
}

pub async fn serve(app: App, bind_port: u16, cors_origins: &[String], cancel: CancellationToken) -> anyhow::Result<()> {
    let router = router(app, cors_origins);
    let addr = format!("0.0.0.0:{bind_port}");
    let listener = TcpListener::bind(&addr).await?;

    use owo_colors::OwoColorize;
    println!("{}", format!("sumo-controller listening on {addr}").green());

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
