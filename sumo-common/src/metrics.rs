use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::MatchedPath;
use axum::http::Request;
use axum::response::Response;
use metrics_exporter_prometheus::PrometheusBuilder;
use owo_colors::OwoColorize;
use tower::{Layer, Service};

/// Installs the Prometheus recorder and binds `/metrics` on `port`, if set.
/// A missing port disables metrics entirely rather than defaulting to one --
/// operators who don't ask for metrics shouldn't get a surprise open socket.
pub fn maybe_spawn_metrics_server(port: Option<u16>) {
    let Some(port) = port else {
        return;
    };
    tokio::spawn(run_metrics_server(port));
}

async fn run_metrics_server(port: u16) {
    let builder = PrometheusBuilder::new();
    let handle = match builder.install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{}", format!("metrics: failed to install recorder: {e}").red());
            return;
        }
    };

    let app = axum::Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("{}", format!("metrics: failed to bind {addr}: {e}").red());
            return;
        }
    };
    println!("{}", format!("metrics listening on {addr}").green());
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("{}", format!("metrics server exited: {e}").red());
    }
}

/// Tower layer recording request count and latency histograms labeled by
/// matched route and status code.
#[derive(Clone, Default)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for MetricsService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_owned())
            .unwrap_or_else(|| req.uri().path().to_owned());
        let method = req.method().to_string();
        let start = Instant::now();

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let result = inner.call(req).await;
            let elapsed = start.elapsed().as_secs_f64();
            if let Ok(resp) = &result {
                let status = resp.status().as_u16().to_string();
                metrics::counter!(
                    "http_requests_total",
                    "method" => method.clone(),
                    "path" => path.clone(),
                    "status" => status
                )
                .increment(1);
            }
            metrics::histogram!(
                "http_request_duration_seconds",
                "method" => method,
                "path" => path
            )
            .record(elapsed);
            result
        })
    }
}
