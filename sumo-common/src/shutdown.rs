use owo_colors::OwoColorize;

/// Resolves when SIGINT or SIGTERM arrives. Wired into every background
/// loop's `tokio::select!` and axum's `with_graceful_shutdown` through a
/// single shared `CancellationToken`.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");

        tokio::select! {
            _ = sigint.recv()  => eprintln!("{}", "stopping: received SIGINT".red()),
            _ = sigterm.recv() => eprintln!("{}", "stopping: received SIGTERM".red()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("install Ctrl+C handler");
    }
}
