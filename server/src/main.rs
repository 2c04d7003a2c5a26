use anyhow::Context;
use feedback_server::api::{self, AppState};
use feedback_server::auth::{CookieSigner, SessionRegistry};
use feedback_server::config::{self, Config};
use feedback_server::storage::{SqliteConnector, StorageManager};
use tokio::net::TcpListener;
use tokio::signal;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    tracing::info!("Starting feedback server");

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(
        environment = ?config.environment,
        database = %config.storage.url,
        "Configuration loaded"
    );

    let storage = StorageManager::new(SqliteConnector::new(config.storage.clone()));

    // Fail fast when the store is unreachable at startup
    if let Err(e) = storage.acquire().await {
        tracing::error!("Storage connection failed: {}", e);
        return Err(e).context("failed to connect to storage");
    }

    let signer = CookieSigner::new(
        &config.session_secret_or_random(),
        config.environment.is_production(),
    )?;
    let state = AppState::new(
        storage.clone(),
        SessionRegistry::default(),
        signer,
        config.environment,
    );
    let app = api::router(state);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    storage.close().await;
    tracing::info!("Server stopped");

    served.context("server error")
}

/// Log to stdout, and additionally to a daily rolling file when
/// `FEEDBACK_LOG_DIR` is set. The returned guard flushes the file writer on
/// drop.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_span_events(FmtSpan::CLOSE);

    match config::get_log_dir() {
        Some(log_dir) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, "feedback-server");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout)
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_line_number(true),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stdout).init();
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
