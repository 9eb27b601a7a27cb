use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_compute::http::HttpPool;
use atelier_compute::poll::PollConfig;
use atelier_compute::{JobBackend, JobRouter, JobRouteTracker};
use atelier_core::backoff::RetryPolicy;
use atelier_engine::hosted::{HostedMediaApi, HttpHostedApi};
use atelier_engine::store::{OrchestratorStore, PgStore};
use atelier_engine::throttle::RequestThrottle;
use atelier_engine::{EngineServices, Runner, TriggerScheduler};

use atelier_api::config::ServerConfig;
use atelier_api::router::build_app_router;
use atelier_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_api=debug,atelier_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = atelier_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    atelier_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    atelier_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Background task lifecycle ---
    let cancel = CancellationToken::new();

    // --- Compute routing ---
    let tracker = Arc::new(JobRouteTracker::default());
    let tracker_task = {
        let tracker = Arc::clone(&tracker);
        let cancel = cancel.clone();
        tokio::spawn(async move { tracker.run_eviction(cancel).await })
    };

    let dedicated: Arc<dyn JobBackend> = Arc::new(HttpPool::new(
        config.dedicated_pool_url.clone(),
        config.compute_api_key.clone(),
    ));
    let serverless: Arc<dyn JobBackend> = Arc::new(HttpPool::new(
        config.serverless_pool_url.clone(),
        config.compute_api_key.clone(),
    ));
    let router = Arc::new(JobRouter::new(dedicated, serverless, Arc::clone(&tracker)));

    // --- Per-agency throttle ---
    let throttle = Arc::new(RequestThrottle::new(
        Duration::from_millis(config.min_dispatch_delay_ms),
        Duration::from_secs(5 * 60),
    ));
    let throttle_task = {
        let throttle = Arc::clone(&throttle);
        let cancel = cancel.clone();
        tokio::spawn(async move { throttle.run_eviction(cancel).await })
    };

    // --- Hosted gateway ---
    let hosted: Arc<dyn HostedMediaApi> = Arc::new(HttpHostedApi::new(
        config.hosted_api_url.clone(),
        config.hosted_api_key.clone(),
    ));

    // --- Engine ---
    let store: Arc<dyn OrchestratorStore> = Arc::new(PgStore::new(pool.clone()));
    let services = Arc::new(EngineServices {
        store,
        router,
        throttle: Arc::clone(&throttle),
        hosted,
        retry_policy: RetryPolicy::default(),
        poll: PollConfig::default(),
    });
    let runner = Arc::new(Runner::new(services));
    tracing::info!("Engine assembled");

    // --- Trigger scheduler ---
    let scheduler = TriggerScheduler::new(Arc::clone(&runner));
    let scheduler_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };
    tracing::info!("Trigger scheduler started");

    // --- App state & router ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        runner,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    for (name, task) in [
        ("scheduler", scheduler_task),
        ("tracker", tracker_task),
        ("throttle", throttle_task),
    ] {
        if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
            tracing::warn!(task = name, "Background task did not stop in time");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
