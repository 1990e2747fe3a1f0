//! Attendance Server
//!
//! Tracks concert and rehearsal attendance for choir members. The member,
//! concert and rehearsal rows are owned by the upstream members and
//! planning services and replicated locally: a full fetch at startup, then
//! a Kafka change feed keeps the replica converged.

use std::net::SocketAddr;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod model;
mod routes;
mod state;
mod sync;
mod upstream;

use config::Config;
use state::AppState;
use sync::{BootstrapSync, ConsumerLoop, Dispatcher, KafkaConsumer};
use upstream::GraphQlClient;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attendance_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Attendance Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Members service: {}", config.upstream.members_url);
    tracing::info!("Planning service: {}", config.upstream.planning_url);
    tracing::info!("Kafka brokers: {}", config.kafka.brokers);

    // Initialize database
    let db_pool = db::create_pool(&config.database.url)
        .await
        .expect("Failed to initialize database");
    tracing::info!("Database initialized at {}", config.database.url);

    let fetcher = GraphQlClient::new(&config.upstream);
    let cancel = CancellationToken::new();

    // One-shot full fetch; runs alongside the consumer loop and converges
    // on the same idempotent upserts.
    let bootstrap = BootstrapSync::new(db_pool.clone(), fetcher.clone());
    let bootstrap_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { bootstrap.run_once(cancel).await })
    };

    // Change-event consumer loop. A broker that cannot even be configured
    // leaves the replica bootstrap-only; the server still comes up.
    let consumer_task = match KafkaConsumer::new(&config.kafka) {
        Ok(consumer) => {
            let dispatcher = Dispatcher::new(db_pool.clone(), fetcher.clone());
            let consumer_loop = ConsumerLoop::new(consumer, dispatcher, &config.sync);
            let cancel = cancel.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = consumer_loop.run(cancel).await {
                    tracing::error!("Consumer loop failed: {}", e);
                }
            }))
        }
        Err(e) => {
            tracing::error!("Failed to create Kafka consumer: {}", e);
            None
        }
    };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app_state = AppState::new(config, db_pool.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], app_state.config().server.port));
    let app = axum::Router::new()
        .nest("/health", routes::health::router())
        .nest("/concerts", routes::attendance::concert_router(db_pool.clone()))
        .nest(
            "/rehearsals",
            routes::attendance::rehearsal_router(db_pool.clone()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // Start server with graceful shutdown
    tracing::info!("Attendance Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Stop the sync tasks once the server is down.
    cancel.cancel();
    if let Some(task) = consumer_task {
        let _ = task.await;
    }
    let _ = bootstrap_task.await;

    tracing::info!("Server shutdown complete");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
