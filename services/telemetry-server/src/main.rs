use std::env;
use telemetry_server::state::AppState;
use telemetry_server::vector_store::VectorStore;
use telemetry_server::{db, windowing};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    let qdrant_url = env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".to_owned());
    let collection = env::var("QDRANT_COLLECTION").unwrap_or_else(|_| "fireline_windows".to_owned());

    info!("connecting to database...");
    let pool = db::create_pool(&database_url).await;
    db::run_migrations(&pool).await;
    info!("migrations applied");

    info!(url = %qdrant_url, "connecting to vector store...");
    let qdrant = qdrant_client::Qdrant::from_url(&qdrant_url)
        .build()
        .expect("failed to build qdrant client");
    let vectors = VectorStore::new(qdrant, collection);
    vectors
        .ensure_collection()
        .await
        .expect("failed to ensure vector collection exists");

    let (windowing_handle, mut closed_windows) = windowing::spawn_windowing_engine();

    let state = AppState::new(pool, vectors, windowing_handle);

    // Drains closed windows off the Windowing Engine and persists them,
    // keeping the engine itself free of qdrant-specific types.
    let sink_state = state.clone();
    tokio::spawn(async move {
        while let Some(window) = closed_windows.recv().await {
            let payload = telemetry_server::vector_store::WindowPayload {
                session_id: window.session_id,
                bucket_start: window.bucket_start.to_rfc3339(),
                label: None,
                foot_count: window.foot_count,
                accel_count: window.accel_count,
            };
            if let Err(e) = sink_state
                .vectors
                .upsert(window.point_id, &window.vector, payload)
                .await
            {
                tracing::error!(error = %e, "failed to persist window");
            }
        }
    });

    let router = telemetry_server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %bind_addr, "telemetry-server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    info!("telemetry-server shut down gracefully");
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
