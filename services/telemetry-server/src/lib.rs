pub mod db;
pub mod http;
pub mod session_registry;
pub mod socketio_ingress;
pub mod state;
pub mod vector_store;
pub mod windowing;

use axum::routing::{get, post};
use axum::Router;
use socketioxide::SocketIo;
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let (socket_layer, io) = SocketIo::builder().build_layer();
    socketio_ingress::register(&io, state.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(http::health::health))
        .route(
            "/api/sessions",
            post(http::sessions::create_session).get(http::sessions::list_sessions),
        )
        .route(
            "/api/sessions/:id",
            get(http::sessions::get_session)
                .put(http::sessions::update_session)
                .delete(http::sessions::delete_session),
        )
        .route("/api/sessions/:id/stop", post(http::sessions::stop_session))
        .route("/api/sessions/:id/export", get(http::export::export))
        .route("/api/query/similar", post(http::query::similar))
        .layer(socket_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
