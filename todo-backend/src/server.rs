/// HTTP server: spawns axum on a background tokio task.
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::api_router;
use crate::state::AppState;

/// Full application router: API routes, permissive CORS, shared state.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api_router().layer(cors).with_state(state)
}

/// Bind and serve in the background. Returns the bound port, which differs
/// from the configured one when the config asks for port 0.
pub async fn spawn_server(
    state: AppState,
) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
    let bind_addr = state.bind_address.clone();
    let port = state.port;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, port)).await?;
    let actual_port = listener.local_addr()?.port();

    log::info!(
        target: "todo.server",
        "HTTP server listening on http://{}:{}",
        bind_addr,
        actual_port
    );

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!(target: "todo.server", "HTTP server exited with error: {}", e);
        }
    });

    Ok(actual_port)
}
