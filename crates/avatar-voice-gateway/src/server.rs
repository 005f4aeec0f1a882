//! Axum-based HTTP server.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use avatar_voice_core::protocol::{DELETE_PATH, SAY_PATH};

use crate::handlers;
use crate::state::GatewayState;

/// Build the gateway router.
///
/// CORS is open so browser clients on other origins can read `X-TTS-Filename`.
pub fn router(state: Arc<GatewayState>) -> Router {
    let app = Router::new()
        .route(SAY_PATH, get(handlers::say))
        .route(DELETE_PATH, post(handlers::delete_tts))
        .route("/health", get(handlers::health));

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(handlers::metrics));

    app.layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Start the gateway and serve until Ctrl+C.
pub async fn start_gateway(state: Arc<GatewayState>, port: u16) -> anyhow::Result<()> {
    let bind_addr = state.config.gateway_bind();
    info!(
        upstream = %state.upstream.url(),
        tts_dir = %state.tts_dir.display(),
        "Starting gateway"
    );

    let app = router(state);

    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
