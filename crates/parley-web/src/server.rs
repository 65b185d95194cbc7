//! Axum server setup and router construction.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use parley::gateway::Gateway;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api::{self, AppState};

/// Build the full axum router serving the REST API at `/api/*`.
pub fn build_router(gateway: Arc<Gateway>) -> Router {
    let app_state = AppState { gateway };

    // Browser front ends are usually served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/conversations",
            post(api::create_conversation).get(api::list_conversations),
        )
        .route(
            "/api/conversations/{id}",
            get(api::get_conversation).delete(api::delete_conversation),
        )
        .route("/api/conversations/{id}/turn", post(api::post_turn))
        .route("/api/provider/connect", post(api::connect_provider))
        .route("/api/provider/disconnect", post(api::disconnect_provider))
        .route("/api/tools", get(api::list_tools))
        .route("/api/health", get(api::health))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind, spawn the server and return the bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;
    info!("Listening on http://{addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Web server stopped: {e}");
        }
    });

    Ok(addr)
}
