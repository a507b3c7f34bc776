// HTTP layer - routes, shared state and the server loop.
//
// Routes:
// - GET /api/catalog  -> Catalog Reader
// - GET /api/image    -> Image Resolver
// - GET /health       -> liveness
//
// Any other method on these paths gets a 405 from the method router.

#[path = "api_error.rs"]
pub mod api_error;
#[path = "backends.rs"]
pub mod backends;
#[path = "catalog_routes.rs"]
pub mod catalog_routes;
#[path = "image_routes.rs"]
pub mod image_routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use hyper::Server;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use backends::{CatalogBackend, ImageBackend};

/// Shared by every handler. Only holds the backends; they build their own
/// per-request context.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogBackend>,
    pub images: Arc<dyn ImageBackend>,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "connector-catalog",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/catalog", get(catalog_routes::get_catalog))
        .route("/api/image", get(image_routes::get_image))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Catalog service listening on http://{}", addr);
    tracing::info!("  GET /api/catalog");
    tracing::info!("  GET /api/image?id=<file id>|url=<image url>");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
