// This is the entry point of the connector catalog service.
//
// **Architecture Overview:**
// - `core/` = Business logic (sheet rows to catalog, image references, relay policy)
// - `infra/` = Implementations of core traits (Google Sheets, Drive, HTTP)
// - `http/` = Axum routes and error mapping
//
// This file's job is to:
// 1. Initialize logging and load `.env`
// 2. Wire the backends (dependency injection)
// 3. Start the HTTP server

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "http/http_layer.rs"]
mod http;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use std::sync::Arc;

use crate::http::backends::{EnvCatalogBackend, EnvImageBackend};
use crate::http::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let lookup = config::process_env();
    let port = config::port(&lookup)?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Backends read their configuration per request, so a bad key or sheet id
    // shows up as a 500 on the affected route instead of a startup crash.

    let state = AppState {
        catalog: Arc::new(EnvCatalogBackend::new(lookup.clone())),
        images: Arc::new(EnvImageBackend::new(lookup)),
    };

    http::start_server(state, port).await
}
