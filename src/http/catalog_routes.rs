use std::time::Instant;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::AppState;

/// GET /api/catalog
pub async fn get_catalog(State(state): State<AppState>) -> Response {
    let started = Instant::now();

    match state.catalog.load_catalog().await {
        Ok(payload) => {
            tracing::info!(
                items = payload.items.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Served catalog"
            );
            Json(payload).into_response()
        }
        Err(e) => e.into_response(),
    }
}
