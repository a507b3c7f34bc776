use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use super::AppState;
use crate::core::images::{ImageQuery, TransportEncoding, CACHE_CONTROL};

/// GET /api/image?id=<drive file id> or /api/image?url=<http(s) url>
pub async fn get_image(State(state): State<AppState>, Query(query): Query<ImageQuery>) -> Response {
    let (image, encoding) = match state.images.fetch_image(&query).await {
        Ok(result) => result,
        Err(e) => return e.into_response(),
    };

    let content_type = HeaderValue::from_str(&image.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    tracing::info!(
        content_type = %image.content_type,
        bytes = image.bytes.len(),
        "Relayed image"
    );

    let mut response = (StatusCode::OK, image.encode(encoding)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    if encoding == TransportEncoding::Base64 {
        headers.insert(
            "content-transfer-encoding",
            HeaderValue::from_static("base64"),
        );
    }

    response
}
