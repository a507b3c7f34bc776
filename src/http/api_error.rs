// Maps core errors onto HTTP responses.
//
// Every error body is `{ "error": "<message>" }`. Upstream image failures also
// carry `upstreamStatus` so the caller can tell a missing file (404) from a
// Drive outage.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::core::catalog::CatalogError;
use crate::core::images::RelayError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Catalog(#[from] CatalogError),
    #[error("{0}")]
    Relay(#[from] RelayError),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Config(_) | ApiError::Catalog(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Relay(err) => match err {
                RelayError::MissingParameter
                | RelayError::InvalidId(_)
                | RelayError::InvalidUrl(_)
                | RelayError::UnsupportedScheme(_) => StatusCode::BAD_REQUEST,
                RelayError::HostNotAllowed(_) => StatusCode::FORBIDDEN,
                RelayError::Upstream { .. } | RelayError::Unavailable(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
        }
    }

    fn upstream_status(&self) -> Option<u16> {
        match self {
            ApiError::Relay(RelayError::Upstream { status }) => Some(*status),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{}", self);
        } else {
            tracing::warn!(status = status.as_u16(), "{}", self);
        }

        let body = match self.upstream_status() {
            Some(upstream) => json!({ "error": self.to_string(), "upstreamStatus": upstream }),
            None => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::images::ImageHostError;

    #[test]
    fn relay_errors_map_to_client_and_gateway_statuses() {
        let cases = [
            (RelayError::MissingParameter, StatusCode::BAD_REQUEST),
            (
                RelayError::UnsupportedScheme("ftp".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                RelayError::HostNotAllowed("evil.test".into()),
                StatusCode::FORBIDDEN,
            ),
            (RelayError::Upstream { status: 404 }, StatusCode::BAD_GATEWAY),
            (
                RelayError::Unavailable(ImageHostError("timeout".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn config_errors_are_server_errors() {
        let err = ApiError::from(ConfigError::Missing("GOOGLE_SHEET_ID is not set"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("GOOGLE_SHEET_ID"));
    }
}
