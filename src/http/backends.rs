// Backends the route handlers call into.
//
// The router holds trait objects so tests can swap in fakes. The production
// backends read their configuration and build their HTTP clients on every
// call; nothing outlives a request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};

use super::api_error::ApiError;
use crate::config::{CatalogConfig, EnvLookup, ImageConfig};
use crate::core::catalog::{CatalogPayload, CatalogService, RowNormalizer};
use crate::core::images::{
    ImageQuery, ImageReferenceResolver, ImageRelayService, RelayPolicy, RelayedImage,
    TransportEncoding,
};
use crate::infra::google::{GoogleSheetsClient, HttpImageHost, ServiceAccountAuth};

#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn load_catalog(&self) -> Result<CatalogPayload, ApiError>;
}

#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn fetch_image(
        &self,
        query: &ImageQuery,
    ) -> Result<(RelayedImage, TransportEncoding), ApiError>;
}

fn client_builder(timeout: Duration) -> ClientBuilder {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("connector-catalog/", env!("CARGO_PKG_VERSION")))
}

fn client_error(e: reqwest::Error) -> ApiError {
    ApiError::Internal(format!("Failed to build HTTP client: {}", e))
}

// ============================================================================
// CATALOG
// ============================================================================

pub struct EnvCatalogBackend {
    lookup: EnvLookup,
}

impl EnvCatalogBackend {
    pub fn new(lookup: EnvLookup) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl CatalogBackend for EnvCatalogBackend {
    async fn load_catalog(&self) -> Result<CatalogPayload, ApiError> {
        let config = CatalogConfig::from_lookup(&self.lookup)?;
        let client = client_builder(config.upstream_timeout)
            .build()
            .map_err(client_error)?;

        let auth = ServiceAccountAuth::from_source(&config.credentials, client.clone())
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let service = CatalogService::new(
            GoogleSheetsClient::new(client, auth),
            config.spreadsheet_id,
            config.ranges,
            RowNormalizer::new(
                config.column_map,
                ImageReferenceResolver::new(config.proxy_path),
            ),
        );

        Ok(service.load().await?)
    }
}

// ============================================================================
// IMAGES
// ============================================================================

pub struct EnvImageBackend {
    lookup: EnvLookup,
}

impl EnvImageBackend {
    pub fn new(lookup: EnvLookup) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl ImageBackend for EnvImageBackend {
    async fn fetch_image(
        &self,
        query: &ImageQuery,
    ) -> Result<(RelayedImage, TransportEncoding), ApiError> {
        let config = ImageConfig::from_lookup(&self.lookup)?;
        let policy = RelayPolicy::new(config.allowed_hosts);
        let host = HttpImageHost::new(client_builder(config.upstream_timeout), policy.clone())
            .map_err(client_error)?;

        let service = ImageRelayService::new(host, policy);

        let image = service.relay(query).await?;
        Ok((image, config.transport))
    }
}
