// Environment configuration.
//
// Handlers build their configuration on every request from a key lookup.
// Production passes `std::env::var` (after `dotenv` has loaded `.env`); tests
// pass a closure over a fixed map so they never touch the process environment.
//
// **Catalog:**
// - `GOOGLE_SERVICE_ACCOUNT_KEY` - path to the service account JSON key
//   OR
// - `GOOGLE_SERVICE_ACCOUNT_JSON` - the key content itself
// - `GOOGLE_SHEET_ID` - spreadsheet id (required)
// - `CATALOG_PRIMARY_RANGE` - inventory range (default `Inventory!A2:Z`)
// - `CATALOG_PIN_RANGE` - pin count options (default `Options!A2:A`)
// - `CATALOG_MANUFACTURER_RANGE` - manufacturer options (default `Options!B2:B`)
// - `CATALOG_TERM_SIZE_RANGE` - terminal size options (optional)
// - `CATALOG_COLUMN_MAP` - path to a column map TOML (optional)
//
// **Images:**
// - `IMAGE_PROXY_PATH` - route picture references point at (default `/api/image`)
// - `IMAGE_ALLOWED_HOSTS` - comma-separated hosts `url=` may reach
// - `IMAGE_TRANSPORT_ENCODING` - `binary` (default) or `base64`
//
// **Shared:**
// - `UPSTREAM_TIMEOUT_SECS` - outbound request timeout (default 10)
// - `PORT` - listen port (default 8888)

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::core::catalog::{CatalogRanges, ColumnMap, ColumnMapError};
use crate::core::images::image_reference::DEFAULT_PROXY_PATH;
use crate::core::images::{TransportEncoding, DEFAULT_ALLOWED_HOSTS};
use crate::infra::google::CredentialsSource;

/// Looks up one configuration key. Empty values count as unset.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub fn process_env() -> EnvLookup {
    Arc::new(|key: &str| std::env::var(key).ok())
}

const DEFAULT_PRIMARY_RANGE: &str = "Inventory!A2:Z";
const DEFAULT_PIN_RANGE: &str = "Options!A2:A";
const DEFAULT_MANUFACTURER_RANGE: &str = "Options!B2:B";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PORT: u16 = 8888;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error(transparent)]
    ColumnMap(#[from] ColumnMapError),
}

fn get(lookup: &EnvLookup, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn get_or(lookup: &EnvLookup, key: &str, default: &str) -> String {
    get(lookup, key).unwrap_or_else(|| default.to_string())
}

fn upstream_timeout(lookup: &EnvLookup) -> Result<Duration, ConfigError> {
    match get(lookup, "UPSTREAM_TIMEOUT_SECS") {
        None => Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::Invalid {
                key: "UPSTREAM_TIMEOUT_SECS",
                value: raw,
                reason: "expected a positive number of seconds",
            }),
        },
    }
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub credentials: CredentialsSource,
    pub spreadsheet_id: String,
    pub ranges: CatalogRanges,
    pub column_map: ColumnMap,
    pub proxy_path: String,
    pub upstream_timeout: Duration,
}

impl CatalogConfig {
    pub fn from_lookup(lookup: &EnvLookup) -> Result<Self, ConfigError> {
        let credentials = if let Some(path) = get(lookup, "GOOGLE_SERVICE_ACCOUNT_KEY") {
            CredentialsSource::KeyFile(path)
        } else if let Some(json) = get(lookup, "GOOGLE_SERVICE_ACCOUNT_JSON") {
            CredentialsSource::Json(json)
        } else {
            return Err(ConfigError::Missing(
                "Neither GOOGLE_SERVICE_ACCOUNT_KEY nor GOOGLE_SERVICE_ACCOUNT_JSON is set",
            ));
        };

        let spreadsheet_id =
            get(lookup, "GOOGLE_SHEET_ID").ok_or(ConfigError::Missing("GOOGLE_SHEET_ID is not set"))?;

        let column_map = match get(lookup, "CATALOG_COLUMN_MAP") {
            Some(path) => ColumnMap::from_file(path)?,
            None => ColumnMap::default(),
        };

        Ok(Self {
            credentials,
            spreadsheet_id,
            ranges: CatalogRanges {
                primary: get_or(lookup, "CATALOG_PRIMARY_RANGE", DEFAULT_PRIMARY_RANGE),
                pin_counts: get_or(lookup, "CATALOG_PIN_RANGE", DEFAULT_PIN_RANGE),
                manufacturers: get_or(
                    lookup,
                    "CATALOG_MANUFACTURER_RANGE",
                    DEFAULT_MANUFACTURER_RANGE,
                ),
                term_sizes: get(lookup, "CATALOG_TERM_SIZE_RANGE"),
            },
            column_map,
            proxy_path: get_or(lookup, "IMAGE_PROXY_PATH", DEFAULT_PROXY_PATH),
            upstream_timeout: upstream_timeout(lookup)?,
        })
    }
}

// ============================================================================
// IMAGES
// ============================================================================

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub allowed_hosts: Vec<String>,
    pub transport: TransportEncoding,
    pub upstream_timeout: Duration,
}

impl ImageConfig {
    pub fn from_lookup(lookup: &EnvLookup) -> Result<Self, ConfigError> {
        let allowed_hosts = match get(lookup, "IMAGE_ALLOWED_HOSTS") {
            Some(raw) => raw.split(',').map(|h| h.trim().to_string()).collect(),
            None => DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect(),
        };

        let transport = match get(lookup, "IMAGE_TRANSPORT_ENCODING") {
            None => TransportEncoding::default(),
            Some(raw) => TransportEncoding::parse(&raw).ok_or(ConfigError::Invalid {
                key: "IMAGE_TRANSPORT_ENCODING",
                value: raw,
                reason: "expected 'binary' or 'base64'",
            })?,
        };

        Ok(Self {
            allowed_hosts,
            transport,
            upstream_timeout: upstream_timeout(lookup)?,
        })
    }
}

// ============================================================================
// SERVER
// ============================================================================

pub fn port(lookup: &EnvLookup) -> Result<u16, ConfigError> {
    match get(lookup, "PORT") {
        None => Ok(DEFAULT_PORT),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            key: "PORT",
            value: raw,
            reason: "expected a port number",
        }),
    }
}

#[cfg(test)]
pub(crate) fn lookup_from(pairs: &[(&str, &str)]) -> EnvLookup {
    let map: std::collections::HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Arc::new(move |key: &str| map.get(key).cloned())
}
