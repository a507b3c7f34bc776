// Image relay - fetches an image from an upstream host and hands it back
// unchanged.
//
// The relay is the only place this service makes a request to a URL that came
// from a caller, so all the input checking happens here:
//
// - `id` must look like a Drive file id and is fetched from Drive.
// - `url` must be http(s). Drive links are reduced to their file id; any other
//   URL must be on the allow-list.
//
// Upstream failures are reported, never papered over with a placeholder.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Url;
use thiserror::Error;

use super::image_reference::{extract_file_id, is_drive_reference, is_valid_file_id};

/// Where a Drive file id is downloaded from.
pub const DRIVE_DOWNLOAD_URL: &str = "https://drive.google.com/uc?export=download&id=";

/// Sent when the upstream doesn't say what it returned.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Images are immutable per id/url, so caches may keep them for a year.
pub const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Hosts a Drive download may redirect through, whatever the allow-list says.
pub const DRIVE_DOWNLOAD_HOSTS: [&str; 2] = ["drive.google.com", "drive.usercontent.google.com"];

/// Largest upstream body the relay will hold in memory.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Hosts a `url` parameter may point at when no allow-list is configured.
pub const DEFAULT_ALLOWED_HOSTS: [&str; 4] = [
    "drive.google.com",
    "drive.usercontent.google.com",
    "docs.google.com",
    "googleusercontent.com",
];

// ============================================================================
// ERRORS
// ============================================================================

/// Transport-level failure talking to the image host.
#[derive(Debug, Error)]
#[error("Image host request failed: {0}")]
pub struct ImageHostError(pub String);

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing 'id' or 'url' parameter")]
    MissingParameter,
    #[error("Invalid file id: {0}")]
    InvalidId(String),
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
    #[error("Unsupported url scheme '{0}' (only http and https are allowed)")]
    UnsupportedScheme(String),
    #[error("Host '{0}' is not on the image allow-list")]
    HostNotAllowed(String),
    #[error("Upstream image host returned {status}")]
    Upstream { status: u16 },
    #[error(transparent)]
    Unavailable(#[from] ImageHostError),
}

// ============================================================================
// MODELS
// ============================================================================

/// Query parameters of an image request.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ImageQuery {
    pub id: Option<String>,
    pub url: Option<String>,
}

/// A validated thing to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTarget {
    DriveFile(String),
    Remote(Url),
}

impl ImageTarget {
    pub fn fetch_url(&self) -> String {
        match self {
            ImageTarget::DriveFile(id) => format!("{}{}", DRIVE_DOWNLOAD_URL, id),
            ImageTarget::Remote(url) => url.to_string(),
        }
    }
}

/// Raw upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamImage {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
}

/// How image bytes are written into the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportEncoding {
    #[default]
    Binary,
    /// Base64 text, for gateways that only pass textual bodies.
    Base64,
}

impl TransportEncoding {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "binary" | "" => Some(TransportEncoding::Binary),
            "base64" => Some(TransportEncoding::Base64),
            _ => None,
        }
    }
}

/// What the relay hands back on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl RelayedImage {
    /// Response body in the requested transport encoding.
    pub fn encode(&self, encoding: TransportEncoding) -> Vec<u8> {
        match encoding {
            TransportEncoding::Binary => self.bytes.clone(),
            TransportEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .encode(&self.bytes)
                .into_bytes(),
        }
    }
}

// ============================================================================
// IMAGE HOST TRAIT
// ============================================================================

/// Anything that can GET a URL. Implemented over reqwest in the infra layer.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<UpstreamImage, ImageHostError>;
}

// ============================================================================
// RELAY SERVICE
// ============================================================================

/// Hosts a `url` parameter is allowed to reach. Subdomains of a listed host
/// are allowed too.
#[derive(Debug, Clone)]
pub struct RelayPolicy {
    allowed_hosts: Vec<String>,
}

impl RelayPolicy {
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    pub fn allows(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.allowed_hosts
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{}", allowed)))
    }

    /// Whether a redirect hop may land on `host`. Every hop has to pass, not
    /// just the first URL, otherwise an allowed host could bounce the relay
    /// anywhere.
    pub fn allows_redirect(&self, host: &str) -> bool {
        let lower = host.to_lowercase();
        self.allows(&lower) || DRIVE_DOWNLOAD_HOSTS.contains(&lower.as_str())
    }
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect())
    }
}

pub struct ImageRelayService<H: ImageHost> {
    host: H,
    policy: RelayPolicy,
}

impl<H: ImageHost> ImageRelayService<H> {
    pub fn new(host: H, policy: RelayPolicy) -> Self {
        Self { host, policy }
    }

    /// Validates the query and decides what to fetch. `id` wins over `url`
    /// when both are given.
    pub fn resolve_target(&self, query: &ImageQuery) -> Result<ImageTarget, RelayError> {
        let id = query.id.as_deref().map(str::trim).filter(|v| !v.is_empty());
        let url = query.url.as_deref().map(str::trim).filter(|v| !v.is_empty());

        if let Some(id) = id {
            if !is_valid_file_id(id) {
                return Err(RelayError::InvalidId(id.to_string()));
            }
            return Ok(ImageTarget::DriveFile(id.to_string()));
        }

        let raw = url.ok_or(RelayError::MissingParameter)?;
        let parsed = Url::parse(raw).map_err(|e| RelayError::InvalidUrl(e.to_string()))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RelayError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        if is_drive_reference(raw) {
            if let Some(file_id) = extract_file_id(raw) {
                return Ok(ImageTarget::DriveFile(file_id));
            }
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| RelayError::InvalidUrl("url has no host".to_string()))?;
        if !self.policy.allows(host) {
            return Err(RelayError::HostNotAllowed(host.to_string()));
        }

        Ok(ImageTarget::Remote(parsed))
    }

    /// Fetches the image once. No retries; the caller decides whether to try again.
    pub async fn relay(&self, query: &ImageQuery) -> Result<RelayedImage, RelayError> {
        let target = self.resolve_target(query)?;
        let fetch_url = target.fetch_url();

        tracing::debug!(url = %fetch_url, "Fetching image");
        let upstream = self.host.fetch(&fetch_url).await?;

        if !(200..300).contains(&upstream.status) {
            tracing::warn!(
                url = %fetch_url,
                status = upstream.status,
                "Image host returned an error"
            );
            return Err(RelayError::Upstream {
                status: upstream.status,
            });
        }

        if let Some(expected) = upstream.content_length {
            if expected != upstream.body.len() as u64 {
                tracing::warn!(
                    expected,
                    actual = upstream.body.len(),
                    "Image body length differs from Content-Length"
                );
            }
        }

        Ok(RelayedImage {
            content_type: upstream
                .content_type
                .filter(|ct| !ct.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            bytes: upstream.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns a canned response and records what it was asked for.
    struct FakeHost {
        response: Result<UpstreamImage, String>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeHost {
        fn ok(content_type: Option<&str>, body: &[u8]) -> Self {
            Self {
                response: Ok(UpstreamImage {
                    status: 200,
                    content_type: content_type.map(str::to_string),
                    content_length: Some(body.len() as u64),
                    body: body.to_vec(),
                }),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn status(status: u16) -> Self {
            Self {
                response: Ok(UpstreamImage {
                    status,
                    content_type: Some("text/html".to_string()),
                    content_length: None,
                    body: b"nope".to_vec(),
                }),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn down() -> Self {
            Self {
                response: Err("connection refused".to_string()),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageHost for FakeHost {
        async fn fetch(&self, url: &str) -> Result<UpstreamImage, ImageHostError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.response.clone().map_err(ImageHostError)
        }
    }

    fn query(id: Option<&str>, url: Option<&str>) -> ImageQuery {
        ImageQuery {
            id: id.map(str::to_string),
            url: url.map(str::to_string),
        }
    }

    fn service(host: FakeHost) -> ImageRelayService<FakeHost> {
        ImageRelayService::new(host, RelayPolicy::default())
    }

    #[tokio::test]
    async fn missing_parameter_is_rejected() {
        let relay = service(FakeHost::ok(None, b""));
        let err = relay.relay(&query(None, None)).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingParameter));

        let err = relay.relay(&query(Some("  "), Some(""))).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingParameter));
    }

    #[tokio::test]
    async fn non_http_scheme_is_rejected() {
        let relay = service(FakeHost::ok(None, b""));
        let err = relay
            .relay(&query(None, Some("ftp://drive.google.com/file.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::UnsupportedScheme(s) if s == "ftp"));
        assert!(relay.host.requested.lock().unwrap().is_empty());
    }

    #[test]
    fn bad_id_is_rejected() {
        let relay = service(FakeHost::ok(None, b""));
        let err = relay
            .resolve_target(&query(Some("../../secret"), None))
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidId(_)));
    }

    #[test]
    fn drive_url_is_reduced_to_id() {
        let relay = service(FakeHost::ok(None, b""));
        let target = relay
            .resolve_target(&query(
                None,
                Some("https://drive.google.com/file/d/ABC123/view"),
            ))
            .unwrap();
        assert_eq!(target, ImageTarget::DriveFile("ABC123".to_string()));
        assert_eq!(
            target.fetch_url(),
            "https://drive.google.com/uc?export=download&id=ABC123"
        );
    }

    #[test]
    fn unlisted_host_is_rejected() {
        let relay = service(FakeHost::ok(None, b""));
        let err = relay
            .resolve_target(&query(None, Some("http://169.254.169.254/latest/meta-data")))
            .unwrap_err();
        assert!(matches!(err, RelayError::HostNotAllowed(_)));
    }

    #[test]
    fn allow_list_covers_subdomains() {
        let policy = RelayPolicy::new(vec!["cdn.example.com".to_string()]);
        assert!(policy.allows("cdn.example.com"));
        assert!(policy.allows("img.CDN.example.com"));
        assert!(!policy.allows("evilcdn.example.com"));
        assert!(RelayPolicy::default().allows("lh3.googleusercontent.com"));
    }

    #[test]
    fn redirects_may_only_reach_listed_or_drive_hosts() {
        let policy = RelayPolicy::new(vec!["cdn.example.com".to_string()]);
        assert!(policy.allows_redirect("img.cdn.example.com"));
        assert!(policy.allows_redirect("drive.usercontent.google.com"));
        assert!(!policy.allows_redirect("localhost"));
        assert!(!policy.allows_redirect("169.254.169.254"));
    }

    #[tokio::test]
    async fn success_passes_bytes_through() {
        let body = vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3];
        let relay = service(FakeHost::ok(Some("image/png"), &body));

        let image = relay.relay(&query(Some("ABC123"), None)).await.unwrap();
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.bytes, body);
        assert_eq!(
            relay.host.requested.lock().unwrap().as_slice(),
            ["https://drive.google.com/uc?export=download&id=ABC123"]
        );
    }

    #[tokio::test]
    async fn missing_content_type_gets_default() {
        let relay = service(FakeHost::ok(None, b"jpeg"));
        let image = relay.relay(&query(Some("ABC123"), None)).await.unwrap();
        assert_eq!(image.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn upstream_status_is_reported() {
        let relay = service(FakeHost::status(404));
        let err = relay.relay(&query(Some("ABC123"), None)).await.unwrap_err();
        assert!(matches!(err, RelayError::Upstream { status: 404 }));
    }

    #[tokio::test]
    async fn transport_failure_is_unavailable() {
        let relay = service(FakeHost::down());
        let err = relay.relay(&query(Some("ABC123"), None)).await.unwrap_err();
        assert!(matches!(err, RelayError::Unavailable(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn base64_transport_decodes_to_original() {
        let image = RelayedImage {
            content_type: "image/png".to_string(),
            bytes: vec![0, 255, 16, 32, 64],
        };

        let encoded = image.encode(TransportEncoding::Base64);
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&encoded)
            .unwrap();
        assert_eq!(decoded, image.bytes);
        assert_eq!(image.encode(TransportEncoding::Binary), image.bytes);
    }

    #[test]
    fn transport_encoding_parsing() {
        assert_eq!(TransportEncoding::parse("BASE64"), Some(TransportEncoding::Base64));
        assert_eq!(TransportEncoding::parse(""), Some(TransportEncoding::Binary));
        assert_eq!(TransportEncoding::parse("gzip"), None);
    }
}
