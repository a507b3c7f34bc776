// Image reference resolution.
//
// The picture column holds whatever someone pasted: a Drive share link, a bare
// Drive file id, a CDN URL, an `=IMAGE("...")` formula, or nothing. The
// frontend needs something it can put in an <img src>, so every reference is
// resolved to one of:
//
// - ""                          (no picture; the frontend shows a placeholder)
// - the reference unchanged     (already a direct URL we know nothing about)
// - "<proxy_path>?id=<file id>" (a Drive file, served through our image relay)

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

/// Default route of the image relay.
pub const DEFAULT_PROXY_PATH: &str = "/api/image";

/// Hosts whose URLs embed a Drive file id.
const DRIVE_HOST_MARKERS: [&str; 3] = [
    "drive.google.com",
    "docs.google.com",
    "googleusercontent.com",
];

static IMAGE_FORMULA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^=\s*IMAGE\s*\(\s*"([^"]*)""#).expect("valid image formula regex")
});
static QUERY_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]id=([A-Za-z0-9_-]+)").expect("valid query id regex"));
static PATH_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/d/([A-Za-z0-9_-]+)").expect("valid path id regex"));
static BARE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{25,}$").expect("valid bare id regex"));
static ID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid id charset regex"));

// ============================================================================
// ID MATCHERS
// ============================================================================

type IdMatcher = fn(&str) -> Option<String>;

/// `...?id=<id>` / `...&id=<id>`
fn match_query_param(reference: &str) -> Option<String> {
    QUERY_ID.captures(reference).map(|caps| caps[1].to_string())
}

/// `.../file/d/<id>/view`, `.../d/<id>`
fn match_path_segment(reference: &str) -> Option<String> {
    PATH_ID.captures(reference).map(|caps| caps[1].to_string())
}

/// A long id token with no URL syntax around it.
fn match_bare_id(reference: &str) -> Option<String> {
    BARE_ID
        .is_match(reference)
        .then(|| reference.to_string())
}

/// Tried in order; the first match wins.
const ID_MATCHERS: [IdMatcher; 3] = [match_query_param, match_path_segment, match_bare_id];

// ============================================================================
// PUBLIC HELPERS
// ============================================================================

/// Strips formula and quoting artifacts from a raw cell.
pub fn clean_reference(raw: &str) -> String {
    let trimmed = raw.trim();
    let unwrapped = match IMAGE_FORMULA.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    };

    unwrapped
        .trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
        .to_string()
}

/// Whether `host` is one of the Drive hosts or a subdomain of one.
pub fn is_drive_host(host: &str) -> bool {
    let host = host.to_lowercase();
    DRIVE_HOST_MARKERS
        .iter()
        .any(|marker| host == *marker || host.ends_with(&format!(".{}", marker)))
}

/// Whether a cleaned reference looks like something hosted on Drive: a bare
/// file id, or a URL whose host is a Drive host. Links pasted without a scheme
/// are read as https.
pub fn is_drive_reference(reference: &str) -> bool {
    if BARE_ID.is_match(reference) {
        return true;
    }

    Url::parse(reference)
        .or_else(|_| Url::parse(&format!("https://{}", reference)))
        .ok()
        .and_then(|url| url.host_str().map(is_drive_host))
        .unwrap_or(false)
}

/// Pulls the Drive file id out of a cleaned reference.
pub fn extract_file_id(reference: &str) -> Option<String> {
    ID_MATCHERS.iter().find_map(|matcher| matcher(reference))
}

/// Whether `value` only uses characters Drive ids are made of.
pub fn is_valid_file_id(value: &str) -> bool {
    ID_CHARS.is_match(value)
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves picture cells into URLs the frontend can fetch.
#[derive(Debug, Clone)]
pub struct ImageReferenceResolver {
    proxy_path: String,
}

impl ImageReferenceResolver {
    pub fn new(proxy_path: impl Into<String>) -> Self {
        Self {
            proxy_path: proxy_path.into(),
        }
    }

    pub fn proxy_url(&self, file_id: &str) -> String {
        format!("{}?id={}", self.proxy_path, file_id)
    }

    pub fn resolve(&self, raw: &str) -> String {
        let reference = clean_reference(raw);

        if reference.is_empty() || !is_drive_reference(&reference) {
            return reference;
        }

        match extract_file_id(&reference) {
            Some(id) => self.proxy_url(&id),
            None => {
                tracing::debug!(reference = %reference, "Drive reference without a file id");
                reference
            }
        }
    }
}

impl Default for ImageReferenceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_PROXY_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BARE: &str = "1AbCdEfGhIjKlMnOpQrStUvWx"; // 25 chars

    #[test]
    fn empty_reference_resolves_to_empty() {
        let resolver = ImageReferenceResolver::default();
        assert_eq!(resolver.resolve(""), "");
        assert_eq!(resolver.resolve("  \"\"  "), "");
    }

    #[test]
    fn query_param_id_is_extracted() {
        let resolver = ImageReferenceResolver::default();
        assert_eq!(
            resolver.resolve("https://drive.google.com/uc?export=view&id=ABC123"),
            "/api/image?id=ABC123"
        );
    }

    #[test]
    fn path_segment_id_is_extracted() {
        let resolver = ImageReferenceResolver::default();
        assert_eq!(
            resolver.resolve("https://drive.google.com/file/d/XYZ_987-abc/view?usp=sharing"),
            "/api/image?id=XYZ_987-abc"
        );
    }

    #[test]
    fn query_param_wins_over_path_segment() {
        assert_eq!(
            extract_file_id("https://docs.google.com/d/PATHID/x?id=QUERYID"),
            Some("QUERYID".to_string())
        );
    }

    #[test]
    fn bare_id_uses_bare_matcher() {
        assert_eq!(BARE.len(), 25);
        assert!(match_query_param(BARE).is_none());
        assert!(match_path_segment(BARE).is_none());
        assert_eq!(match_bare_id(BARE), Some(BARE.to_string()));

        let resolver = ImageReferenceResolver::default();
        assert_eq!(resolver.resolve(BARE), format!("/api/image?id={BARE}"));
    }

    #[test]
    fn short_token_is_not_a_bare_id() {
        let resolver = ImageReferenceResolver::default();
        assert_eq!(resolver.resolve("photo123"), "photo123");
    }

    #[test]
    fn cdn_url_passes_through() {
        let resolver = ImageReferenceResolver::default();
        let url = "https://cdn.example.com/connectors/12345.jpg";
        assert_eq!(resolver.resolve(url), url);
    }

    #[test]
    fn drive_url_without_id_falls_back_to_original() {
        let resolver = ImageReferenceResolver::default();
        assert_eq!(
            resolver.resolve(" 'https://drive.google.com/drive/my-drive' "),
            "https://drive.google.com/drive/my-drive"
        );
    }

    #[test]
    fn quotes_and_formula_are_stripped() {
        assert_eq!(clean_reference("\"https://a.b/c.png\""), "https://a.b/c.png");
        assert_eq!(
            clean_reference(r#"=IMAGE("https://drive.google.com/uc?id=ABC123", 1)"#),
            "https://drive.google.com/uc?id=ABC123"
        );
    }

    #[test]
    fn custom_proxy_path() {
        let resolver = ImageReferenceResolver::new("/.netlify/functions/image");
        assert_eq!(
            resolver.resolve("https://drive.google.com/open?id=ABC123"),
            "/.netlify/functions/image?id=ABC123"
        );
    }

    #[test]
    fn drive_marker_outside_the_host_is_ignored() {
        let resolver = ImageReferenceResolver::default();
        let url = "https://cdn.example.com/p.jpg?id=9&src=drive.google.com";
        assert!(!is_drive_reference(url));
        assert_eq!(resolver.resolve(url), url);
        assert!(!is_drive_reference("https://drive.google.com.evil.example/x?id=ABC123"));
    }

    #[test]
    fn drive_hosts_match_with_or_without_scheme() {
        assert!(is_drive_reference("https://lh3.googleusercontent.com/abc"));
        assert!(is_drive_reference("drive.google.com/file/d/ABC123/view"));
        assert!(!is_drive_reference("photo123"));

        let resolver = ImageReferenceResolver::default();
        assert_eq!(
            resolver.resolve("drive.google.com/file/d/ABC123/view"),
            "/api/image?id=ABC123"
        );
    }

    #[test]
    fn file_id_charset() {
        assert!(is_valid_file_id("ABC_123-x"));
        assert!(!is_valid_file_id("../etc/passwd"));
        assert!(!is_valid_file_id(""));
    }
}
