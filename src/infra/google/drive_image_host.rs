// reqwest implementation of `ImageHost`. Used for Drive downloads and for
// allow-listed direct image URLs alike.
//
// The relay only validates the URL it was asked for. Redirects are followed by
// the client, so every hop is checked against the same `RelayPolicy` here, and
// bodies are read in chunks up to a fixed cap.

use std::error::Error as StdError;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect, Client, ClientBuilder};

use crate::core::images::{ImageHost, ImageHostError, RelayPolicy, UpstreamImage, MAX_IMAGE_BYTES};

const MAX_REDIRECTS: usize = 10;

fn redirect_policy(policy: RelayPolicy) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }

        let host = attempt.url().host_str().map(str::to_string);
        match host {
            Some(host) if policy.allows_redirect(&host) => attempt.follow(),
            Some(host) => {
                tracing::warn!(host = %host, "Blocked image redirect to unlisted host");
                attempt.error(format!("redirect to '{}' is not on the image allow-list", host))
            }
            None => attempt.error("redirect target has no host"),
        }
    })
}

/// reqwest hides the redirect policy's message in the error source.
fn describe(error: &reqwest::Error) -> String {
    match error.source() {
        Some(source) => format!("{}: {}", error, source),
        None => error.to_string(),
    }
}

pub struct HttpImageHost {
    client: Client,
    max_bytes: usize,
}

impl HttpImageHost {
    /// Builds the client from `builder`, checking every redirect hop against
    /// `policy`.
    pub fn new(builder: ClientBuilder, policy: RelayPolicy) -> Result<Self, reqwest::Error> {
        let client = builder.redirect(redirect_policy(policy)).build()?;
        Ok(Self {
            client,
            max_bytes: MAX_IMAGE_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn too_large(&self, size: u64) -> ImageHostError {
        ImageHostError(format!(
            "Image is {} bytes, over the {} byte limit",
            size, self.max_bytes
        ))
    }
}

#[async_trait]
impl ImageHost for HttpImageHost {
    async fn fetch(&self, url: &str) -> Result<UpstreamImage, ImageHostError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageHostError(describe(&e)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();

        if let Some(length) = content_length {
            if length > self.max_bytes as u64 {
                return Err(self.too_large(length));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ImageHostError(describe(&e)))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(UpstreamImage {
            status,
            content_type,
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::http::header;
    use axum::response::{IntoResponse, Redirect};
    use axum::routing::get;
    use axum::Router;

    use crate::core::images::{ImageQuery, ImageRelayService, RelayError};

    // ------------------------------------------------------------------------
    // Local upstream
    // ------------------------------------------------------------------------

    async fn redirect(Query(params): Query<HashMap<String, String>>) -> Redirect {
        Redirect::temporary(params.get("to").map(String::as_str).unwrap_or("/"))
    }

    async fn secret(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
        hits.fetch_add(1, Ordering::SeqCst);
        "SECRET"
    }

    async fn image() -> impl IntoResponse {
        ([(header::CONTENT_TYPE, "image/png")], b"PNGDATA".to_vec())
    }

    async fn big() -> Vec<u8> {
        vec![0u8; 4096]
    }

    /// Serves the upstream on an ephemeral port. Returns its address and the
    /// hit counter of `/secret`.
    async fn spawn_upstream() -> (SocketAddr, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/redir", get(redirect))
            .route("/secret", get(secret))
            .route("/img", get(image))
            .route("/big", get(big))
            .with_state(hits.clone());

        let server = hyper::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
            .serve(app.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);

        (addr, hits)
    }

    fn loopback_host() -> HttpImageHost {
        HttpImageHost::new(
            Client::builder().no_proxy(),
            RelayPolicy::new(vec!["127.0.0.1".to_string()]),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn redirect_to_unlisted_host_is_not_followed() {
        let (addr, hits) = spawn_upstream().await;
        let url = format!(
            "http://{}/redir?to=http://localhost:{}/secret",
            addr,
            addr.port()
        );

        let err = loopback_host().fetch(&url).await.unwrap_err();
        assert!(err.0.contains("localhost"), "unexpected error: {}", err.0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn relay_rejects_redirect_off_the_allow_list() {
        let (addr, hits) = spawn_upstream().await;
        let relay = ImageRelayService::new(
            loopback_host(),
            RelayPolicy::new(vec!["127.0.0.1".to_string()]),
        );
        let query = ImageQuery {
            id: None,
            url: Some(format!(
                "http://{}/redir?to=http://localhost:{}/secret",
                addr,
                addr.port()
            )),
        };

        let err = relay.relay(&query).await.unwrap_err();
        assert!(matches!(err, RelayError::Unavailable(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn redirect_within_allow_list_is_followed() {
        let (addr, _) = spawn_upstream().await;
        let url = format!("http://{}/redir?to=http://{}/img", addr, addr);

        let image = loopback_host().fetch(&url).await.unwrap();
        assert_eq!(image.status, 200);
        assert_eq!(image.content_type.as_deref(), Some("image/png"));
        assert_eq!(image.body, b"PNGDATA");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let (addr, _) = spawn_upstream().await;
        let host = loopback_host().with_max_bytes(1024);

        let err = host
            .fetch(&format!("http://{}/big", addr))
            .await
            .unwrap_err();
        assert!(err.0.contains("limit"));

        let image = loopback_host()
            .fetch(&format!("http://{}/big", addr))
            .await
            .unwrap();
        assert_eq!(image.body.len(), 4096);
    }
}
