// =============================================================================
// GOOGLE SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// Exchanges a service account key for an OAuth2 access token using the JWT
// bearer flow:
//
// 1. Build a JWT (iss = service account email, scope, aud = token endpoint)
// 2. Sign it with the key's RS256 private key
// 3. POST it to the token endpoint and read back `access_token`
//
// **Setup:**
// 1. Create a service account in Google Cloud Console and enable the
//    Google Sheets API for its project
// 2. Create a JSON key for it
// 3. Share the inventory sheet with the service account email as "Viewer"
// 4. Set either:
//    - `GOOGLE_SERVICE_ACCOUNT_KEY` - path to the JSON key file
//    - `GOOGLE_SERVICE_ACCOUNT_JSON` - the JSON content itself (for hosts
//      that only take env vars)
//
// A token is minted per catalog request. Nothing is cached between requests.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Read-only access to spreadsheet values.
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens are requested for the maximum lifetime Google allows.
const TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to read service account key {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid service account JSON: {0}")]
    Credentials(#[from] serde_json::Error),
    #[error("Failed to sign JWT: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Token exchange failed ({status}): {body}")]
    TokenExchange { status: u16, body: String },
    #[error("Token request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Where the service account key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    KeyFile(String),
    Json(String),
}

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// The service account email (used as issuer in JWT).
    client_email: String,

    /// The private key in PEM format.
    private_key: String,

    /// The token URI (where to exchange JWT for access token).
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Mints access tokens for one service account.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    client: Client,
}

impl ServiceAccountAuth {
    /// Creates a new authenticator from JSON key content.
    pub fn from_json(json: &str, client: Client) -> Result<Self, AuthError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)?;
        Ok(Self {
            credentials,
            client,
        })
    }

    /// Creates a new authenticator from a JSON key file path.
    pub async fn from_file(path: &str, client: Client) -> Result<Self, AuthError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| AuthError::KeyFile {
                    path: path.to_string(),
                    source,
                })?;
        Self::from_json(&content, client)
    }

    pub async fn from_source(source: &CredentialsSource, client: Client) -> Result<Self, AuthError> {
        match source {
            CredentialsSource::KeyFile(path) => Self::from_file(path, client).await,
            CredentialsSource::Json(json) => Self::from_json(json, client),
        }
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    fn claims(&self, now: i64) -> JwtClaims {
        JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: SHEETS_READONLY_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        }
    }

    /// Fetches a fresh access token from Google.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let claims = self.claims(chrono::Utc::now().timestamp());

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        tracing::debug!(
            service_account = %self.credentials.client_email,
            "Requesting Google access token"
        );

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(AuthError::TokenExchange { status, body });
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(token_response.access_token)
    }
}
