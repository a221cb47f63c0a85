// src/warehouse/auth.rs
use super::WarehouseError;
use crate::config::AuthConfig;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::debug;
use url::Url;

pub const ACCESS_TOKEN_ENV_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
pub const METADATA_HOST_ENV_VAR: &str = "GCE_METADATA_HOST";

const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

// Refresh this long before the metadata server says the token expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where bearer tokens for the warehouse API come from.
#[derive(Debug)]
pub enum TokenSource {
    Static(String),
    Metadata {
        url: Url,
        cache: RwLock<Option<CachedToken>>,
    },
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

impl TokenSource {
    pub fn from_config(config: &AuthConfig) -> Result<Self, WarehouseError> {
        let access_token = config
            .access_token
            .clone()
            .or_else(|| std::env::var(ACCESS_TOKEN_ENV_VAR).ok());
        let metadata_host = std::env::var(METADATA_HOST_ENV_VAR)
            .unwrap_or_else(|_| config.metadata_host.clone());

        Self::from_parts(access_token, &metadata_host)
    }

    pub fn from_parts(
        access_token: Option<String>,
        metadata_host: &str,
    ) -> Result<Self, WarehouseError> {
        match access_token.filter(|t| !t.trim().is_empty()) {
            Some(token) => Ok(TokenSource::Static(token.trim().to_string())),
            None => {
                let url = Url::parse(&format!("http://{}{}", metadata_host, METADATA_TOKEN_PATH))?;
                Ok(TokenSource::Metadata {
                    url,
                    cache: RwLock::new(None),
                })
            }
        }
    }

    pub async fn token(&self, http: &Client) -> Result<String, WarehouseError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Metadata { url, cache } => {
                if let Some(cached) = cache.read().await.as_ref() {
                    if Instant::now() < cached.expires_at {
                        return Ok(cached.token.clone());
                    }
                }

                let fetched = Self::fetch_metadata_token(http, url).await?;
                let token = fetched.token.clone();
                *cache.write().await = Some(fetched);
                Ok(token)
            }
        }
    }

    async fn fetch_metadata_token(http: &Client, url: &Url) -> Result<CachedToken, WarehouseError> {
        debug!("Fetching access token from {}", url);

        let response = http
            .get(url.as_str())
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| WarehouseError::Auth(format!("metadata server unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WarehouseError::Auth(format!(
                "metadata server returned HTTP {}",
                status
            )));
        }

        let body: MetadataToken = response
            .json()
            .await
            .map_err(|e| WarehouseError::Auth(format!("malformed metadata token: {}", e)))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_MARGIN);

        Ok(CachedToken {
            token: body.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}
