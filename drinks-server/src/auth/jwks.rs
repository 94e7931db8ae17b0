use crate::config::AuthConfig;
use log::{debug, warn};
use moka::future::Cache as MokaCache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur while obtaining the signing-key set
#[derive(Debug, Error, Clone)]
pub enum JwksError {
    #[error("Invalid key set URL: {0}")]
    Url(String),
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
    #[error("Failed to fetch key set from {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("Key set endpoint {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Failed to parse key set: {0}")]
    Parse(String),
}

/// A single JSON Web Key (RFC 7517)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Public key bytes, base64url encoded (OKP keys)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Modulus, base64url encoded (RSA keys)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// Public exponent, base64url encoded (RSA keys)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

/// The issuer's signing-key set
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid.as_deref() == Some(kid))
    }
}

/// Cached key set plus a marker limiting refetches forced by unknown key ids
#[derive(Clone)]
struct KeySetCache {
    keys: MokaCache<String, Arc<JwkSet>>,
    refreshed: MokaCache<String, ()>,
}

/// Fetches the signing-key set from the issuer and keeps it for a configured TTL
#[derive(Clone)]
pub struct JwksClient {
    http: Client,
    url: Url,
    cache: Option<KeySetCache>,
}

impl JwksClient {
    pub fn new(config: &AuthConfig) -> Result<Self, JwksError> {
        let url = config
            .jwks_url()
            .map_err(|e| JwksError::Url(e.to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.jwks_timeout))
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| JwksError::Client(e.to_string()))?;

        let cache = (config.jwks_cache_ttl > 0).then(|| KeySetCache {
            keys: MokaCache::builder()
                .time_to_live(Duration::from_secs(config.jwks_cache_ttl))
                .max_capacity(1)
                .build(),
            refreshed: MokaCache::builder()
                .time_to_live(Duration::from_secs(config.jwks_refresh_interval.max(1)))
                .max_capacity(1)
                .build(),
        });

        Ok(Self { http, url, cache })
    }

    /// Returns the key with the given id.
    ///
    /// A cached key set that lacks the id is refetched, so keys rotated in by
    /// the issuer are picked up before the TTL runs out. At most one such
    /// refetch happens per refresh interval, whatever ids callers send.
    pub async fn find_key(&self, kid: &str) -> Result<Option<Jwk>, JwksError> {
        let key_set = self.key_set().await?;
        if let Some(key) = key_set.find(kid) {
            return Ok(Some(key.clone()));
        }

        let Some(cache) = &self.cache else {
            return Ok(None);
        };

        let marker = cache
            .refreshed
            .entry(self.url.to_string())
            .or_insert(())
            .await;
        if !marker.is_fresh() {
            debug!("Key '{kid}' not in key set, refreshed recently");
            return Ok(None);
        }

        debug!("Key '{kid}' not in cached key set, refreshing");
        cache.keys.invalidate(self.url.as_str()).await;
        let key_set = self.key_set().await?;
        Ok(key_set.find(kid).cloned())
    }

    async fn key_set(&self) -> Result<Arc<JwkSet>, JwksError> {
        match &self.cache {
            Some(cache) => cache
                .keys
                .try_get_with(self.url.to_string(), self.fetch())
                .await
                .map_err(|e| (*e).clone()),
            None => self.fetch().await,
        }
    }

    async fn fetch(&self) -> Result<Arc<JwkSet>, JwksError> {
        debug!("Fetching key set from {}", self.url);

        let response = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| JwksError::Fetch {
                url: self.url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            warn!(
                "Key set endpoint {} returned status {}",
                self.url,
                response.status()
            );
            return Err(JwksError::Status {
                url: self.url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let key_set = response
            .json::<JwkSet>()
            .await
            .map_err(|e| JwksError::Parse(e.to_string()))?;
        Ok(Arc::new(key_set))
    }
}
