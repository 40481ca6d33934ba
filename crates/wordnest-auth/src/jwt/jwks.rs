//! Key-set (JWKS) fetching and caching
//!
//! The [`KeyStore`] owns the issuer's signing keys for one validator instance:
//!
//! - **Staleness window**: the whole set is refetched when it is older than
//!   the configured TTL (5 minutes by default) or has never been fetched.
//! - **Rotation-aware lookup**: an unknown `kid` forces exactly one
//!   authoritative refetch before the lookup fails. There is no further retry
//!   and no negative cache.
//! - **Whole-set replacement**: refreshes build the new set off-lock and swap
//!   it in under the write lock, so readers see either the old or the new set.
//!
//! RSA keys are rebuilt from their base64url modulus/exponent pair; keys of
//! any other type are skipped.

use std::time::{Duration, Instant};

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use jsonwebtoken::DecodingKey;
use parking_lot::Mutex;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Key-set fetch and parse errors
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    /// HTTP request to the key-set endpoint failed (includes timeouts)
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Key-set response was invalid or malformed
    #[error("Invalid JWKS response: {0}")]
    InvalidResponse(String),

    /// Requested key ID not found, even after a forced refresh
    #[error("signing key not found: {kid}")]
    KeyNotFound {
        /// The key ID that was not found
        kid: String,
    },

    /// Key type is not supported (only RSA is)
    #[error("Unsupported key type: {kty}")]
    UnsupportedKeyType {
        /// The unsupported key type
        kty: String,
    },

    /// Key material is invalid or incomplete
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Base64url decoding of key parameters failed
    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// The store was closed and holds no HTTP client any more
    #[error("key store closed")]
    Closed,
}

/// JSON Web Key as published by the issuer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key Type (RSA, EC, oct, OKP)
    pub kty: String,

    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Public Key Use (sig, enc)
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Algorithm hint (RS256, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// RSA modulus (base64url)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// Rebuild the RSA public key from the modulus/exponent pair
    ///
    /// # Errors
    ///
    /// Fails for non-RSA keys, missing components, undecodable base64url or
    /// a pair that does not form a valid RSA public key.
    pub fn rsa_public_key(&self) -> Result<RsaPublicKey, JwksError> {
        if self.kty != "RSA" {
            return Err(JwksError::UnsupportedKeyType {
                kty: self.kty.clone(),
            });
        }

        let n = self
            .n
            .as_deref()
            .ok_or_else(|| JwksError::InvalidKeyFormat("RSA key missing 'n' parameter".into()))?;
        let e = self
            .e
            .as_deref()
            .ok_or_else(|| JwksError::InvalidKeyFormat("RSA key missing 'e' parameter".into()))?;

        let modulus = BigUint::from_bytes_be(&decode_base64url(n)?);
        let exponent = BigUint::from_bytes_be(&decode_base64url(e)?);

        RsaPublicKey::new(modulus, exponent)
            .map_err(|e| JwksError::InvalidKeyFormat(format!("Failed to create RSA key: {e}")))
    }

    /// Convert to a verification key for `jsonwebtoken`
    ///
    /// # Errors
    ///
    /// See [`Jwk::rsa_public_key`].
    pub fn to_decoding_key(&self) -> Result<DecodingKey, JwksError> {
        let public_key = self.rsa_public_key()?;
        Ok(DecodingKey::from_rsa_raw_components(
            &public_key.n().to_bytes_be(),
            &public_key.e().to_bytes_be(),
        ))
    }
}

/// Key-set document
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JwkSet {
    /// Published keys
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

/// Decode unpadded base64url, restoring the padding first
///
/// # Errors
///
/// Returns [`JwksError::Base64Error`] for input that is not base64url.
pub fn decode_base64url(value: &str) -> Result<Vec<u8>, JwksError> {
    let mut padded = value.trim().to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    Ok(URL_SAFE.decode(padded)?)
}

/// A usable verification key
#[derive(Clone)]
struct SigningKey {
    kid: String,
    key: DecodingKey,
}

/// One complete snapshot of the issuer's keys
#[derive(Clone)]
struct CachedKeySet {
    /// Keys in publication order
    keys: Vec<SigningKey>,
    fetched_at: Instant,
}

impl CachedKeySet {
    fn is_stale(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }

    fn find(&self, kid: &str) -> Option<DecodingKey> {
        self.keys
            .iter()
            .find(|k| k.kid == kid)
            .map(|k| k.key.clone())
    }
}

/// Signing-key cache owned by one validator instance
pub struct KeyStore {
    /// Key-set endpoint
    jwks_uri: String,
    /// HTTP client; `None` once closed
    http: Mutex<Option<reqwest::Client>>,
    /// Current key set
    cache: RwLock<Option<CachedKeySet>>,
    /// Staleness window
    ttl: Duration,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("jwks_uri", &self.jwks_uri)
            .field("ttl", &self.ttl)
            .field("cache", &"<cached keys>")
            .finish()
    }
}

impl KeyStore {
    /// Create an empty store; nothing is fetched until the first lookup
    pub fn new(jwks_uri: impl Into<String>, client: reqwest::Client, ttl: Duration) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            http: Mutex::new(Some(client)),
            cache: RwLock::new(None),
            ttl,
        }
    }

    /// Key-set endpoint this store fetches from
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Resolve `kid` to a verification key
    ///
    /// Refreshes a stale or empty cache first. A miss on a fresh cache is
    /// treated as a rotation: the set is refetched once and swapped in whole,
    /// so concurrent lookups keep hitting the old set until the new one lands.
    ///
    /// # Errors
    ///
    /// Returns [`JwksError::KeyNotFound`] when the key is absent after the
    /// forced refetch, or the fetch error if any refetch fails.
    pub async fn get_key(&self, kid: &str) -> Result<DecodingKey, JwksError> {
        self.ensure_fresh().await?;

        if let Some(key) = self.lookup(kid).await {
            debug!(kid = %kid, "JWKS cache hit");
            return Ok(key);
        }

        warn!(
            kid = %kid,
            jwks_uri = %self.jwks_uri,
            "Key ID not in cached key set, forcing refresh"
        );
        self.refresh().await?;

        self.lookup(kid).await.ok_or_else(|| {
            warn!(kid = %kid, "Key ID not found after forced refresh");
            JwksError::KeyNotFound {
                kid: kid.to_string(),
            }
        })
    }

    /// Fetch the key set and replace the cache wholesale
    ///
    /// Returns the number of usable keys in the new set.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable, times out, answers
    /// with a non-success status or serves malformed JSON. The cache is left
    /// untouched on error.
    pub async fn refresh(&self) -> Result<usize, JwksError> {
        let jwk_set = self.fetch().await?;
        let keys = parse_keys(jwk_set);
        let count = keys.len();

        {
            let mut cache = self.cache.write().await;
            *cache = Some(CachedKeySet {
                keys,
                fetched_at: Instant::now(),
            });
        }

        info!(jwks_uri = %self.jwks_uri, key_count = count, "JWKS cache updated");
        Ok(count)
    }

    /// Drop the cached key set
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }

    /// Release the HTTP client and cached keys; idempotent
    pub async fn close(&self) {
        let had_client = self.http.lock().take().is_some();
        self.invalidate().await;
        if had_client {
            debug!(jwks_uri = %self.jwks_uri, "Key store closed");
        }
    }

    /// Number of keys currently cached
    pub async fn cached_key_count(&self) -> usize {
        self.cache
            .read()
            .await
            .as_ref()
            .map_or(0, |cached| cached.keys.len())
    }

    async fn ensure_fresh(&self) -> Result<(), JwksError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && !cached.is_stale(self.ttl)
            {
                return Ok(());
            }
        }

        self.refresh().await.map(|_| ())
    }

    async fn lookup(&self, kid: &str) -> Option<DecodingKey> {
        let cache = self.cache.read().await;
        cache.as_ref().and_then(|cached| cached.find(kid))
    }

    async fn fetch(&self) -> Result<JwkSet, JwksError> {
        let client = self.http.lock().clone().ok_or(JwksError::Closed)?;

        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS");

        let response = client.get(&self.jwks_uri).send().await.map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
            JwksError::HttpError(e)
        })?;

        if !response.status().is_success() {
            error!(
                jwks_uri = %self.jwks_uri,
                status = %response.status(),
                "JWKS endpoint returned error status"
            );
            return Err(JwksError::InvalidResponse(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response.json::<JwkSet>().await.map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            JwksError::InvalidResponse(format!("Failed to parse JWKS JSON: {e}"))
        })
    }
}

/// Keep every key that can verify signatures, in publication order
fn parse_keys(jwk_set: JwkSet) -> Vec<SigningKey> {
    let mut keys = Vec::with_capacity(jwk_set.keys.len());

    for jwk in jwk_set.keys {
        let Some(kid) = jwk.kid.clone() else {
            warn!(kty = %jwk.kty, "Skipping JWK without kid");
            continue;
        };

        if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            debug!(kid = %kid, key_use = ?jwk.key_use, "Skipping non-signing JWK");
            continue;
        }

        match jwk.to_decoding_key() {
            Ok(key) => {
                debug!(kid = %kid, kty = %jwk.kty, alg = ?jwk.alg, "Parsed JWK");
                keys.push(SigningKey { kid, key });
            }
            Err(e) => {
                warn!(kid = %kid, error = %e, "Failed to parse JWK");
            }
        }
    }

    keys
}
