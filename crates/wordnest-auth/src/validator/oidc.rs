//! Protocol-backed session validator
//!
//! Construction performs OpenID discovery once and fails if it cannot
//! complete. Each validation then:
//!
//! 1. rejects empty credentials and algorithms outside the trusted RSA family
//! 2. resolves the header `kid` through the [`KeyStore`]
//! 3. verifies the signature with `jsonwebtoken`
//! 4. hands the claims to the [`ClaimValidator`]

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{TokenData, Validation, decode, decode_header};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::SessionValidator;
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::jwt::{ClaimValidator, KeyStore, TRUSTED_ALGORITHMS, TokenClaims};

/// Path of the discovery document relative to the issuer
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Subset of the discovery document we consume
#[derive(Debug, Clone, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    jwks_uri: String,
}

/// Discovery + key-set backed validator
#[derive(Debug)]
pub struct OidcValidator {
    claims: ClaimValidator,
    key_store: KeyStore,
    closed: AtomicBool,
}

impl OidcValidator {
    /// Discover the issuer's key-set endpoint and build the validator
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Discovery`] when the issuer URL is empty, the
    /// discovery request fails, or the document is unusable, and
    /// [`AuthError::Internal`] when the HTTP client cannot be built.
    pub async fn new(config: &AuthConfig) -> AuthResult<Self> {
        let issuer = config
            .issuer_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::Discovery("issuer URL is required".to_string()))?;

        if config.insecure_skip_tls_verify {
            warn!(issuer = %issuer, "TLS certificate verification disabled for issuer");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify)
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let jwks_uri = Self::discover(&client, issuer).await?;

        Ok(Self {
            claims: ClaimValidator::new(issuer, config.audience.clone()),
            key_store: KeyStore::new(
                jwks_uri,
                client,
                Duration::from_secs(config.key_cache_ttl_secs),
            ),
            closed: AtomicBool::new(false),
        })
    }

    /// Fetch `{issuer}/.well-known/openid-configuration` and return `jwks_uri`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Discovery`] on transport failure, a non-success
    /// status, malformed JSON, an `issuer` field that differs from the
    /// configured issuer, or an empty `jwks_uri`.
    pub async fn discover(client: &reqwest::Client, issuer: &str) -> AuthResult<String> {
        let discovery_url = format!("{}{DISCOVERY_PATH}", issuer.trim_end_matches('/'));

        debug!(issuer = %issuer, discovery_url = %discovery_url, "Fetching discovery document");

        let response = client.get(&discovery_url).send().await.map_err(|e| {
            error!(issuer = %issuer, error = %e, "Failed to fetch discovery document");
            AuthError::Discovery(format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            error!(
                issuer = %issuer,
                status = %response.status(),
                "Discovery endpoint returned error status"
            );
            return Err(AuthError::Discovery(format!(
                "HTTP {} from discovery endpoint",
                response.status()
            )));
        }

        let document: DiscoveryDocument = response.json().await.map_err(|e| {
            error!(issuer = %issuer, error = %e, "Failed to parse discovery document");
            AuthError::Discovery(format!("invalid discovery document: {e}"))
        })?;

        if let Some(advertised) = document.issuer.as_deref()
            && advertised != issuer
        {
            error!(
                issuer = %issuer,
                advertised = %advertised,
                "Discovery document issuer mismatch"
            );
            return Err(AuthError::Discovery(format!(
                "discovery document issuer {advertised} does not match {issuer}"
            )));
        }

        if document.jwks_uri.trim().is_empty() {
            return Err(AuthError::Discovery(
                "discovery document has no jwks_uri".to_string(),
            ));
        }

        info!(issuer = %issuer, jwks_uri = %document.jwks_uri, "Discovered key-set endpoint");
        Ok(document.jwks_uri)
    }

    /// Configured issuer
    pub fn issuer(&self) -> &str {
        self.claims.issuer()
    }

    /// Discovered key-set endpoint
    pub fn jwks_uri(&self) -> &str {
        self.key_store.jwks_uri()
    }

    /// Key cache backing this validator
    pub fn key_store(&self) -> &KeyStore {
        &self.key_store
    }

    /// Whether [`SessionValidator::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn verify(&self, token: &str) -> AuthResult<Identity> {
        if token.is_empty() {
            return Err(AuthError::invalid_session("empty credential"));
        }
        if self.is_closed() {
            return Err(AuthError::invalid_session("validator closed"));
        }

        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode token header");
            AuthError::invalid_session(format!("malformed token: {e}"))
        })?;

        if !TRUSTED_ALGORITHMS.contains(&header.alg) {
            warn!(algorithm = ?header.alg, "Token signed with untrusted algorithm");
            return Err(AuthError::invalid_session(format!(
                "algorithm {:?} not allowed",
                header.alg
            )));
        }

        let kid = header
            .kid
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                debug!("Token header has no kid");
                AuthError::invalid_session("token header missing kid")
            })?;

        let key = self.key_store.get_key(kid).await?;

        // Signature only; claims are checked by ClaimValidator
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let token_data: TokenData<TokenClaims> =
            decode(token, &key, &validation).map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => {
                    warn!(kid = %kid, "Token signature verification failed");
                    AuthError::invalid_session("signature verification failed")
                }
                ErrorKind::Json(_) => {
                    warn!(kid = %kid, error = %e, "Token claims malformed");
                    AuthError::invalid_session(format!("malformed claims: {e}"))
                }
                _ => {
                    warn!(kid = %kid, error = %e, "Token rejected during decoding");
                    AuthError::invalid_session(format!("token rejected: {e}"))
                }
            })?;

        let identity = self
            .claims
            .validate(&token_data.claims, chrono::Utc::now().timestamp())?;

        debug!(identity_id = %identity.id, kid = %kid, "Token validated");
        Ok(identity)
    }
}

#[async_trait]
impl SessionValidator for OidcValidator {
    async fn validate(&self, credential: &str) -> AuthResult<Identity> {
        self.verify(credential).await
    }

    async fn validate_from_carrier(&self, carrier_value: &str) -> AuthResult<Identity> {
        self.verify(carrier_value).await
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(issuer = %self.issuer(), "Closing OIDC validator");
        }
        self.key_store.close().await;
    }
}
