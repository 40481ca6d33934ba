//! Signed-token infrastructure for the protocol-backed validator
//!
//! - [`jwks`] - key-set fetching, RSA key reconstruction and the rotation-aware cache
//! - [`claims`] - issuer/audience/expiry checks and identity extraction
//!
//! Only the asymmetric RSA family is trusted. `none` and HMAC algorithms are
//! rejected before any key lookup, so a public key can never be replayed as
//! an HMAC secret.

pub mod claims;
pub mod jwks;

pub use claims::ClaimValidator;
pub use jwks::{Jwk, JwkSet, JwksError, KeyStore};

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Signing algorithms the validator accepts
pub const TRUSTED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// The `aud` claim, which may be a single string or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "svc1"`
    Single(String),
    /// `"aud": ["svc1", "svc2"]`
    Many(Vec<String>),
}

impl Audience {
    /// Exact match against a bare string, or membership in a list
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Self::Single(aud) => aud == expected,
            Self::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Claims decoded from a verified token
///
/// Registered claims are typed; everything else (email, name, ...) lands in
/// `additional` and is probed by [`ClaimValidator`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration time, seconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// JWT ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Non-registered claims
    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}
