//! Claim validation and identity extraction
//!
//! Runs after the signature has been verified. Issuer, audience and expiry
//! are checked here rather than by `jsonwebtoken` so that the rules stay in
//! one place: exact issuer match, audience as string or list member, and a
//! strict expiry with no leeway.

use serde_json::Value;
use tracing::{debug, warn};

use super::TokenClaims;
use crate::error::{AuthError, AuthResult};
use crate::identity::{Identity, TRAIT_NAME};

/// Email claim names, in priority order
pub const EMAIL_CLAIMS: &[&str] = &["email", "mail", "preferred_username"];

/// Display-name claim names, in priority order
pub const NAME_CLAIMS: &[&str] = &["name", "preferred_username", "given_name"];

/// Issuer/audience/expiry rules for one validator
#[derive(Debug, Clone)]
pub struct ClaimValidator {
    issuer: String,
    audience: Option<String>,
}

impl ClaimValidator {
    /// Rules for tokens from `issuer`, optionally addressed to `audience`
    pub fn new(issuer: impl Into<String>, audience: Option<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience,
        }
    }

    /// Configured issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Check the registered claims and build the identity
    ///
    /// `now` is the validation time in seconds since the epoch.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSession`] on issuer mismatch, audience
    /// mismatch, missing or past `exp`, or a missing `sub`.
    pub fn validate(&self, claims: &TokenClaims, now: i64) -> AuthResult<Identity> {
        match claims.iss.as_deref() {
            Some(iss) if iss == self.issuer => {}
            other => {
                warn!(expected = %self.issuer, actual = ?other, "Issuer mismatch");
                return Err(AuthError::invalid_session("issuer mismatch"));
            }
        }

        if let Some(expected) = &self.audience {
            let matches = claims.aud.as_ref().is_some_and(|aud| aud.contains(expected));
            if !matches {
                warn!(expected = %expected, actual = ?claims.aud, "Audience mismatch");
                return Err(AuthError::invalid_session("audience mismatch"));
            }
        }

        let exp = claims
            .exp
            .ok_or_else(|| AuthError::invalid_session("missing exp claim"))?;
        if exp <= now {
            debug!(exp, now, "Token expired");
            return Err(AuthError::invalid_session("token expired"));
        }

        let sub = claims
            .sub
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::invalid_session("missing sub claim"))?;

        let mut identity = Identity::new(sub);

        if let Some(email) = first_claim(claims, EMAIL_CLAIMS, |key, value| {
            key != "preferred_username" || value.contains('@')
        }) {
            identity = identity.with_email(email);
        }

        if let Some(verified) = claims.additional.get("email_verified").and_then(parse_bool) {
            identity = identity.with_verified(verified);
        }

        if let Some(name) = first_claim(claims, NAME_CLAIMS, |_, _| true) {
            identity = identity.with_name(name);
        }

        if let Some(jti) = claims.jti.as_deref().filter(|j| !j.is_empty()) {
            identity = identity.with_session_id(jti);
        }

        debug!(
            identity_id = %identity.id,
            has_email = identity.email.is_some(),
            has_name = identity.traits.contains_key(TRAIT_NAME),
            "Claims validated"
        );

        Ok(identity)
    }
}

/// First non-empty string claim among `candidates` accepted by `accept`
fn first_claim<'a>(
    claims: &'a TokenClaims,
    candidates: &[&str],
    accept: impl Fn(&str, &str) -> bool,
) -> Option<&'a str> {
    candidates.iter().find_map(|key| {
        claims
            .additional
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty() && accept(key, value))
    })
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}
