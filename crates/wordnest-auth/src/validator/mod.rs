//! Session validators
//!
//! A [`SessionValidator`] turns an opaque bearer credential into a verified
//! [`Identity`]. Two implementations exist, selected once from
//! [`AuthConfig::mode`] by [`build_validator`]:
//!
//! - [`OidcValidator`] - discovery, key-set caching and signed-token checks
//! - [`StaticValidator`] - fixed identity for local development and tests
//!
//! Validation is all-or-nothing: an error never carries a partial identity.

pub mod oidc;
pub mod static_identity;

pub use oidc::OidcValidator;
pub use static_identity::StaticValidator;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{AuthConfig, ValidatorMode};
use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;

/// Credential validation contract
#[async_trait]
pub trait SessionValidator: Send + Sync + std::fmt::Debug {
    /// Validate a credential presented in the `Authorization` header
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSession`] when the credential is empty,
    /// malformed, expired or fails any protocol check.
    async fn validate(&self, credential: &str) -> AuthResult<Identity>;

    /// Validate a credential recovered from a secondary carrier (cookie or
    /// custom header)
    ///
    /// # Errors
    ///
    /// Same contract as [`SessionValidator::validate`].
    async fn validate_from_carrier(&self, carrier_value: &str) -> AuthResult<Identity>;

    /// Release network resources; safe to call repeatedly
    async fn close(&self);
}

/// Build the validator selected by `config.mode`
///
/// # Errors
///
/// Returns [`AuthError::Discovery`] if the protocol-backed validator cannot
/// complete discovery, or [`AuthError::Internal`] if the configuration is
/// invalid.
pub async fn build_validator(config: &AuthConfig) -> AuthResult<Arc<dyn SessionValidator>> {
    config
        .validate()
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    match config.mode {
        ValidatorMode::Oidc => {
            let validator = OidcValidator::new(config).await?;
            info!(
                issuer = %validator.issuer(),
                jwks_uri = %validator.jwks_uri(),
                "Using OIDC session validator"
            );
            Ok(Arc::new(validator))
        }
        ValidatorMode::Static => {
            warn!("Using static session validator; every non-empty credential is accepted");
            Ok(Arc::new(StaticValidator::new(config.static_identity.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_static_validator() {
        let config = AuthConfig::static_mode().with_static_identity(Identity::new("kid-1"));
        let validator = build_validator(&config).await.unwrap();

        let identity = validator.validate("anything").await.unwrap();
        assert_eq!(identity.id, "kid-1");
    }

    #[tokio::test]
    async fn test_build_oidc_without_issuer_fails() {
        let result = build_validator(&AuthConfig::default()).await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }
}
