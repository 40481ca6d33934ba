//! Static validator for local development and tests
//!
//! Performs no cryptographic work. Keeping it out of production deployments
//! is a configuration concern.

use async_trait::async_trait;
use tracing::debug;

use super::SessionValidator;
use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;

/// Returns one preconfigured identity for any non-empty credential
#[derive(Debug, Clone)]
pub struct StaticValidator {
    identity: Identity,
}

impl StaticValidator {
    /// Use `identity`, or [`Identity::development`] when none is given
    pub fn new(identity: Option<Identity>) -> Self {
        Self {
            identity: identity.unwrap_or_else(Identity::development),
        }
    }

    /// The identity every successful validation returns
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    fn check(&self, credential: &str) -> AuthResult<Identity> {
        if credential.is_empty() {
            return Err(AuthError::invalid_session("empty credential"));
        }
        debug!(identity_id = %self.identity.id, "Static validator accepted credential");
        Ok(self.identity.clone())
    }
}

impl Default for StaticValidator {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl SessionValidator for StaticValidator {
    async fn validate(&self, credential: &str) -> AuthResult<Identity> {
        self.check(credential)
    }

    async fn validate_from_carrier(&self, carrier_value: &str) -> AuthResult<Identity> {
        self.check(carrier_value)
    }

    async fn close(&self) {}
}
