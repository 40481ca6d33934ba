//! Request-scoped authentication context
//!
//! The middleware stores these values in request extensions; handlers and
//! later middleware read them back through the `FromRequestParts` impls.
//! An extractor whose value is missing rejects with
//! [`AuthError::MissingContext`] (401), since it means authentication never
//! ran for the route.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::account::{LocalAccount, Role};
use crate::error::AuthError;
use crate::identity::Identity;

/// Set by both authentication variants
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityContext {
    /// Verified identity id
    pub identity_id: String,
    /// Full verified identity
    pub identity: Identity,
}

impl IdentityContext {
    /// Wrap a verified identity
    pub fn new(identity: Identity) -> Self {
        Self {
            identity_id: identity.id.clone(),
            identity,
        }
    }
}

/// Set by the registration-required variant
#[derive(Debug, Clone, PartialEq)]
pub struct AccountContext {
    /// Local account id
    pub account_id: String,
    /// Local account record
    pub account: LocalAccount,
    /// Verified identity id
    pub identity_id: String,
    /// Family id; empty when the account has none
    pub family_id: String,
    /// Account role
    pub role: Role,
    /// Full verified identity
    pub identity: Identity,
}

impl AccountContext {
    /// Combine a verified identity with its local account
    pub fn new(identity: Identity, account: LocalAccount) -> Self {
        Self {
            account_id: account.id.clone(),
            identity_id: identity.id.clone(),
            family_id: account.family_id.clone().unwrap_or_default(),
            role: account.role,
            account,
            identity,
        }
    }
}

/// Family id confirmed by the family-scope check
///
/// Handlers scope family data by this value, never by a family id taken
/// from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFamilyId(pub String);

impl ValidatedFamilyId {
    /// The confirmed family id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for IdentityContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IdentityContext>()
            .cloned()
            .ok_or(AuthError::MissingContext("identity"))
    }
}

impl<S> FromRequestParts<S> for AccountContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccountContext>()
            .cloned()
            .ok_or(AuthError::MissingContext("account"))
    }
}

impl<S> FromRequestParts<S> for ValidatedFamilyId
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ValidatedFamilyId>()
            .cloned()
            .ok_or(AuthError::MissingContext("family"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_account_context_flattens_account() {
        let identity = Identity::new("u1");
        let account = LocalAccount::new("acc-1", "u1", Role::Parent).in_family("fam-1");
        let ctx = AccountContext::new(identity, account);

        assert_eq!(ctx.account_id, "acc-1");
        assert_eq!(ctx.identity_id, "u1");
        assert_eq!(ctx.family_id, "fam-1");
        assert_eq!(ctx.role, Role::Parent);
    }

    #[test]
    fn test_account_without_family_has_empty_family_id() {
        let ctx = AccountContext::new(
            Identity::new("u2"),
            LocalAccount::new("acc-2", "u2", Role::Admin),
        );
        assert!(ctx.family_id.is_empty());
    }

    #[tokio::test]
    async fn test_extractor_rejects_when_missing() {
        let (mut parts, _) = Request::new(()).into_parts();

        let err = IdentityContext::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::MissingContext("identity"));

        let err = ValidatedFamilyId::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_extractor_reads_extension() {
        let (mut parts, _) = Request::new(()).into_parts();
        parts
            .extensions
            .insert(IdentityContext::new(Identity::new("u1")));

        let ctx = IdentityContext::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(ctx.identity_id, "u1");
    }
}
