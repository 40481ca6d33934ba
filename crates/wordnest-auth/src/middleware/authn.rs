//! Authentication middleware
//!
//! Credentials are probed in this order, first success wins:
//!
//! 1. `Authorization: Bearer <token>`; any other scheme fails the request
//!    immediately
//! 2. the configured cookie names, in order
//! 3. the configured raw-token header
//!
//! A carrier that fails validation does not stop the search, so clients that
//! send a stale cookie next to a fresh header still get in.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderMap, Request,
        header::{AUTHORIZATION, COOKIE},
    },
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};

use crate::account::{AccountDirectory, DirectoryError};
use crate::config::CarrierConfig;
use crate::context::{AccountContext, IdentityContext};
use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::validator::SessionValidator;

/// Shared state for the authentication middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    /// Credential validator
    pub validator: Arc<dyn SessionValidator>,
    /// Local account lookups
    pub directory: Arc<dyn AccountDirectory>,
    /// Where credentials are looked for
    pub carriers: Arc<CarrierConfig>,
}

impl AuthState {
    /// State with the default carriers
    pub fn new(validator: Arc<dyn SessionValidator>, directory: Arc<dyn AccountDirectory>) -> Self {
        Self {
            validator,
            directory,
            carriers: Arc::new(CarrierConfig::default()),
        }
    }

    /// Replace the carriers
    #[must_use]
    pub fn with_carriers(mut self, carriers: CarrierConfig) -> Self {
        self.carriers = Arc::new(carriers);
        self
    }
}

/// Parse `Bearer <token>`; the scheme is case-insensitive
///
/// # Errors
///
/// Returns [`AuthError::InvalidSession`] for another scheme or an empty token.
pub fn bearer_token_from_header(header: &str) -> AuthResult<&str> {
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::invalid_session(
            "authorization header must use the Bearer scheme",
        ));
    }

    let token = parts.next().map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return Err(AuthError::invalid_session("bearer token is empty"));
    }
    Ok(token)
}

/// Value of cookie `name` in a `Cookie` header
pub fn token_from_cookie_header<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then_some(value)
    })
}

/// Run the carrier search against `headers`
///
/// # Errors
///
/// [`AuthError::InvalidSession`] when the `Authorization` header uses another
/// scheme, [`AuthError::SessionNotFound`] when no carrier validates.
pub async fn extract_identity(
    headers: &HeaderMap,
    validator: &dyn SessionValidator,
    carriers: &CarrierConfig,
) -> AuthResult<Identity> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let header = value
            .to_str()
            .map_err(|_| AuthError::invalid_session("authorization header is not valid ASCII"))?;
        let token = bearer_token_from_header(header)?;

        match validator.validate(token).await {
            Ok(identity) => return Ok(identity),
            Err(e) => debug!(carrier = "authorization", error = %e, "Credential rejected"),
        }
    }

    let cookie_headers: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    for name in &carriers.cookie_names {
        let Some(value) = cookie_headers
            .iter()
            .find_map(|header| token_from_cookie_header(header, name))
        else {
            continue;
        };

        match validator.validate_from_carrier(value).await {
            Ok(identity) => return Ok(identity),
            Err(e) => debug!(carrier = "cookie", cookie = %name, error = %e, "Credential rejected"),
        }
    }

    if let Some(value) = headers
        .get(carriers.token_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        match validator.validate_from_carrier(value).await {
            Ok(identity) => return Ok(identity),
            Err(e) => debug!(
                carrier = "header",
                header = %carriers.token_header,
                error = %e,
                "Credential rejected"
            ),
        }
    }

    Err(AuthError::SessionNotFound)
}

/// Registration-required authentication
///
/// Attaches [`AccountContext`] and [`IdentityContext`]. Fails with 404
/// `needsRegistration` when the identity has no local account yet, and 403
/// when the account is inactive.
pub async fn require_account(
    State(auth): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = authenticate(&auth, req.headers()).await?;

    let account = auth
        .directory
        .find_by_identity(&identity.id)
        .await
        .map_err(|e| match e {
            DirectoryError::NotFound => {
                debug!(identity_id = %identity.id, "No local account for identity");
                AuthError::NeedsRegistration {
                    identity_id: identity.id.clone(),
                }
            }
            other => {
                error!(identity_id = %identity.id, error = %other, "Account lookup failed");
                AuthError::Internal(other.to_string())
            }
        })?;

    if !account.active {
        warn!(identity_id = %identity.id, account_id = %account.id, "Inactive account refused");
        return Err(AuthError::IdentityInactive);
    }

    debug!(
        identity_id = %identity.id,
        account_id = %account.id,
        role = %account.role,
        "Request authenticated"
    );

    let extensions = req.extensions_mut();
    extensions.insert(IdentityContext::new(identity.clone()));
    extensions.insert(AccountContext::new(identity, account));

    Ok(next.run(req).await)
}

/// Basic authentication, used by account-creation endpoints
///
/// Attaches only [`IdentityContext`]; no account lookup happens.
pub async fn require_identity(
    State(auth): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = authenticate(&auth, req.headers()).await?;
    debug!(identity_id = %identity.id, "Identity authenticated");

    req.extensions_mut().insert(IdentityContext::new(identity));
    Ok(next.run(req).await)
}

async fn authenticate(auth: &AuthState, headers: &HeaderMap) -> AuthResult<Identity> {
    extract_identity(headers, auth.validator.as_ref(), &auth.carriers)
        .await
        .inspect_err(|e| warn!(error = %e, "Authentication failed"))
}
