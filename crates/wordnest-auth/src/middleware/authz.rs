//! Authorization middleware
//!
//! Each check reads only request context set by an earlier layer plus at
//! most one directory call, and fails closed. Missing context is an
//! authentication gap (401); an unmet requirement is a denial (403).
//!
//! Ownership checks never reveal whether the target exists: "not found",
//! "not owned" and directory outages all produce the same denial. Outages
//! are logged at error level so operators can still tell them apart.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{RawPathParams, State, rejection::RawPathParamsRejection},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};

use crate::account::{AccountDirectory, DirectoryError, Role};
use crate::context::{AccountContext, ValidatedFamilyId};
use crate::error::{AuthError, AuthResult};

/// Path parameter holding the child account id
pub const CHILD_ID_PARAM: &str = "child_id";

/// Path parameter holding the word-set id
pub const WORD_SET_ID_PARAM: &str = "word_set_id";

const CHILD_DENIED: &str = "not authorized for this child account";
const WORD_SET_DENIED: &str = "word set is not available to this family";

/// Outcome of one authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthzDecision {
    /// Requirement met
    Allow,
    /// Requirement not met; the reason is shown to the caller
    Deny(String),
    /// Context the check depends on is missing
    Unauthenticated(&'static str),
    /// The check could not be completed; detail is for logs only
    Error(String),
}

impl AuthzDecision {
    /// Whether the request may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Convert to a middleware result
    ///
    /// `Error` becomes a denial carrying `denial`, so callers cannot tell an
    /// outage from a refusal.
    ///
    /// # Errors
    ///
    /// Every variant except [`AuthzDecision::Allow`].
    pub fn into_result(self, denial: &str) -> AuthResult<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(AuthError::Forbidden(reason)),
            Self::Unauthenticated(what) => Err(AuthError::MissingContext(what)),
            Self::Error(_) => Err(AuthError::forbidden(denial)),
        }
    }
}

/// Role membership check
pub fn check_role(role: Option<Role>, allowed: &[Role]) -> AuthzDecision {
    let Some(role) = role else {
        return AuthzDecision::Unauthenticated("role");
    };

    if allowed.contains(&role) {
        AuthzDecision::Allow
    } else {
        let names: Vec<&str> = allowed.iter().map(Role::as_str).collect();
        AuthzDecision::Deny(format!("requires role: {}", names.join(", ")))
    }
}

/// Family membership check
pub fn check_family(family_id: Option<&str>) -> AuthzDecision {
    match family_id {
        None => AuthzDecision::Unauthenticated("account"),
        Some("") => AuthzDecision::Deny("not part of a family".to_string()),
        Some(_) => AuthzDecision::Allow,
    }
}

/// Map a directory ownership answer to a decision
pub fn check_ownership(result: Result<(), DirectoryError>, denial: &str) -> AuthzDecision {
    match result {
        Ok(()) => AuthzDecision::Allow,
        Err(DirectoryError::NotFound | DirectoryError::NotOwned) => {
            AuthzDecision::Deny(denial.to_string())
        }
        Err(DirectoryError::Unavailable(detail)) => AuthzDecision::Error(detail),
    }
}

/// Allowed roles for [`require_role`]
#[derive(Debug, Clone)]
pub struct RoleRequirement {
    allowed: Arc<[Role]>,
}

impl RoleRequirement {
    /// Accept any of `roles`
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: roles.into_iter().collect(),
        }
    }

    /// Accepted roles
    pub fn allowed(&self) -> &[Role] {
        &self.allowed
    }
}

/// Directory and path parameter for the ownership middleware
#[derive(Debug, Clone)]
pub struct OwnershipCheck {
    /// Ownership lookups
    pub directory: Arc<dyn AccountDirectory>,
    /// Name of the path parameter holding the target id
    pub param: &'static str,
}

impl OwnershipCheck {
    /// Check the target named by path parameter `param`
    pub fn new(directory: Arc<dyn AccountDirectory>, param: &'static str) -> Self {
        Self { directory, param }
    }

    /// Parent-of-child check reading [`CHILD_ID_PARAM`]
    pub fn child(directory: Arc<dyn AccountDirectory>) -> Self {
        Self::new(directory, CHILD_ID_PARAM)
    }

    /// Family-owns-word-set check reading [`WORD_SET_ID_PARAM`]
    pub fn word_set(directory: Arc<dyn AccountDirectory>) -> Self {
        Self::new(directory, WORD_SET_ID_PARAM)
    }

    fn target<'a>(
        &self,
        params: &'a Result<RawPathParams, RawPathParamsRejection>,
    ) -> AuthResult<&'a str> {
        params
            .as_ref()
            .ok()
            .and_then(|params| {
                params
                    .iter()
                    .find_map(|(key, value)| (key == self.param).then_some(value))
            })
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::MissingContext("path parameter"))
    }
}

/// Require the account role to be one of the configured roles
pub async fn require_role(
    State(requirement): State<RoleRequirement>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let role = req.extensions().get::<AccountContext>().map(|ctx| ctx.role);
    let decision = check_role(role, requirement.allowed());

    if let AuthzDecision::Deny(reason) = &decision {
        warn!(role = ?role, reason = %reason, "Role requirement not met");
    }
    decision.into_result("role requirement not met")?;

    Ok(next.run(req).await)
}

/// Require a family and publish it as [`ValidatedFamilyId`]
pub async fn require_family(mut req: Request<Body>, next: Next) -> Result<Response, AuthError> {
    let family_id = req
        .extensions()
        .get::<AccountContext>()
        .map(|ctx| ctx.family_id.clone());

    let decision = check_family(family_id.as_deref());
    if let AuthzDecision::Deny(reason) = &decision {
        warn!(reason = %reason, "Family requirement not met");
    }
    decision.into_result("not part of a family")?;

    if let Some(family_id) = family_id {
        debug!(family_id = %family_id, "Family validated");
        req.extensions_mut().insert(ValidatedFamilyId(family_id));
    }

    Ok(next.run(req).await)
}

/// Require the acting account to be the parent of the child in the path
///
/// A directory outage is answered with the same 403 as "not your child" and
/// logged at error level. Only the account lookup in [`require_account`]
/// turns an outage into a 500.
///
/// [`require_account`]: crate::middleware::require_account
pub async fn require_parent_of_child(
    State(check): State<OwnershipCheck>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let parent_id = req
        .extensions()
        .get::<AccountContext>()
        .map(|ctx| ctx.account_id.clone())
        .ok_or(AuthError::MissingContext("account"))?;
    let child_id = check.target(&params)?;

    let result = check
        .directory
        .verify_parent_of_child(&parent_id, child_id)
        .await;
    log_ownership(&result, "child", &parent_id, child_id);
    check_ownership(result, CHILD_DENIED).into_result(CHILD_DENIED)?;

    Ok(next.run(req).await)
}

/// Require the validated family to own the word set in the path
///
/// As with [`require_parent_of_child`], an outage is indistinguishable from a
/// refusal to the caller.
pub async fn require_family_owns_word_set(
    State(check): State<OwnershipCheck>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let family_id = req
        .extensions()
        .get::<ValidatedFamilyId>()
        .cloned()
        .ok_or(AuthError::MissingContext("family"))?;
    let word_set_id = check.target(&params)?;

    let result = check
        .directory
        .verify_family_owns_word_set(family_id.as_str(), word_set_id)
        .await;
    log_ownership(&result, "word_set", family_id.as_str(), word_set_id);
    check_ownership(result, WORD_SET_DENIED).into_result(WORD_SET_DENIED)?;

    Ok(next.run(req).await)
}

fn log_ownership(result: &Result<(), DirectoryError>, kind: &str, owner: &str, target: &str) {
    match result {
        Ok(()) => debug!(kind, owner = %owner, target = %target, "Ownership confirmed"),
        Err(DirectoryError::Unavailable(detail)) => {
            error!(kind, owner = %owner, target = %target, error = %detail, "Ownership lookup failed");
        }
        Err(e) => warn!(kind, owner = %owner, target = %target, error = %e, "Ownership denied"),
    }
}
