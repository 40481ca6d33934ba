//! Axum middleware
//!
//! Authentication runs first and attaches context; authorization checks
//! read that context and can be stacked in any order after it:
//!
//! ```rust,no_run
//! use axum::{Router, middleware::from_fn, middleware::from_fn_with_state, routing::get};
//! use wordnest_auth::middleware::{AuthState, authn, authz};
//! use wordnest_auth::account::Role;
//!
//! # fn build(state: AuthState) -> Router {
//! Router::new()
//!     .route("/families/{family_id}/children/{child_id}", get(|| async { "ok" }))
//!     .layer(from_fn_with_state(
//!         authz::OwnershipCheck::new(state.directory.clone(), "child_id"),
//!         authz::require_parent_of_child,
//!     ))
//!     .layer(from_fn_with_state(
//!         authz::RoleRequirement::new([Role::Parent]),
//!         authz::require_role,
//!     ))
//!     .layer(from_fn(authz::require_family))
//!     .layer(from_fn_with_state(state, authn::require_account))
//! # }
//! ```
//!
//! Layers run outermost-first, so the last `.layer` call is authentication.

pub mod authn;
pub mod authz;

pub use authn::{AuthState, require_account, require_identity};
pub use authz::{
    AuthzDecision, OwnershipCheck, RoleRequirement, require_family, require_family_owns_word_set,
    require_parent_of_child, require_role,
};
