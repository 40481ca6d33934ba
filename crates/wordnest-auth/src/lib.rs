//! # Wordnest Auth - Identity Verification and Family-Scoped Authorization
//!
//! Turns a request's bearer credential into a verified [`Identity`], maps it
//! to a local account, and decides who may act on which family's data.
//!
//! ## Architecture
//!
//! - [`identity`] - the verified [`Identity`] value, rebuilt per request
//! - [`validator`] - [`SessionValidator`] and its two implementations
//!   - [`OidcValidator`] - discovery, key-set cache, signed-token checks
//!   - [`StaticValidator`] - fixed identity for development and tests
//! - [`jwt`] - key-set cache ([`jwt::KeyStore`]) and claim rules ([`jwt::ClaimValidator`])
//! - [`account`] - local accounts, roles and the [`AccountDirectory`] boundary
//! - [`context`] - request-scoped context and axum extractors
//! - [`middleware`] - authentication and authorization layers
//! - [`config`] / [`logging`] - configuration loading and tracing setup
//! - [`error`] - [`AuthError`] and its HTTP mapping
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use axum::{Router, middleware::from_fn_with_state, routing::get};
//! use wordnest_auth::{
//!     AccountContext, AuthConfig, MemoryAccountDirectory, build_validator,
//!     middleware::{AuthState, require_account},
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::from_env()?;
//! let validator = build_validator(&config).await?;
//! let state = AuthState::new(validator, Arc::new(MemoryAccountDirectory::new()))
//!     .with_carriers(config.carriers.clone());
//!
//! let _app: Router = Router::new()
//!     .route("/me", get(|ctx: AccountContext| async move { ctx.account_id }))
//!     .layer(from_fn_with_state(state, require_account));
//! # Ok(())
//! # }
//! ```
//!
//! ## Status Mapping
//!
//! | Outcome | Status |
//! |---------|--------|
//! | no or invalid credential, missing context | 401 |
//! | valid identity, no local account | 404 with `needsRegistration` |
//! | inactive account, role/family/ownership denial | 403 |
//! | directory or discovery failure | 500 |

pub mod account;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod jwt;
pub mod logging;
pub mod middleware;
pub mod validator;

#[doc(inline)]
pub use account::{AccountDirectory, DirectoryError, LocalAccount, MemoryAccountDirectory, Role};

#[doc(inline)]
pub use config::{AuthConfig, CarrierConfig, ConfigError, ValidatorMode};

#[doc(inline)]
pub use context::{AccountContext, IdentityContext, ValidatedFamilyId};

#[doc(inline)]
pub use error::{AuthError, AuthResult};

#[doc(inline)]
pub use identity::Identity;

#[doc(inline)]
pub use logging::LoggingConfig;

#[doc(inline)]
pub use validator::{OidcValidator, SessionValidator, StaticValidator, build_validator};
