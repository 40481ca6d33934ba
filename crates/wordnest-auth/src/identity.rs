//! Verified identity produced by a [`SessionValidator`](crate::validator::SessionValidator)
//!
//! An [`Identity`] is reconstructed on every request from the presented
//! credential and is never persisted. Validators only hand one out after a
//! fully successful validation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait key for the display name
pub const TRAIT_NAME: &str = "name";
/// Trait key for the email address
pub const TRAIT_EMAIL: &str = "email";

/// The verified result of validating a credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable subject identifier (`sub`), never empty
    pub id: String,
    /// Best-effort contact address
    #[serde(default)]
    pub email: Option<String>,
    /// Whether the issuer vouches for the email address
    #[serde(default = "default_true")]
    pub verified: bool,
    /// Secondary attributes (display name, email, ...)
    #[serde(default)]
    pub traits: HashMap<String, Value>,
    /// Opaque correlation id from the credential (`jti`)
    #[serde(default)]
    pub session_id: Option<String>,
    /// Whether the credential itself is usable
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Identity {
    /// Create an active, verified identity with no optional fields
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            verified: true,
            traits: HashMap::new(),
            session_id: None,
            active: true,
        }
    }

    /// Set the email address (also recorded as a trait)
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        let email = email.into();
        self.traits
            .insert(TRAIT_EMAIL.to_string(), Value::String(email.clone()));
        self.email = Some(email);
        self
    }

    /// Set the display name trait
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.traits
            .insert(TRAIT_NAME.to_string(), Value::String(name.into()));
        self
    }

    /// Set the session correlation id
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the email verification state
    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    /// Fixed identity used by the static validator when none is configured
    pub fn development() -> Self {
        Self::new("00000000-0000-0000-0000-000000000001")
            .with_email("dev@wordnest.local")
            .with_name("Dev Parent")
            .with_session_id("dev-session")
    }

    /// Display name trait, if present
    pub fn display_name(&self) -> Option<&str> {
        self.traits.get(TRAIT_NAME).and_then(Value::as_str)
    }
}
