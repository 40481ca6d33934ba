//! Authentication configuration
//!
//! [`AuthConfig`] selects the validator implementation and carries everything
//! the auth core consumes: issuer, audience, TLS policy and the credential
//! carriers the middleware probes.
//!
//! Configuration can be built programmatically or loaded with the `config`
//! crate from a file and/or `WORDNEST_AUTH_*` environment variables:
//!
//! ```text
//! WORDNEST_AUTH_MODE=oidc
//! WORDNEST_AUTH_ISSUER_URL=https://auth.example
//! WORDNEST_AUTH_AUDIENCE=wordnest-api
//! WORDNEST_AUTH_CARRIERS__TOKEN_HEADER=X-Session-Token
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// Environment variable prefix for [`AuthConfig::from_env`]
pub const ENV_PREFIX: &str = "WORDNEST_AUTH";

/// Default staleness window for the cached key set
pub const DEFAULT_KEY_CACHE_TTL_SECS: u64 = 300;

/// Default timeout applied to discovery and key-set requests
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Which [`SessionValidator`](crate::validator::SessionValidator) to build
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorMode {
    /// Discovery + key-set backed token verification
    #[default]
    Oidc,
    /// Fixed identity for local development and tests
    Static,
}

/// Where the middleware looks for credentials after the `Authorization` header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CarrierConfig {
    /// Cookie names tried in order
    pub cookie_names: Vec<String>,
    /// Header carrying a raw token
    pub token_header: String,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            cookie_names: vec![
                "ory_kratos_session".to_string(),
                "wordnest_session".to_string(),
                "auth_token".to_string(),
            ],
            token_header: "X-Session-Token".to_string(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Validator selection
    pub mode: ValidatorMode,
    /// Token issuer; required in `oidc` mode
    pub issuer_url: Option<String>,
    /// Expected `aud` value, if audience checking is wanted
    pub audience: Option<String>,
    /// Accept invalid TLS certificates from the issuer (development only)
    pub insecure_skip_tls_verify: bool,
    /// Timeout for discovery and key-set requests, in seconds
    pub http_timeout_secs: u64,
    /// Key-set staleness window, in seconds
    pub key_cache_ttl_secs: u64,
    /// Credential carriers
    pub carriers: CarrierConfig,
    /// Identity returned by the static validator
    pub static_identity: Option<Identity>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: ValidatorMode::Oidc,
            issuer_url: None,
            audience: None,
            insecure_skip_tls_verify: false,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            key_cache_ttl_secs: DEFAULT_KEY_CACHE_TTL_SECS,
            carriers: CarrierConfig::default(),
            static_identity: None,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Semantically invalid configuration
    #[error("Invalid auth configuration: {0}")]
    Invalid(String),
}

impl AuthConfig {
    /// Protocol-backed configuration for the given issuer
    pub fn oidc(issuer_url: impl Into<String>) -> Self {
        Self {
            mode: ValidatorMode::Oidc,
            issuer_url: Some(issuer_url.into()),
            ..Default::default()
        }
    }

    /// Static-identity configuration (development only)
    pub fn static_mode() -> Self {
        Self {
            mode: ValidatorMode::Static,
            ..Default::default()
        }
    }

    /// Set the expected audience
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Set the identity returned in static mode
    #[must_use]
    pub fn with_static_identity(mut self, identity: Identity) -> Self {
        self.static_identity = Some(identity);
        self
    }

    /// Toggle TLS verification bypass
    #[must_use]
    pub fn with_insecure_skip_tls_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_tls_verify = skip;
        self
    }

    /// Replace the credential carriers
    #[must_use]
    pub fn with_carriers(mut self, carriers: CarrierConfig) -> Self {
        self.carriers = carriers;
        self
    }

    /// Load configuration from `WORDNEST_AUTH_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the resulting
    /// configuration fails [`AuthConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_source(env_source())
    }

    fn from_env_source(env: config::Environment) -> Result<Self, ConfigError> {
        Self::load(config::Config::builder().add_source(env))
    }

    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// Environment variables with the `WORDNEST_AUTH_` prefix override file
    /// settings, e.g. `WORDNEST_AUTH_AUDIENCE=wordnest-api`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_env(path.as_ref(), env_source())
    }

    fn from_file_with_env(
        path: &std::path::Path,
        env: config::Environment,
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        Self::load(
            Config::builder()
                .add_source(File::new(
                    path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                    format,
                ))
                .add_source(env),
        )
    }

    fn load(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let auth: Self = builder.build()?.try_deserialize()?;
        auth.validate()?;
        Ok(auth)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `oidc` mode has no issuer URL or
    /// the timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == ValidatorMode::Oidc
            && self.issuer_url.as_deref().is_none_or(|s| s.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "issuer_url is required in oidc mode".to_string(),
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_source() -> config::Environment {
    // WORDNEST_AUTH_AUDIENCE, WORDNEST_AUTH_CARRIERS__COOKIE_NAMES
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("carriers.cookie_names")
}
