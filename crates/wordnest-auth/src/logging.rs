//! Logging initialization
//!
//! Services embedding the auth core call [`LoggingConfig::init`] once at
//! startup. Output goes to stderr; `RUST_LOG` overrides the configured level.
//!
//! ```rust,no_run
//! use wordnest_auth::LoggingConfig;
//!
//! LoggingConfig::default().init()?;
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub structured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,wordnest_auth=debug".to_string(),
            structured: false,
        }
    }
}

impl LoggingConfig {
    /// JSON logging at the given level, for production deployments
    pub fn structured(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            structured: true,
        }
    }

    /// Install the global tracing subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed.
    pub fn init(&self) -> io::Result<()> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        let subscriber = tracing_subscriber::registry().with(filter);

        if self.structured {
            subscriber
                .with(fmt::layer().json().with_writer(io::stderr))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        } else {
            subscriber
                .with(fmt::layer().with_writer(io::stderr))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        }
    }
}
