//! Storage layer configuration.
//!
//! This module provides [`StorageConfig`], the typed value the bootstrap layer
//! hands to [`Store::from_config`](crate::store::Store::from_config): a backend
//! selector string (the `DB_TYPE`-equivalent setting) plus an optional
//! connection URI for engines that need one. The in-memory engine ignores the
//! URI.
//!
//! Selector values are not validated against the registered backends here -
//! the config layer is format-only, and backend selection is where an unknown
//! selector fails (with
//! [`StorageError::UnsupportedBackend`](crate::StorageError::UnsupportedBackend)).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Selector value for the in-memory document engine.
pub const MEMORY_BACKEND: &str = "memory";

/// Configuration for constructing a [`Store`](crate::store::Store).
///
/// Deserializable so the bootstrap layer above can load it from any format it
/// likes; unknown fields are rejected to catch typos early.
///
/// # Example
///
/// ```
/// use appdir_storage::StorageConfig;
///
/// let config = StorageConfig::builder().backend("memory").build()?;
/// assert_eq!(config.backend(), "memory");
/// # Ok::<(), appdir_storage::ConfigError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend selector, e.g. `"memory"`.
    pub(crate) backend: String,

    /// Connection URI for engines that need one.
    #[serde(default)]
    pub(crate) uri: Option<String>,
}

#[bon::bon]
impl StorageConfig {
    /// Creates a new configuration, validating the selector.
    ///
    /// # Arguments
    ///
    /// * `backend` - Backend selector string. Must be non-blank.
    ///
    /// # Optional Fields
    ///
    /// * `uri` - Connection URI, for engines that connect to something.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the selector is empty or whitespace-only.
    #[builder]
    pub fn new(
        #[builder(into)] backend: String,
        #[builder(into)] uri: Option<String>,
    ) -> Result<Self, ConfigError> {
        if backend.trim().is_empty() {
            return Err(ConfigError::Invalid("backend selector cannot be empty".into()));
        }

        Ok(Self { backend, uri })
    }

    /// Returns the backend selector.
    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Returns the connection URI if configured.
    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }
}
