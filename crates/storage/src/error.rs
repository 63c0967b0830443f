//! Storage error types and result alias.
//!
//! This module defines the error taxonomy for the storage layer. Backend
//! adapters must map their engine-native errors to these standardized kinds;
//! no engine-specific error type crosses the storage boundary except as a
//! preserved [`source`](std::error::Error::source).
//!
//! # Error Types
//!
//! - [`StorageError::Unavailable`] - Backend unreachable or not connected
//! - [`StorageError::UnsupportedBackend`] - Config selector names an unregistered backend
//! - [`StorageError::Unimplemented`] - Backend is missing a required capability
//! - [`StorageError::NotFound`] - Record does not exist (where the calling convention
//!   cannot return `None` instead)
//! - [`StorageError::Conflict`] - Identity uniqueness violation or rejected unit of work
//! - [`StorageError::ImmutableIdentity`] - A patch attempted to modify the identity field
//! - [`StorageError::InvalidTransaction`] - Operation on an already-resolved transaction
//! - [`StorageError::InvalidSearchCriteria`] - Search input produced zero usable matchers
//! - [`StorageError::Serialization`] - Record marshalling failures
//! - [`StorageError::Internal`] - Backend-specific internal errors
//!
//! # Example
//!
//! ```
//! use appdir_storage::{Record, StorageError, StorageResult};
//!
//! fn require_found(found: Option<Record>, key: &str) -> StorageResult<Record> {
//!     found.ok_or_else(|| StorageError::not_found(key))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

use crate::transaction::TransactionState;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
///
/// All storage operations return this type, providing consistent error handling
/// across different backend implementations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// This enum represents the canonical set of errors that any storage backend
/// can produce. Backend implementations should map their internal error types
/// to these variants.
///
/// Errors preserve their source chain via the `#[source]` attribute, enabling
/// debugging tools to display the full error context.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]` - new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The backend cannot be reached, or a data operation was issued against a
    /// disconnected backend.
    ///
    /// Fatal during startup (the process should not begin serving); at runtime
    /// it is recoverable by retry external to this layer.
    #[error("Backend unavailable: {message}")]
    Unavailable {
        /// Description of the availability failure.
        message: String,
        /// The underlying error that caused the failure.
        #[source]
        source: Option<BoxError>,
    },

    /// The configured backend selector names no registered backend.
    ///
    /// This is a configuration error and is fatal to the startup path.
    #[error("Unsupported backend: {selector:?}")]
    UnsupportedBackend {
        /// The selector value that failed to resolve.
        selector: String,
    },

    /// The backend does not implement a required capability.
    ///
    /// This is a programmer error: every operation the orchestrator calls must
    /// be implemented by the selected backend, and a missing one fails fast
    /// instead of silently doing nothing.
    #[error("Unimplemented capability: {operation}")]
    Unimplemented {
        /// The contract operation the backend is missing.
        operation: String,
    },

    /// The requested record was not found.
    ///
    /// Lookup operations return `Ok(None)` for a missing record wherever the
    /// calling convention allows; this kind exists for adapters whose engines
    /// report "missing" as a fault, and for callers that require presence.
    #[error("Record not found: {key}")]
    NotFound {
        /// The collection-qualified identity that was not found.
        key: String,
    },

    /// Identity uniqueness violation.
    ///
    /// Raised when a create targets an identity that already exists, including
    /// at commit time when a buffered unit of work loses a race. The whole
    /// unit is rejected; retrying after a fresh read is the usual response.
    #[error("Conflict in {collection:?}: identity {identity:?} already exists")]
    Conflict {
        /// The collection in which the conflict occurred.
        collection: String,
        /// The identity that already exists.
        identity: String,
    },

    /// A patch attempted to modify a record's identity field.
    ///
    /// The identity field is immutable once set; updates that name it are
    /// rejected without touching the record.
    #[error("Cannot modify identity field {field:?} of collection {collection:?}")]
    ImmutableIdentity {
        /// The collection whose identity field was targeted.
        collection: String,
        /// The identity field name.
        field: String,
    },

    /// Operation on a transaction that is not in the required state.
    ///
    /// Committing or aborting an already-resolved handle, or buffering further
    /// operations on one, is caller misuse and leaves the handle's terminal
    /// state unchanged.
    #[error("Invalid transaction state: cannot {operation} a transaction that is {state}")]
    InvalidTransaction {
        /// The operation that was attempted.
        operation: String,
        /// The state the transaction was actually in.
        state: TransactionState,
    },

    /// The search input produced zero usable matchers.
    ///
    /// Individual bad criteria degrade into warnings; only a fully-empty
    /// criteria set is an error. The accumulated warnings explain what was
    /// ignored and why. No backend call is made.
    #[error("No valid search criteria ({} degraded)", warnings.len())]
    InvalidSearchCriteria {
        /// Warnings accumulated while compiling the search input.
        warnings: Vec<String>,
    },

    /// Serialization or deserialization error.
    ///
    /// This error occurs when a record cannot be marshalled for storage or
    /// unmarshalled when retrieved. This typically indicates data corruption
    /// or schema incompatibility.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// Internal storage backend error.
    ///
    /// This is a catch-all for backend-specific errors that don't fit other
    /// categories.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },
}

impl StorageError {
    /// Creates a new `Unavailable` error with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into(), source: None }
    }

    /// Creates a new `Unavailable` error with a message and source error.
    #[must_use]
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unavailable { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `UnsupportedBackend` error for the given selector.
    #[must_use]
    pub fn unsupported_backend(selector: impl Into<String>) -> Self {
        Self::UnsupportedBackend { selector: selector.into() }
    }

    /// Creates a new `Unimplemented` error for the given contract operation.
    #[must_use]
    pub fn unimplemented(operation: impl Into<String>) -> Self {
        Self::Unimplemented { operation: operation.into() }
    }

    /// Creates a new `NotFound` error for the given key.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `Conflict` error for the given collection and identity.
    #[must_use]
    pub fn conflict(collection: impl Into<String>, identity: impl Into<String>) -> Self {
        Self::Conflict { collection: collection.into(), identity: identity.into() }
    }

    /// Creates a new `ImmutableIdentity` error for the given collection and field.
    #[must_use]
    pub fn immutable_identity(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ImmutableIdentity { collection: collection.into(), field: field.into() }
    }

    /// Creates a new `InvalidTransaction` error for an operation attempted in
    /// the given state.
    #[must_use]
    pub fn invalid_transaction(operation: impl Into<String>, state: TransactionState) -> Self {
        Self::InvalidTransaction { operation: operation.into(), state }
    }

    /// Creates a new `InvalidSearchCriteria` error carrying the accumulated
    /// degradation warnings.
    #[must_use]
    pub fn invalid_search_criteria(warnings: Vec<String>) -> Self {
        Self::InvalidSearchCriteria { warnings }
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }
}

/// Errors produced while constructing configuration values.
///
/// Kept separate from [`StorageError`] because configuration is assembled
/// before any backend exists; it converts into
/// [`StorageError::Internal`] when it surfaces through a storage path.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required field was missing or malformed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for StorageError {
    fn from(err: ConfigError) -> Self {
        StorageError::internal_with_source("invalid storage configuration", err)
    }
}
