//! Backend health reporting.
//!
//! [`check_health`](crate::backend::StorageBackend::check_health) answers with
//! a [`HealthReport`]: a liveness boolean, the reporting backend's name, and
//! an optional status string for human consumption. A merely-disconnected
//! backend is reported as unhealthy, never as an error - only an unrecoverable
//! internal fault fails the check itself.
//!
//! The conventional status vocabulary is the connection lifecycle
//! (`connected`, `disconnected`, `connecting`, `disconnecting`), which the
//! liveness/readiness endpoints upstream render verbatim, but adapters may
//! report any string that describes their engine's state.

use serde::Serialize;

/// Result of a backend health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    healthy: bool,
    backend: String,
    status: Option<String>,
}

impl HealthReport {
    /// Creates a healthy report for the named backend.
    #[must_use]
    pub fn healthy(backend: impl Into<String>) -> Self {
        Self { healthy: true, backend: backend.into(), status: None }
    }

    /// Creates an unhealthy report for the named backend.
    #[must_use]
    pub fn unhealthy(backend: impl Into<String>) -> Self {
        Self { healthy: false, backend: backend.into(), status: None }
    }

    /// Attaches a status string (e.g. `connected`).
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Whether the backend considers itself live.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// The name of the backend that produced this report.
    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// The optional status string.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}
