//! Shared vocabulary for the collaborators the orchestrator drives.
//!
//! Every external collaborator (GPS driver, route loader, renderer, e-paper
//! driver, optional network services) reports failures as a [`ServiceError`].
//! Async trait methods return a [`BoxFuture`] so the traits stay
//! dyn-compatible and can be held as `Arc<dyn Trait>`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by external collaborators.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The collaborator is not available (hardware missing, not started).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The collaborator did not answer in time.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// I/O error while talking to the collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other collaborator failure.
    #[error("{0}")]
    Failed(String),
}

impl ServiceError {
    /// Shorthand for [`ServiceError::Failed`].
    pub fn failed(msg: impl Into<String>) -> Self {
        ServiceError::Failed(msg.into())
    }
}

/// Identifies which collaborator an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// Persistent configuration store.
    Config,
    /// GPS position source.
    Gps,
    /// Route / GPX loader.
    Route,
    /// Map renderer.
    Renderer,
    /// Physical e-paper display.
    Display,
    /// A non-essential service such as WiFi onboarding.
    Optional(&'static str),
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Config => write!(f, "config"),
            ServiceKind::Gps => write!(f, "gps"),
            ServiceKind::Route => write!(f, "route"),
            ServiceKind::Renderer => write!(f, "renderer"),
            ServiceKind::Display => write!(f, "display"),
            ServiceKind::Optional(name) => write!(f, "{}", name),
        }
    }
}

/// A service the device can run without, such as WiFi onboarding.
///
/// Start failures are logged and do not abort orchestrator initialisation.
pub trait OptionalService: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Start the service.
    fn start(&self) -> BoxFuture<'_, Result<(), ServiceError>>;

    /// Stop the service. Called during dispose in reverse start order.
    fn stop(&self) -> BoxFuture<'_, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_kind_display() {
        assert_eq!(ServiceKind::Gps.to_string(), "gps");
        assert_eq!(ServiceKind::Optional("wifi").to_string(), "wifi");
    }

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::failed("no fix");
        assert_eq!(err.to_string(), "no fix");

        let err = ServiceError::Timeout(std::time::Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }
}
