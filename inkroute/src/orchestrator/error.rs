//! Orchestrator error type.

use thiserror::Error;

use crate::display::DisplayError;
use crate::service::ServiceKind;

/// Boxed collaborator error carried by [`OrchestratorError::Dependency`].
pub type DependencySource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by [`Orchestrator`](super::Orchestrator) operations.
///
/// Validation and precondition errors never mutate device state. A
/// dependency error names the orchestrator operation that was running and
/// the collaborator that failed.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A setter rejected its input.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Drive navigation is already running.
    #[error("drive navigation is already active")]
    NavigationAlreadyActive,

    /// No GPS position is known yet.
    #[error("no GPS position available")]
    NoGpsPosition,

    /// Drive navigation has not been started.
    #[error("drive navigation has not been started")]
    NavigationNotStarted,

    /// The operation needs an active route.
    #[error("no active route")]
    NoActiveRoute,

    /// `initialize()` has not completed.
    #[error("orchestrator is not initialized")]
    NotInitialized,

    /// A collaborator failed while an operation was running.
    #[error("{operation}: {service} failed: {source}")]
    Dependency {
        operation: &'static str,
        service: ServiceKind,
        #[source]
        source: DependencySource,
    },
}

impl OrchestratorError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        OrchestratorError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn dependency(
        operation: &'static str,
        service: ServiceKind,
        source: impl Into<DependencySource>,
    ) -> Self {
        OrchestratorError::Dependency {
            operation,
            service,
            source: source.into(),
        }
    }

    /// Attribute a pipeline failure to the renderer or the panel.
    pub(crate) fn from_display(operation: &'static str, error: DisplayError) -> Self {
        Self::dependency(operation, display_service(&error), error)
    }

    /// Whether this is a precondition the caller can resolve and retry.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            OrchestratorError::NavigationAlreadyActive
                | OrchestratorError::NoGpsPosition
                | OrchestratorError::NavigationNotStarted
                | OrchestratorError::NoActiveRoute
        )
    }
}

/// Collaborator responsible for a pipeline failure.
pub(crate) fn display_service(error: &DisplayError) -> ServiceKind {
    match error {
        DisplayError::Render(_) | DisplayError::Encode(_) => ServiceKind::Renderer,
        DisplayError::Push(_) | DisplayError::InvalidBitmap(_) => ServiceKind::Display,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceError;
    use std::error::Error as _;

    #[test]
    fn test_dependency_message_names_operation_and_service() {
        let err = OrchestratorError::dependency(
            "initialize",
            ServiceKind::Gps,
            ServiceError::Unavailable("no serial port".into()),
        );
        let msg = err.to_string();
        assert!(msg.contains("initialize"));
        assert!(msg.contains("gps"));
        assert!(msg.contains("no serial port"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_display_errors_are_attributed() {
        let err = OrchestratorError::from_display(
            "update_display",
            DisplayError::Push(ServiceError::failed("SPI busy")),
        );
        assert!(matches!(
            err,
            OrchestratorError::Dependency {
                service: ServiceKind::Display,
                ..
            }
        ));
    }

    #[test]
    fn test_precondition_classification() {
        assert!(OrchestratorError::NoGpsPosition.is_precondition());
        assert!(!OrchestratorError::NotInitialized.is_precondition());
        assert!(!OrchestratorError::validation("zoom", "bad").is_precondition());
    }
}
