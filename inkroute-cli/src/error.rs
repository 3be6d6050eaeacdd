//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use inkroute::config::ConfigFileError;
use inkroute::orchestrator::OrchestratorError;
use inkroute::service::ServiceError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Failed to assemble the orchestrator
    Setup(ServiceError),
    /// An orchestrator operation failed
    Orchestrator {
        operation: &'static str,
        error: OrchestratorError,
    },
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
}

impl CliError {
    pub fn orchestrator(operation: &'static str, error: OrchestratorError) -> Self {
        CliError::Orchestrator { operation, error }
    }

    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Orchestrator { error, .. } if error.is_precondition() => {
                eprintln!();
                eprintln!("The tracker rejected the request in its current state.");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run 'inkroute config path' to find the configuration file,");
                eprintln!("or 'inkroute config init' to write one with defaults.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Setup(e) => write!(f, "Failed to set up tracker: {}", e),
            CliError::Orchestrator { operation, error } => {
                write!(f, "{} failed: {}", operation, error)
            }
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Runtime(e) => Some(e),
            CliError::Setup(e) => Some(e),
            CliError::Orchestrator { error, .. } => Some(error),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_error_names_operation() {
        let err = CliError::orchestrator("start_drive_navigation", OrchestratorError::NoGpsPosition);
        let msg = err.to_string();
        assert!(msg.starts_with("start_drive_navigation failed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: CliError = ConfigFileError::WriteError("disk full".to_string()).into();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("disk full"));
    }
}
