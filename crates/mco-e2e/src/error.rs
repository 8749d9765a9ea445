use thiserror::Error;

/// Errors that can occur while driving the observability e2e scenarios.
#[derive(Debug, Error)]
pub enum E2eError {
    #[error("Invalid test configuration: {message}")]
    Configuration { message: String },
    #[error("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[error("Failed to load or apply manifest: {message}")]
    Manifest { message: String },
    #[error("Kubernetes API request failed: {message}")]
    Api { message: String },
    #[error("Step `{step}` did not converge")]
    Convergence { step: String },
    #[error("Integrity check failed: {message}")]
    Integrity { message: String },
}

impl E2eError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    pub(crate) fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }
}
