//! Error types for the Buildship CLI

use thiserror::Error;

/// Main error type for the Buildship CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status when the server answered at all
        status: Option<u16>,
    },

    #[error("Deployment cancelled")]
    UserCancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    pub fn api(message: impl Into<String>) -> Self {
        CliError::Api {
            message: message.into(),
            status: None,
        }
    }

    pub fn api_status(status: u16, message: impl Into<String>) -> Self {
        CliError::Api {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Silent errors end the run without being rendered.
    pub fn is_silent(&self) -> bool {
        matches!(self, CliError::UserCancelled)
    }

    /// Transport failures and server-side 5xx answers are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            CliError::Api { status: None, .. } => true,
            CliError::Api { status: Some(s), .. } => *s >= 500,
            _ => false,
        }
    }

    /// Extra line shown under the error message, if any
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CliError::Api {
                status: Some(401 | 403),
                ..
            } => Some("Your session has expired or is invalid. Run `buildship login` and try again."),
            CliError::FileSystem(msg) if msg.contains("2 GiB") => {
                Some("Use `buildship cp` to upload large files separately.")
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::FileSystem(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Internal(format!("JSON error: {err}"))
    }
}

impl From<reqwest::Error> for CliError {
    fn from(err: reqwest::Error) -> Self {
        CliError::Api {
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
        }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Configuration(err.to_string())
    }
}

impl From<zip::result::ZipError> for CliError {
    fn from(err: zip::result::ZipError) -> Self {
        CliError::FileSystem(format!("archive error: {err}"))
    }
}

impl From<walkdir::Error> for CliError {
    fn from(err: walkdir::Error) -> Self {
        CliError::FileSystem(format!("failed to walk directory: {err}"))
    }
}

impl From<tokio::task::JoinError> for CliError {
    fn from(err: tokio::task::JoinError) -> Self {
        CliError::Internal(format!("task failed: {err}"))
    }
}
