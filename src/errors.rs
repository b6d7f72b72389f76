//! Typed error hierarchy for the Lines client.
//!
//! Three top-level enums cover the three subsystems:
//! - `ApiError`: anything a REST call can fail with. The query cache records
//!   it and the pages render it.
//! - `SessionError`: session state machine and token storage failures
//! - `ConfigError`: configuration loading failures

use lines_common::FieldError;
use lines_common::envelope::EnvelopeError;
use thiserror::Error;

/// Errors from the HTTP client and service modules.
///
/// Cloneable so one failure can be handed to every consumer attached to a
/// de-duplicated request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// Network unreachable, connection reset, timeout.
    #[error("Network error: {0}")]
    Transport(String),

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    NotFound { message: String },

    /// 4xx with field-level messages, shown inline by the originating form.
    #[error("{message}")]
    Validation {
        status: u16,
        message: String,
        fields: Vec<FieldError>,
    },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// A 2xx response whose envelope reported `success: false`.
    #[error("{message}")]
    Rejected { message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Build the error for a non-success HTTP status, keeping the server's
    /// message verbatim when it sent one.
    pub fn from_status(status: u16, message: Option<String>, fields: Vec<FieldError>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_message(status).to_string());
        match status {
            401 => Self::Unauthorized { message },
            404 => Self::NotFound { message },
            400..=499 => Self::Validation {
                status,
                message,
                fields,
            },
            _ => Self::Server { status, message },
        }
    }

    /// HTTP status of the failed call, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::Validation { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::Rejected { .. } => Some(200),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    /// Message suitable for showing to the user.
    pub fn message(&self) -> String {
        match self {
            Self::Transport(_) => "Unable to reach the server. Please try again.".to_string(),
            Self::Decode(_) => "Something went wrong. Please try again.".to_string(),
            Self::Unauthorized { message }
            | Self::NotFound { message }
            | Self::Validation { message, .. }
            | Self::Server { message, .. }
            | Self::Rejected { message } => message.clone(),
        }
    }

    /// Field-level validation messages, empty for every other kind.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Transport faults and 5xx responses may succeed on retry; validation
    /// and auth failures never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Server { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

fn default_message(status: u16) -> &'static str {
    match status {
        401 => "Authentication required",
        403 => "You do not have permission to do that",
        404 => "Not found",
        400..=499 => "The request was invalid",
        _ => "The server failed to handle the request",
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), None, Vec::new())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<EnvelopeError> for ApiError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Rejected { message, errors } if !errors.is_empty() => {
                Self::Validation {
                    status: 200,
                    message,
                    fields: errors,
                }
            }
            EnvelopeError::Rejected { message, .. } => Self::Rejected { message },
            EnvelopeError::MissingData => Self::Decode(err.to_string()),
        }
    }
}

/// Errors from the session state machine and token persistence.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Failed to access token store at {path}: {source}")]
    TokenStore {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt token store at {path}: {source}")]
    CorruptTokens {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors from loading `lines.toml` and the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
