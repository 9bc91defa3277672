//! Error types for security group API operations.
//!
//! Errors are categorized to enable smart retry logic and so callers can
//! tell a rule that already exists apart from a real failure.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of API errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limiting, timeouts, connection failures (transient, retryable)
    Transient,
    /// Group or VPC not found
    NotFound,
    /// The group or rule already exists
    Duplicate,
    /// Caller is not allowed to perform the operation
    Permission,
    /// The request was rejected as malformed
    Invalid,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Whether this error can be safely ignored (mutation already applied).
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::Duplicate)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transient => "Transient API failure",
            Self::NotFound => "Resource not found",
            Self::Duplicate => "Already exists",
            Self::Permission => "Permission denied",
            Self::Invalid => "Invalid request",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Transient => "Wait a moment and run apply again",
            Self::NotFound => "Check the group identifier and VPC in your configuration",
            Self::Duplicate => "No action needed - the resource already exists",
            Self::Permission => "Check the credentials used for the networking API",
            Self::Invalid => "Check the rule definition for unsupported values",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while talking to the networking API.
#[derive(Debug, Error)]
pub enum Error {
    /// Request was throttled by the API
    #[error("request throttled: {message}")]
    Throttled {
        /// Message returned by the API
        message: String,
    },

    /// Network-level failure (connection, timeout, 5xx)
    #[error("network error: {message}")]
    Network {
        /// Detailed error message from the failed request
        message: String,
    },

    /// A security group does not exist
    #[error("security group not found: {id}")]
    GroupNotFound {
        /// Identifier (or name) that could not be found
        id: String,
    },

    /// A group with the same name already exists in the VPC
    #[error("security group already exists: {name}")]
    DuplicateGroup {
        /// Name of the existing group
        name: String,
    },

    /// The ingress rule is already authorized on the group
    #[error("rule already authorized on {group_id}: {rule}")]
    DuplicateRule {
        /// Group the rule was authorized on
        group_id: String,
        /// Rendered rule
        rule: String,
    },

    /// Caller lacks permission
    #[error("permission denied: {message}")]
    Permission {
        /// Details about what permission was denied
        message: String,
    },

    /// Request rejected as invalid
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Reason the request was rejected
        message: String,
    },

    /// HTTP error with a status code not covered above
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response description
        message: String,
    },

    /// State file could not be read or written
    #[error("state file error at {path}: {source}")]
    StateFile {
        /// Path of the state file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Throttled { .. } | Error::Network { .. } => ErrorCategory::Transient,
            Error::GroupNotFound { .. } | Error::Http { status: 404, .. } => {
                ErrorCategory::NotFound
            }
            Error::DuplicateGroup { .. } | Error::DuplicateRule { .. } => {
                ErrorCategory::Duplicate
            }
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::InvalidRequest { .. } => ErrorCategory::Invalid,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error can be safely ignored.
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }

    /// Build an error from an HTTP status code and response message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 | 503 => Error::Throttled { message },
            500..=599 => Error::Network {
                message: format!("HTTP {status}: {message}"),
            },
            400 | 422 => Error::InvalidRequest { message },
            401 | 403 => Error::Permission { message },
            409 => Error::DuplicateRule {
                group_id: String::new(),
                rule: message,
            },
            _ => Error::Http { status, message },
        }
    }

    /// Name the group a failed request targeted, for errors that refer to one.
    pub fn for_group(self, group_id: &str) -> Self {
        match self {
            Error::Http { status: 404, .. } => Error::GroupNotFound {
                id: group_id.to_string(),
            },
            Error::DuplicateRule { rule, .. } => Error::DuplicateRule {
                group_id: group_id.to_string(),
                rule,
            },
            other => other,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::from_status(code, format!("HTTP {code}")),
            ureq::Error::Timeout(_)
            | ureq::Error::Io(_)
            | ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound => Self::Network {
                message: err.to_string(),
            },
            other => Self::Other(other.to_string()),
        }
    }
}

/// Result type for networking API operations.
pub type Result<T> = std::result::Result<T, Error>;
