//! Error types for the lexoffice client.
//!
//! # Design
//! lexoffice reports failures in two JSON shapes (see [`crate::error_response`]).
//! Both collapse into the same variants here: `Validation` when the body lists
//! individual issues, `Rejected` or `EmptyIssueList` when it does not. The
//! `Display` output joins every issue on its own line so the error can be shown
//! or logged as-is.

use std::fmt;

use crate::transport::TransportError;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// A single problem reported by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// Entry of a current-shape `details` list.
    Field {
        field: String,
        violation: String,
        message: String,
    },
    /// Entry of a legacy-shape `IssueList`.
    Key {
        key: String,
        source: String,
        kind: String,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::Field {
                field,
                violation,
                message,
            } => write!(f, "field: {field} ({violation}): {message}"),
            Issue::Key { key, source, kind } => write!(f, "key: {key} ({source}): {kind}"),
        }
    }
}

/// Errors returned by `LexofficeClient` operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("serialization failed: {0}")]
    SerializationError(#[source] serde_json::Error),

    #[error("decoding error while unpacking response: {0}")]
    DeserializationError(#[source] serde_json::Error),

    /// The API rejected the request and listed at least one issue.
    #[error("{}", join_issues(.issues))]
    Validation { status: u16, issues: Vec<Issue> },

    /// Current-shape error response without any details.
    #[error("error: {message} ({status} {error})")]
    Rejected {
        status: u16,
        error: String,
        message: String,
    },

    /// Legacy-shape error response without any issues.
    #[error("something went wrong but unclear what (empty IssueList)")]
    EmptyIssueList { status: u16 },

    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing API token: set {0}")]
    MissingToken(&'static str),
}

impl ApiError {
    /// HTTP status of a classified error response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Validation { status, .. }
            | ApiError::Rejected { status, .. }
            | ApiError::EmptyIssueList { status } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    pub fn issues(&self) -> &[Issue] {
        match self {
            ApiError::Validation { issues, .. } => issues,
            _ => &[],
        }
    }
}

fn join_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(Issue::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
