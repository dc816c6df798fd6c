//! Decoding of lexoffice error responses.
//!
//! lexoffice answers failed requests in one of two JSON shapes, depending on
//! the endpoint. Older endpoints (contacts, files, profile) use the legacy
//! shape:
//!
//! ```json
//! {
//!   "requestId": "3fb21ee4-ad26-4e2f-82af-a1197af02d08",
//!   "IssueList": [
//!     {"i18nKey": "missing_entity", "source": "company.name", "type": "validation_failure"}
//!   ]
//! }
//! ```
//!
//! Newer endpoints (invoices, event subscriptions) use the regular shape:
//!
//! ```json
//! {
//!   "timestamp": "2017-05-11T17:12:31.233+02:00",
//!   "status": 406,
//!   "error": "Not Acceptable",
//!   "path": "/v1/invoices",
//!   "traceId": "90d78d0777be",
//!   "message": "Validation failed for request. Please see details list for specific causes.",
//!   "details": [
//!     {"violation": "NOTNULL", "field": "lineItems[0].unitPrice.taxRatePercentage", "message": "darf nicht leer sein"}
//!   ]
//! }
//! ```
//!
//! Which shape to expect is a property of the endpoint, so every [`Resource`]
//! names its [`ErrorSchema`].

use serde::Deserialize;

use crate::error::{ApiError, Issue};
use crate::http::HttpResponse;

/// The JSON shape an endpoint uses for error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSchema {
    /// `requestId` + `IssueList`.
    Legacy,
    /// `status` + `message` + `details`.
    Current,
}

impl ErrorSchema {
    /// Schema for an arbitrary API path such as `/v1/invoices?finalize=true`.
    ///
    /// Paths outside the known resources fall back to [`ErrorSchema::Legacy`].
    pub fn for_path(path: &str) -> Self {
        Resource::from_path(path).map_or(ErrorSchema::Legacy, Resource::error_schema)
    }
}

/// API resources and the error schema each one responds with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Contacts,
    Invoices,
    Files,
    Profile,
    EventSubscriptions,
}

impl Resource {
    const ALL: [Resource; 5] = [
        Resource::Contacts,
        Resource::Invoices,
        Resource::Files,
        Resource::Profile,
        Resource::EventSubscriptions,
    ];

    /// First path segment after `/v1/`.
    pub const fn segment(self) -> &'static str {
        match self {
            Resource::Contacts => "contacts",
            Resource::Invoices => "invoices",
            Resource::Files => "files",
            Resource::Profile => "profile",
            Resource::EventSubscriptions => "event-subscriptions",
        }
    }

    pub const fn error_schema(self) -> ErrorSchema {
        match self {
            Resource::Contacts | Resource::Files | Resource::Profile => ErrorSchema::Legacy,
            Resource::Invoices | Resource::EventSubscriptions => ErrorSchema::Current,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let rest = path.trim_start_matches('/');
        let rest = rest.strip_prefix("v1/").unwrap_or(rest);
        let segment = rest.split('/').next().unwrap_or_default();
        Self::ALL.into_iter().find(|resource| resource.segment() == segment)
    }
}

/// Legacy error body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LegacyErrorResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "IssueList")]
    pub issue_list: Option<Vec<LegacyIssue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LegacyIssue {
    #[serde(rename = "i18nKey")]
    pub key: String,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Regular (current) error body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErrorResponse {
    // TODO: parse into a proper timestamp type once the client needs to compare them.
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub path: String,
    pub trace_id: String,
    pub message: String,
    pub details: Option<Vec<ErrorDetail>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErrorDetail {
    pub violation: String,
    pub field: String,
    pub message: String,
}

/// Turn an error response into an `ApiError` using the schema of its endpoint.
pub fn classify(response: &HttpResponse, schema: ErrorSchema) -> ApiError {
    let decoded = match schema {
        ErrorSchema::Current => {
            serde_json::from_str(&response.body).map(|body| from_current(body, response.status))
        }
        ErrorSchema::Legacy => {
            serde_json::from_str(&response.body).map(|body| from_legacy(body, response.status))
        }
    };
    decoded.unwrap_or_else(ApiError::DeserializationError)
}

fn from_current(body: ErrorResponse, http_status: u16) -> ApiError {
    let issues: Vec<Issue> = body
        .details
        .unwrap_or_default()
        .into_iter()
        .map(|detail| Issue::Field {
            field: detail.field,
            violation: detail.violation,
            message: detail.message,
        })
        .collect();

    if issues.is_empty() {
        let status = if body.status == 0 { http_status } else { body.status };
        return ApiError::Rejected {
            status,
            error: body.error,
            message: body.message,
        };
    }
    ApiError::Validation {
        status: http_status,
        issues,
    }
}

fn from_legacy(body: LegacyErrorResponse, http_status: u16) -> ApiError {
    let issues: Vec<Issue> = body
        .issue_list
        .unwrap_or_default()
        .into_iter()
        .map(|issue| Issue::Key {
            key: issue.key,
            source: issue.source,
            kind: issue.kind,
        })
        .collect();

    if issues.is_empty() {
        return ApiError::EmptyIssueList {
            status: http_status,
        };
    }
    ApiError::Validation {
        status: http_status,
        issues,
    }
}
