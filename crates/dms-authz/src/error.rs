// DMS2
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Error handling for authorization and group administration
//! Implements RFC 7807 Problem Details format for denied requests

use crate::store::StoreError;
use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes, header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Neutral detail shown for every denied request.
pub const NOT_AUTHORIZED_DETAIL: &str = "You are not authorized to perform this action";

/// Authorization error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// The capability or scope check failed. `redirect_to` is set when the
    /// request had no authenticated identity.
    #[error("Access denied")]
    AccessDenied { redirect_to: Option<String> },

    #[error("Permission resolver unavailable: {message}")]
    ResolverUnavailable { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Unknown capability: {name}")]
    UnknownCapability { name: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl AuthzError {
    /// Denial for an authenticated user
    pub fn access_denied() -> Self {
        AuthzError::AccessDenied { redirect_to: None }
    }

    /// Denial for an anonymous request, redirecting to `location`
    pub fn login_required(location: impl Into<String>) -> Self {
        AuthzError::AccessDenied {
            redirect_to: Some(location.into()),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthzError::NotFound { .. } => StatusCode::NOT_FOUND,
            AuthzError::AccessDenied { redirect_to: Some(_) } => StatusCode::FOUND,
            AuthzError::AccessDenied { redirect_to: None } => StatusCode::FORBIDDEN,
            AuthzError::ResolverUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AuthzError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AuthzError::Conflict { .. } => StatusCode::CONFLICT,
            AuthzError::BadRequest { .. } | AuthzError::UnknownCapability { .. } => StatusCode::BAD_REQUEST,
            AuthzError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            AuthzError::NotFound { .. } => "not_found",
            AuthzError::AccessDenied { .. } => "not_authorized",
            AuthzError::ResolverUnavailable { .. } => "service_unavailable",
            AuthzError::Forbidden { .. } => "forbidden",
            AuthzError::Conflict { .. } => "conflict",
            AuthzError::BadRequest { .. } => "bad_request",
            AuthzError::UnknownCapability { .. } => "unknown_capability",
            AuthzError::Config { .. } => "configuration_error",
        }
    }

    /// Detail safe to show to the end user. Denials and infrastructure faults
    /// never reveal which capability, scope or backend failed.
    pub fn public_detail(&self) -> String {
        match self {
            AuthzError::AccessDenied { .. } => NOT_AUTHORIZED_DETAIL.to_string(),
            AuthzError::ResolverUnavailable { .. } | AuthzError::Config { .. } => "A system error occurred, please try again later".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AuthzError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => AuthzError::NotFound {
                message: format!("{} {} not found", entity, id),
            },
            StoreError::Conflict { message } => AuthzError::Conflict { message },
            StoreError::Unavailable { message } => AuthzError::ResolverUnavailable { message },
        }
    }
}

/// RFC 7807 Problem Details response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type")]
    pub problem_type: String,

    /// A short, human-readable summary of the problem type
    pub title: String,

    /// The HTTP status code generated by the origin server
    pub status: u16,

    /// A human-readable explanation specific to this occurrence
    pub detail: String,

    /// A URI reference that identifies the specific occurrence
    pub instance: String,
}

impl ProblemDetails {
    /// Create a new problem details response
    pub fn new(error: &AuthzError, instance: String) -> Self {
        let status_code = error.status_code();

        Self {
            problem_type: format!("https://dms2.synerthink.com/problems/{}", error.error_type()),
            title: status_code.canonical_reason().unwrap_or("Unknown Error").to_string(),
            status: status_code.as_u16(),
            detail: error.public_detail(),
            instance,
        }
    }
}

/// Convert AuthzError to HTTP response
impl From<AuthzError> for Response<Full<Bytes>> {
    fn from(err: AuthzError) -> Self {
        let status_code = err.status_code();

        match &err {
            AuthzError::ResolverUnavailable { .. } | AuthzError::Config { .. } => error!("Authorization error: {} - {}", status_code, err),
            _ => tracing::debug!("Authorization error: {} - {}", status_code, err),
        }

        if let AuthzError::AccessDenied { redirect_to: Some(location) } = &err {
            return Response::builder()
                .status(status_code)
                .header(header::LOCATION, location.as_str())
                .header(header::CACHE_CONTROL, "no-cache")
                .body(Full::new(Bytes::new()))
                .unwrap_or_else(fallback_response);
        }

        let problem_details = ProblemDetails::new(&err, "/".to_string());
        let json = match serde_json::to_string(&problem_details) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize error response: {}", e);
                r#"{"type":"https://dms2.synerthink.com/problems/internal_server_error","title":"Internal Server Error","status":500,"detail":"A system error occurred","instance":"/"}"#.to_string()
            }
        };

        Response::builder()
            .status(status_code)
            .header(header::CONTENT_TYPE, "application/problem+json")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Full::new(Bytes::from(json)))
            .unwrap_or_else(fallback_response)
    }
}

fn fallback_response(e: hyper::http::Error) -> Response<Full<Bytes>> {
    error!("Failed to build error response: {}", e);
    let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Result type for authorization operations
pub type AuthzResult<T> = Result<T, AuthzError>;
