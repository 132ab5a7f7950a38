use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Controls whether error responses include the full `Debug` rendering of the error.
///
/// WARNING: backend URLs and raw response fragments end up in the message when this is on.
static DEBUG: OnceCell<bool> = OnceCell::const_new();

pub fn set_debug(debug: bool) -> Result<(), Error> {
    DEBUG.set(debug).map_err(|_| {
        Error::new(ErrorDetails::Config {
            message: "Failed to set debug mode".to_string(),
        })
    })
}

pub fn is_debug() -> bool {
    *DEBUG.get().unwrap_or(&false)
}

pub const IMPOSSIBLE_ERROR_MESSAGE: &str =
    "This should never happen, please file a bug report against the catalog gateway";

#[derive(Clone, Debug, Error, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
#[error(transparent)]
// As long as the struct member is private, we force people to use the `new` method and log the error.
pub struct Error(Arc<ErrorDetails>);

impl Error {
    pub fn new(details: ErrorDetails) -> Self {
        details.log();
        Error(Arc::new(details))
    }

    pub fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    pub fn get_details(&self) -> &ErrorDetails {
        &self.0
    }

    pub fn log(&self) {
        self.0.log();
    }
}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Error::new(details)
    }
}

#[derive(Debug, Error, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
pub enum ErrorDetails {
    /// A category backend could not be reached, or answered with a non-success status.
    BackendUnreachable {
        category_id: String,
        endpoint: String,
        message: String,
    },
    /// A category backend answered, but its body was not a usable product envelope.
    BackendMalformed {
        category_id: String,
        endpoint: String,
        message: String,
    },
    Config {
        message: String,
    },
    InternalError {
        message: String,
    },
    Observability {
        message: String,
    },
    RouteNotFound {
        path: String,
        method: String,
    },
    /// The category directory could not be read or its header row could not be parsed.
    StoreUnavailable {
        message: String,
    },
    VersionStore {
        message: String,
    },
}

impl ErrorDetails {
    /// Defines the error level for logging this error
    fn level(&self) -> tracing::Level {
        match self {
            ErrorDetails::BackendUnreachable { .. } => tracing::Level::WARN,
            ErrorDetails::BackendMalformed { .. } => tracing::Level::WARN,
            ErrorDetails::Config { .. } => tracing::Level::ERROR,
            ErrorDetails::InternalError { .. } => tracing::Level::ERROR,
            ErrorDetails::Observability { .. } => tracing::Level::ERROR,
            ErrorDetails::RouteNotFound { .. } => tracing::Level::WARN,
            ErrorDetails::StoreUnavailable { .. } => tracing::Level::ERROR,
            ErrorDetails::VersionStore { .. } => tracing::Level::ERROR,
        }
    }

    /// Defines the HTTP status code for responses involving this error
    fn status_code(&self) -> StatusCode {
        match self {
            ErrorDetails::BackendUnreachable { .. } => StatusCode::BAD_GATEWAY,
            ErrorDetails::BackendMalformed { .. } => StatusCode::BAD_GATEWAY,
            ErrorDetails::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::Observability { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ErrorDetails::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ErrorDetails::VersionStore { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn log_at_level(&self, prefix: &str, level: tracing::Level) {
        match level {
            tracing::Level::ERROR => tracing::error!("{prefix}{self}"),
            tracing::Level::WARN => tracing::warn!("{prefix}{self}"),
            tracing::Level::INFO => tracing::info!("{prefix}{self}"),
            tracing::Level::DEBUG => tracing::debug!("{prefix}{self}"),
            tracing::Level::TRACE => tracing::trace!("{prefix}{self}"),
        }
    }

    /// Log the error using the `tracing` library
    pub fn log(&self) {
        self.log_at_level("", self.level());
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetails::BackendUnreachable {
                category_id,
                endpoint,
                message,
            } => {
                if is_debug() {
                    write!(
                        f,
                        "Backend for category `{category_id}` at `{endpoint}` is unreachable: {message}"
                    )
                } else {
                    write!(
                        f,
                        "Backend for category `{category_id}` is unreachable: {message}"
                    )
                }
            }
            ErrorDetails::BackendMalformed {
                category_id,
                endpoint,
                message,
            } => {
                if is_debug() {
                    write!(
                        f,
                        "Backend for category `{category_id}` at `{endpoint}` returned a malformed response: {message}"
                    )
                } else {
                    write!(
                        f,
                        "Backend for category `{category_id}` returned a malformed response: {message}"
                    )
                }
            }
            ErrorDetails::Config { message } => write!(f, "{message}"),
            ErrorDetails::InternalError { message } => {
                write!(f, "Internal error: {message}. {IMPOSSIBLE_ERROR_MESSAGE}")
            }
            ErrorDetails::Observability { message } => write!(f, "{message}"),
            ErrorDetails::RouteNotFound { path, method } => {
                write!(f, "Route not found: {method} {path}")
            }
            ErrorDetails::StoreUnavailable { message } => {
                write!(f, "Category directory is unavailable: {message}")
            }
            ErrorDetails::VersionStore { message } => {
                write!(f, "Failed to access the cache version store: {message}")
            }
        }
    }
}

impl IntoResponse for Error {
    /// Convert the error into the `{success: false, error}` envelope
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorDetails::InternalError {
            message: format!("JSON serialization failed: {err}"),
        })
    }
}
