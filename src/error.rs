//! Error types for metadoc.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=staging, 3=resolution, 4=conflict, 5=remote)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

/// Result type alias for metadoc operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Staging (exit 2)
    DatabaseError,

    // Resolution (exit 3)
    ResolutionError,

    // Conflict (exit 4)
    ConflictError,

    // Remote (exit 5)
    RemoteError,
    TransportError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ResolutionError => "RESOLUTION_ERROR",
            Self::ConflictError => "CONFLICT_ERROR",
            Self::RemoteError => "REMOTE_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError => 2,
            Self::ResolutionError => 3,
            Self::ConflictError => 4,
            Self::RemoteError | Self::TransportError => 5,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether rerunning the same command may succeed without changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError | Self::RemoteError | Self::TransportError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur while modeling, staging, diffing or syncing.
#[derive(Error, Debug)]
pub enum Error {
    /// A name or staged row does not map to a live document entity.
    #[error("{kind} not found: {identifier} ({reason})")]
    Resolution {
        kind: &'static str,
        identifier: String,
        reason: String,
    },

    /// Two entities with the same identity disagree on an immutable field.
    #[error("{kind} conflict on {identifier}: {reason}")]
    Conflict {
        kind: &'static str,
        identifier: String,
        reason: String,
    },

    /// Non-2xx response from the catalog service.
    #[error("{context} failed (HTTP {status}): {message}")]
    Remote {
        context: String,
        status: u16,
        message: String,
    },

    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a resolution failure.
    pub fn resolution(
        kind: &'static str,
        identifier: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Resolution {
            kind,
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a merge conflict.
    pub fn conflict(
        kind: &'static str,
        identifier: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind,
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Resolution { .. } => ErrorCode::ResolutionError,
            Self::Conflict { .. } => ErrorCode::ConflictError,
            Self::Remote { .. } => ErrorCode::RemoteError,
            Self::Http(_) => ErrorCode::TransportError,
            Self::Configuration(_) => ErrorCode::ConfigError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// HTTP status carried by a remote failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Configuration(_) => Some(
                "Pass --url/--source or set METADOC_CATALOG_URL and METADOC_SOURCE".to_string(),
            ),

            Self::Remote { status: 401 | 403, .. } => Some(
                "The catalog rejected the credentials. Check --api-key or the user:password in the catalog URL."
                    .to_string(),
            ),

            Self::Remote { status: 404, context, .. } if context.contains("source") => Some(
                "The catalog does not know this source. Check --source against the catalog's source list."
                    .to_string(),
            ),

            Self::Database(_) => Some(
                "The staging file may hold rows from an interrupted run. Clear it with `metadoc reset`."
                    .to_string(),
            ),

            Self::Conflict { .. } => Some(
                "Two snapshots disagree on an immutable field. Fix the source document before syncing."
                    .to_string(),
            ),

            Self::Resolution { .. }
            | Self::Remote { .. }
            | Self::Http(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::resolution("set", "sales.orders", "missing").exit_code(), 3);
        assert_eq!(Error::conflict("relationship", "fk_a", "type").exit_code(), 4);
        assert_eq!(Error::Configuration("no url".into()).exit_code(), 7);
        let remote = Error::Remote {
            context: "GET /token".into(),
            status: 401,
            message: "denied".into(),
        };
        assert_eq!(remote.exit_code(), 5);
        assert_eq!(remote.status(), Some(401));
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::Remote {
            context: "GET /catalog/source/abc".into(),
            status: 401,
            message: "unauthorized".into(),
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "REMOTE_ERROR");
        assert_eq!(json["error"]["retryable"], true);
        assert!(json["error"]["hint"].as_str().unwrap().contains("api-key"));
    }

    #[test]
    fn test_resolution_has_no_hint() {
        let err = Error::resolution("schema", "sales", "not in document");
        assert!(err.hint().is_none());
        assert_eq!(err.to_string(), "schema not found: sales (not in document)");
    }
}
