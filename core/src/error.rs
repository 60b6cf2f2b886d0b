//! Error types for the PPMS client.
//!
//! # Design
//! PUMAPI reports almost everything with HTTP 200, so the variants describe
//! *what* went wrong from the client's point of view rather than mirroring
//! status codes. A cache miss is not an error at all: `ResponseCache::read`
//! returns `None` and the gateway goes on-line.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the gateway, the codec and the entity factories.
#[derive(Debug, Error)]
pub enum PpmsError {
    /// Neither a credential nor a cache root was configured, or the
    /// configuration itself could not be loaded.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Authentication failed, a request was rejected as unauthorized, or the
    /// transport could not complete the round-trip.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// A response could not be decoded (strict mode, or unrecoverable input).
    #[error("unable to parse data returned by PUMAPI: {text:?} - {reason}")]
    Format { text: String, reason: String },

    /// A table response had fewer than two lines in strict mode.
    #[error("no data in response: {0:?}")]
    NoData(String),

    /// A lookup returned an empty body for the given identifier.
    #[error("{kind} [{name}] is unknown to PPMS")]
    UnknownEntity { kind: &'static str, name: String },

    /// A decoded record lacks a field, or a field has the wrong shape.
    #[error("invalid {entity} record: {reason}")]
    InvalidRecord { entity: &'static str, reason: String },

    /// A mutating action was answered with something other than success.
    #[error("action `{action}` failed: {body}")]
    Request { action: String, body: String },

    /// An explicit cache maintenance operation failed.
    #[error("cache I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = PpmsError> = std::result::Result<T, E>;

impl PpmsError {
    pub(crate) fn format(text: &str, reason: impl Into<String>) -> Self {
        PpmsError::Format {
            text: text.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        PpmsError::InvalidRecord {
            entity,
            reason: reason.into(),
        }
    }

    /// Whether this error means the session can no longer be trusted.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, PpmsError::Connectivity(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_carries_text_and_reason() {
        let err = PpmsError::format("a,b\n1", "mismatch");
        let msg = err.to_string();
        assert!(msg.contains("a,b\\n1"));
        assert!(msg.contains("mismatch"));
    }

    #[test]
    fn unknown_entity_names_kind_and_id() {
        let err = PpmsError::UnknownEntity {
            kind: "user",
            name: "ghost".to_string(),
        };
        assert_eq!(err.to_string(), "user [ghost] is unknown to PPMS");
    }

    #[test]
    fn only_connectivity_is_connectivity() {
        assert!(PpmsError::Connectivity("x".into()).is_connectivity());
        assert!(!PpmsError::NoData(String::new()).is_connectivity());
    }
}
