//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// state machine rejections, stale versions). Infrastructure concerns belong elsewhere.
///
/// Every variant maps to a stable [`ErrorKind`] so API consumers can react
/// programmatically (refetch-and-retry on a version conflict, surface messages
/// on a validation error, ...).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A command payload failed validation (malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The aggregate or one of its sub-entities does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A creation precondition was violated (identity already taken).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The aggregate's state machine rejects the operation in its current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Optimistic concurrency failure: the presented version is stale.
    #[error("version conflict (expected: {expected}, actual: {actual})")]
    VersionConflict { expected: u64, actual: u64 },

    /// The aggregate has been logically deleted.
    #[error("gone: {0}")]
    Gone(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn version_conflict(expected: u64, actual: u64) -> Self {
        Self::VersionConflict { expected, actual }
    }

    pub fn gone(msg: impl Into<String>) -> Self {
        Self::Gone(msg.into())
    }

    /// Stable, documented kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) | DomainError::InvalidId(_) => ErrorKind::Validation,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            DomainError::InvalidTransition(_) => ErrorKind::InvalidTransition,
            DomainError::VersionConflict { .. } => ErrorKind::VersionConflict,
            DomainError::Gone(_) => ErrorKind::Gone,
        }
    }
}

/// Stable error classification surfaced through the API boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    InvalidTransition,
    VersionConflict,
    Gone,
    /// Storage/transport failure; carries no business decision.
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::VersionConflict => "version_conflict",
            ErrorKind::Gone => "gone",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }

    /// Whether an API layer should answer with "precondition failed" (stale If-Match).
    pub fn is_precondition_failed(self) -> bool {
        matches!(self, ErrorKind::VersionConflict)
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_strings() {
        assert_eq!(DomainError::validation("x").kind().as_str(), "validation_error");
        assert_eq!(DomainError::invalid_id("x").kind(), ErrorKind::Validation);
        assert_eq!(DomainError::not_found("x").kind().as_str(), "not_found");
        assert_eq!(DomainError::already_exists("x").kind().as_str(), "already_exists");
        assert_eq!(
            DomainError::invalid_transition("x").kind().as_str(),
            "invalid_transition"
        );
        assert_eq!(DomainError::version_conflict(1, 2).kind().as_str(), "version_conflict");
        assert_eq!(DomainError::gone("x").kind().as_str(), "gone");
    }

    #[test]
    fn only_version_conflict_is_precondition_failed() {
        assert!(ErrorKind::VersionConflict.is_precondition_failed());
        assert!(!ErrorKind::Validation.is_precondition_failed());
        assert!(!ErrorKind::Gone.is_precondition_failed());
        assert!(!ErrorKind::Infrastructure.is_precondition_failed());
    }

    #[test]
    fn version_conflict_message_names_both_versions() {
        let msg = DomainError::version_conflict(3, 5).to_string();
        assert!(msg.contains("expected: 3"));
        assert!(msg.contains("actual: 5"));
    }
}
