//! Domain errors.

use thiserror::Error;

use super::SessionId;

/// Validation errors raised while constructing value objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("display name must not be empty")]
    EmptyDisplayName,

    #[error("display name exceeds {max} characters (got {actual})")]
    DisplayNameTooLong { max: usize, actual: usize },

    #[error("display name must not contain control characters")]
    InvalidDisplayName,

    #[error("message body must not be empty")]
    EmptyMessageBody,

    #[error("message body exceeds {max} characters (got {actual})")]
    MessageBodyTooLong { max: usize, actual: usize },
}

/// Registry invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Session ids are generated by the server, so this indicates a bug.
    #[error("session '{0}' is already registered")]
    DuplicateRegistration(SessionId),
}
