//! UseCase errors.

use std::time::Duration;

use thiserror::Error;

use crate::{
    domain::{DeliveryError, RegistryError},
    infrastructure::codec::FramingError,
};

/// Errors that end a single session. Never propagated past that session's worker.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no valid join within {0:?}")]
    JoinTimeout(Duration),

    #[error("invalid join: {0}")]
    InvalidJoin(String),

    #[error("connection closed before join")]
    JoinAborted,

    #[error(transparent)]
    DuplicateRegistration(#[from] RegistryError),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("control messages are never broadcast")]
    NotBroadcastable,

    #[error(transparent)]
    Framing(#[from] FramingError),
}
