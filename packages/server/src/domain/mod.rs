//! Domain layer: pure types and rules of the chat relay.
//!
//! Nothing in here performs network I/O. The only concurrency primitives are the
//! per-session atomics and the outbound channel handle held by [`Session`].

pub mod error;
pub mod event;
pub mod history;
pub mod message;
pub mod repository;
pub mod session;
pub mod status;
pub mod value_object;

pub use error::{DomainError, RegistryError};
pub use event::{EventKind, EventSink, EventSinkError, ServerEvent};
pub use history::HistoryBuffer;
pub use message::{ChatMessage, ControlKind, Message, SystemMessage};
pub use repository::SessionRegistry;
pub use session::{CloseReason, DeliveryError, OutboundSender, Session, SessionState};
pub use status::{SessionSummary, StatusSnapshot};
pub use value_object::{DisplayName, MessageBody, SessionId, Timestamp};
