//! UseCase layer: the session lifecycle, fan-out and liveness logic of the relay.
//!
//! ## Lock discipline
//!
//! The registry and the history buffer each sit behind a single mutex. When both are
//! needed (admitting a session, broadcasting) the history lock is taken first and the
//! registry lock inside it; neither is ever held across a transport write. Deliveries
//! only enqueue into the recipient's bounded outbound queue, and each session's writer
//! task performs the actual I/O.

mod broadcast;
mod error;
mod event_hub;
mod heartbeat;
mod session_manager;
mod status;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use error::{BroadcastError, SessionError};
pub use event_hub::EventHub;
pub use heartbeat::{HeartbeatMonitor, SweepReport};
pub use session_manager::{SessionManager, SessionSettings};
pub use status::GetStatusUseCase;
