//! Per-connection session entity.
//!
//! ## State machine
//!
//! ```text
//! Joining -> Active -> Closing -> Closed
//!    |                              ^
//!    +------------------------------+   (failed join: no registration, no broadcast)
//! ```
//!
//! Transitions only move forward. `begin_closing` succeeds exactly once per session,
//! which is what makes teardown (deregistration + departure notice) idempotent no matter
//! how many paths (disconnect, I/O error, failed delivery, eviction, shutdown) detect
//! the end of the connection.

use std::{
    fmt,
    sync::{
        OnceLock,
        atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use thiserror::Error;
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::{DisplayName, SessionId, Timestamp};

/// Sending half of a session's outbound queue. Holds encoded frame payloads; the
/// session's single writer task drains it onto the transport.
pub type OutboundSender = mpsc::Sender<Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Joining = 0,
    Active = 1,
    Closing = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Joining,
            1 => SessionState::Active,
            2 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Why a session left the Active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent `Disconnect`.
    ClientDisconnect,
    /// The peer closed the stream.
    EndOfStream,
    /// Oversized or malformed frame.
    FramingError,
    /// Read or write failure on the transport.
    TransportError,
    /// The outbound queue was full or closed during a broadcast or probe.
    DeliveryFailed,
    /// Evicted by the heartbeat monitor.
    HeartbeatTimeout,
    ServerShutdown,
    DuplicateRegistration,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientDisconnect => "client disconnect",
            CloseReason::EndOfStream => "connection closed",
            CloseReason::FramingError => "framing error",
            CloseReason::TransportError => "connection error",
            CloseReason::DeliveryFailed => "delivery failed",
            CloseReason::HeartbeatTimeout => "timeout",
            CloseReason::ServerShutdown => "server shutdown",
            CloseReason::DuplicateRegistration => "duplicate registration",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    QueueFull,

    #[error("outbound queue is closed")]
    Closed,
}

/// Server-side state for one connected client.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    display_name: DisplayName,
    connected_at: Timestamp,
    peer: Option<String>,
    /// Monotonic reference point for `last_active_ms`.
    started: Instant,
    /// Milliseconds after `started` at which the last inbound message was processed.
    last_active_ms: AtomicU64,
    /// Set when the heartbeat monitor has sent a probe; cleared by any inbound traffic.
    probe_pending: AtomicBool,
    state: AtomicU8,
    close_reason: OnceLock<CloseReason>,
    outbound: OutboundSender,
    closer: CancellationToken,
}

impl Session {
    pub fn new(
        id: SessionId,
        display_name: DisplayName,
        connected_at: Timestamp,
        peer: Option<String>,
        outbound: OutboundSender,
    ) -> Self {
        Self {
            id,
            display_name,
            connected_at,
            peer,
            started: Instant::now(),
            last_active_ms: AtomicU64::new(0),
            probe_pending: AtomicBool::new(false),
            state: AtomicU8::new(SessionState::Joining as u8),
            close_reason: OnceLock::new(),
            outbound,
            closer: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn display_name(&self) -> &DisplayName {
        &self.display_name
    }

    pub fn connected_at(&self) -> Timestamp {
        self.connected_at
    }

    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Joining -> Active. Returns `false` if the session was not Joining.
    pub fn activate(&self) -> bool {
        self.transition(SessionState::Joining, SessionState::Active)
    }

    /// Active -> Closing. Returns `true` for exactly one caller.
    pub fn begin_closing(&self) -> bool {
        self.transition(SessionState::Active, SessionState::Closing)
    }

    /// Terminal state; the transport is released by the owner afterwards.
    pub fn mark_closed(&self) {
        self.state
            .store(SessionState::Closed as u8, Ordering::Release);
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record inbound activity.
    pub fn touch(&self) {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_active_ms.fetch_max(elapsed, Ordering::AcqRel);
        self.probe_pending.store(false, Ordering::Release);
    }

    /// Time since the last inbound activity (or since the session was created).
    pub fn idle_for(&self, now: Instant) -> Duration {
        let last = self.started + Duration::from_millis(self.last_active_ms.load(Ordering::Acquire));
        now.saturating_duration_since(last)
    }

    /// Wall-clock time of the last inbound activity.
    pub fn last_active_at(&self) -> Timestamp {
        let offset = i64::try_from(self.last_active_ms.load(Ordering::Acquire)).unwrap_or(i64::MAX);
        Timestamp::new(self.connected_at.value().saturating_add(offset))
    }

    /// Marks a liveness probe as outstanding. Returns the previous flag.
    pub fn mark_probe_sent(&self) -> bool {
        self.probe_pending.swap(true, Ordering::AcqRel)
    }

    pub fn probe_pending(&self) -> bool {
        self.probe_pending.load(Ordering::Acquire)
    }

    /// Queue an encoded frame for the session's writer without waiting.
    pub fn deliver(&self, payload: Bytes) -> Result<(), DeliveryError> {
        self.outbound.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Ask the session's worker to tear the connection down. The first reason wins.
    pub fn request_close(&self, reason: CloseReason) {
        let _ = self.close_reason.set(reason);
        self.closer.cancel();
    }

    pub fn is_close_requested(&self) -> bool {
        self.closer.is_cancelled()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Resolves once [`Session::request_close`] has been called.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closer.cancelled()
    }
}
