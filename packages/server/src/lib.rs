//! Whisper chat relay server library.
//!
//! Clients connect over a length-prefixed TCP stream, register a display name and
//! exchange broadcast text messages. The library provides the session registry,
//! broadcast engine, history replay and heartbeat eviction, plus a read-only HTTP
//! dashboard over the live state.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
