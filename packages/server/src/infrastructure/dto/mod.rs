//! Data Transfer Objects (DTOs) for the chat relay.
//!
//! DTOs are organized by protocol:
//! - `wire`: messages carried inside transport frames
//! - `http`: dashboard API response DTOs

pub mod conversion;
pub mod http;
pub mod wire;
