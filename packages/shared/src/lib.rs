//! Utilities shared by the Whisper binaries.

pub mod logger;
pub mod time;
