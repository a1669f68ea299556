//! Infrastructure layer: wire codec, DTOs, the in-memory registry and event sinks.

pub mod codec;
pub mod dto;
pub mod event_sink;
pub mod repository;
