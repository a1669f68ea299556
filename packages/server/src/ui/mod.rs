//! Chat relay server: TCP accept loop, dashboard HTTP surface and the server runner.

mod handler;
mod listener;
mod server;
mod signal;
pub mod state;

pub use handler::dashboard_router;
pub use server::{BoundServer, Server, ServerError};
pub use signal::shutdown_signal;
