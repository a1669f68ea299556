//! TCP accept loop for the chat transport.

use std::{io, sync::Arc, time::Duration};

use tokio::net::TcpListener;
use tokio_util::task::TaskTracker;

use crate::usecase::SessionManager;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// `ENFILE` / `EMFILE` (system / process file table full). Same values on Linux and the BSDs.
#[cfg(unix)]
const FILE_TABLE_FULL: [i32; 2] = [23, 24];

/// Accept connections until the listener fails, handing each one to its own worker.
///
/// Per-connection errors never stop the loop; the returned error is always fatal.
pub(super) async fn accept_loop(
    listener: TcpListener,
    session_manager: Arc<SessionManager>,
    tracker: TaskTracker,
) -> io::Error {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(peer = %peer_addr, "Failed to set TCP_NODELAY: {}", e);
                }
                tracing::debug!(peer = %peer_addr, "Connection accepted");

                let session_manager = session_manager.clone();
                tracker.spawn(async move {
                    session_manager
                        .handle_connection(stream, Some(peer_addr.to_string()))
                        .await;
                });
            }
            Err(e) if is_transient(&e) => {
                tracing::warn!("Accept failed, retrying: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
            Err(e) => return e,
        }
    }
}

/// Errors tied to a single pending connection or to temporary resource exhaustion.
fn is_transient(e: &io::Error) -> bool {
    is_file_table_full(e)
        || matches!(
            e.kind(),
            io::ErrorKind::ConnectionAborted
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionRefused
                | io::ErrorKind::Interrupted
                | io::ErrorKind::TimedOut
                | io::ErrorKind::WouldBlock
        )
}

#[cfg(unix)]
fn is_file_table_full(e: &io::Error) -> bool {
    e.raw_os_error()
        .is_some_and(|code| FILE_TABLE_FULL.contains(&code))
}

#[cfg(not(unix))]
fn is_file_table_full(_e: &io::Error) -> bool {
    false
}
