//! Server configuration.
//!
//! Every field has a default so the server runs without any flags; the binary
//! overrides them from command-line arguments.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::infrastructure::codec::DEFAULT_MAX_FRAME_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "inactivity timeout ({inactivity:?}) must be longer than the heartbeat interval ({interval:?})"
    )]
    InactivityNotAboveInterval {
        inactivity: Duration,
        interval: Duration,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error(
        "outbound queue capacity ({queue}) must exceed history capacity ({history}) so a full replay fits"
    )]
    QueueSmallerThanHistory { queue: usize, history: usize },
}

/// Full server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for both listeners
    pub host: String,
    /// Chat transport port
    pub port: u16,
    /// Dashboard HTTP port
    pub dashboard_port: u16,
    /// Number of Chat / System messages replayed to new sessions
    pub history_capacity: usize,
    /// Largest accepted frame payload, in bytes
    pub max_frame_size: usize,
    /// Time allowed between accept and a valid join
    pub join_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Idle time after which the heartbeat monitor probes, then evicts, a session
    pub inactivity_timeout: Duration,
    /// Frames buffered per session before a delivery counts as failed
    pub outbound_queue_capacity: usize,
    pub write_timeout: Duration,
    /// Time between the shutdown notice and closing every session
    pub shutdown_grace: Duration,
    /// Events kept for the dashboard
    pub recent_events_capacity: usize,
    /// Append-only event log; none disables file logging
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 9999,
            dashboard_port: 8080,
            history_capacity: 50,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            join_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(120),
            outbound_queue_capacity: 256,
            write_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(1),
            recent_events_capacity: 200,
            log_file: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Zero("heartbeat interval"));
        }
        if self.join_timeout.is_zero() {
            return Err(ConfigError::Zero("join timeout"));
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::Zero("write timeout"));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Zero("history capacity"));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Zero("max frame size"));
        }
        if self.inactivity_timeout <= self.heartbeat_interval {
            return Err(ConfigError::InactivityNotAboveInterval {
                inactivity: self.inactivity_timeout,
                interval: self.heartbeat_interval,
            });
        }
        // replay + welcome notice must fit before the writer starts draining
        if self.outbound_queue_capacity <= self.history_capacity {
            return Err(ConfigError::QueueSmallerThanHistory {
                queue: self.outbound_queue_capacity,
                history: self.history_capacity,
            });
        }
        Ok(())
    }
}
