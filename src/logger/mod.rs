//! Logger module
//!
//! Named log events for the server, backed by `tracing`:
//! - Server lifecycle logging
//! - Per-request outcome logging for the format pipeline
//! - Access logging with multiple formats

mod format;
mod writer;

pub use format::AccessLogEntry;

use crate::config::{Config, LoggingConfig};
use std::fmt::Display;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{debug, error, info, warn, Level};

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("invalid log level: {0}")]
    InvalidLevel(String),
    #[error("failed to open log file: {0}")]
    OpenFile(#[from] std::io::Error),
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Initialize the global subscriber with configuration
///
/// Should be called once at application startup.
pub fn init(config: &LoggingConfig) -> Result<(), LoggerError> {
    let level: Level = config
        .level
        .parse()
        .map_err(|_| LoggerError::InvalidLevel(config.level.clone()))?;
    let writer = writer::make_writer(config.log_file.as_deref())?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(config.log_file.is_none())
        .try_init()
        .map_err(|e| LoggerError::Install(e.to_string()))
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    info!("JSON formatter server started");
    info!("Listening on: http://{addr}/formatjson");
    info!("Log level: {}", config.logging.level);
    match config.server.workers {
        Some(workers) => info!("Worker threads: {workers}"),
        None => info!("Worker threads: CPU cores"),
    }
    if let Some(ref path) = config.logging.log_file {
        info!("Log file: {path}");
    }
    if let Some(max) = config.performance.max_connections {
        info!("Max connections: {max}");
    }
}

pub fn log_bind_failed(addr: &SocketAddr, err: &std::io::Error) {
    error!("Server failed to start: cannot bind {addr}: {err}");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    debug!(peer = %peer_addr, "Connection accepted");
}

pub fn log_connection_rejected(peer_addr: &SocketAddr, active: usize, max: u64) {
    warn!(peer = %peer_addr, "Max connections reached: {active}/{max}. Connection rejected.");
}

/// Connection-level failure, including failures writing a response
pub fn log_connection_error(peer_addr: &SocketAddr, err: &impl Display) {
    error!(peer = %peer_addr, "Failed to serve connection: {err}");
}

pub fn log_connection_timeout(peer_addr: &SocketAddr, secs: u64) {
    warn!(peer = %peer_addr, "Connection timeout after {secs} seconds");
}

pub fn log_connection_idle(peer_addr: &SocketAddr, secs: u64) {
    debug!(peer = %peer_addr, "Closing connection idle for {secs} seconds");
}

pub fn log_accept_error(err: &std::io::Error) {
    error!("Failed to accept connection: {err}");
}

pub fn log_shutdown_requested(signal: &str) {
    info!("{signal} received, shutting down");
}

pub fn log_shutdown_complete(remaining: usize) {
    if remaining == 0 {
        info!("All connections closed, server stopped");
    } else {
        warn!("Shutdown timeout reached with {remaining} connection(s) still open");
    }
}

pub fn log_error(message: &str) {
    error!("{message}");
}

pub fn log_method_rejected(peer_addr: &SocketAddr, method: &impl Display) {
    info!(peer = %peer_addr, "Rejected {method} request");
}

pub fn log_body_read_failed(peer_addr: &SocketAddr, err: &impl Display) {
    error!(peer = %peer_addr, "Error reading body: {err}");
}

pub fn log_empty_body(peer_addr: &SocketAddr) {
    info!(peer = %peer_addr, "Received empty body");
}

pub fn log_invalid_json(peer_addr: &SocketAddr, err: &impl Display) {
    warn!(peer = %peer_addr, "Invalid JSON received: {err}");
}

pub fn log_format_failed(peer_addr: &SocketAddr, err: &impl Display) {
    error!(peer = %peer_addr, "Error serializing parsed JSON (should not happen): {err}");
}

pub fn log_format_success(peer_addr: &SocketAddr, bytes: usize) {
    info!(peer = %peer_addr, "Formatted JSON ({bytes} bytes)");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    info!(target: "access", "{}", entry.format(format));
}
