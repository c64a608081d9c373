//! Logger module
//!
//! Provides logging utilities for the UI server including:
//! - Server lifecycle logging
//! - Access logging in combined, common or json layout
//! - Index stamping and proxy diagnostics
//! - File-based logging support

mod format;
pub mod writer;

pub use format::{AccessLogEntry, AccessLogFormat, ServedBy, UnknownFormat};

use crate::config::Config;
use std::fmt::Display;
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Write to info/access log
fn write_info(message: &str) {
    match writer::get() {
        Some(writer) => writer.write_info(message),
        None => println!("{message}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(writer) => writer.write_error(message),
        None => eprintln!("{message}"),
    }
}

/// Write to access log specifically
fn write_access(message: &str) {
    match writer::get() {
        Some(writer) => writer.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info(&format!(
        "spa-host {} ({})",
        env!("SPA_GIT_VERSION"),
        env!("SPA_GIT_COMMIT")
    ));
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(max) = config.performance.max_connections {
        write_info(&format!("Max connections: {max}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

/// Log where UI requests are sent
pub fn log_mode(description: &str) {
    write_info(&format!("[UI] Serving {description}"));
}

pub fn log_index_stamped(len: usize) {
    write_info(&format!("[UI] Index stamped with build info ({len} bytes)"));
}

pub fn log_index_missing(asset: &str) {
    write_error(&format!(
        "[WARN] Bundled asset '{asset}' is missing; routes without an asset will return 404"
    ));
}

pub fn log_proxy_error(target: &str, err: &impl Display) {
    write_error(&format!("[PROXY ERROR] {target}: {err}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_connection_rejected(peer_addr: &SocketAddr, limit: u64) {
    write_error(&format!(
        "[WARN] Rejected {peer_addr}: connection limit {limit} reached"
    ));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: AccessLogFormat) {
    write_access(&entry.format(format));
}

pub fn log_shutdown(signal: &str) {
    write_info(&format!("\n[Shutdown] Received {signal}, stopping"));
}
