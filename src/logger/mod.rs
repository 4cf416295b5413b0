//! Logger module
//!
//! Logging goes through `tracing`. This module installs the subscriber and
//! wraps the events the server emits:
//! - Server lifecycle logging
//! - Access logging (target `access`) in several formats
//! - Failure, panic and offload fault logging

mod format;

pub use format::AccessLogEntry;

use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::failure::Failure;

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`. Should be called once at
/// application startup.
pub fn init(config: &Config) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!(
        address = %addr,
        level = %config.logging.level,
        workers = ?config.server.workers,
        blocking_threads = ?config.server.blocking_threads,
        max_connections = ?config.performance.max_connections,
        "Server started, listening on http://{addr}"
    );
}

pub fn log_runtime(workers: Option<usize>, blocking_threads: Option<usize>) {
    match workers {
        Some(n) => {
            tracing::info!(workers = n, ?blocking_threads, "Using configured worker threads");
        }
        None => tracing::info!(?blocking_threads, "Using default worker threads (CPU cores)"),
    }
}

pub fn log_store_ready(seed_file: Option<&str>, authors: usize) {
    tracing::info!(seed_file = seed_file.unwrap_or("-"), authors, "Entity store opened");
}

pub fn log_route_registered(method: &str, pattern: &str) {
    tracing::debug!(%method, %pattern, "Route registered");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!(peer = %peer_addr, "Connection accepted");
}

pub fn log_connection_rejected(active: usize, max: u64) {
    tracing::warn!(active, max, "Max connections reached, connection rejected");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!(error = ?err, "Failed to serve connection");
}

pub fn log_connection_timeout(secs: u64) {
    tracing::warn!(timeout_secs = secs, "Connection timed out");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

/// A request ended in a failure response
pub fn log_failure(path: &str, failure: &Failure) {
    let status = failure.status_code().as_u16();
    if failure.status_code().is_server_error() {
        tracing::error!(
            %path,
            status,
            reason = failure.message(),
            cause = ?failure.cause(),
            "Request failed"
        );
    } else {
        tracing::debug!(%path, status, reason = failure.message(), "Request failed");
    }
}

pub fn log_handler_panic(path: &str, message: &str) {
    tracing::error!(%path, panic = message, "Handler panicked");
}

pub fn log_bridge_fault(operation: u64, message: &str) {
    tracing::error!(operation, panic = message, "Offloaded operation panicked");
}

/// The caller stopped waiting; the operation itself still ran to completion
pub fn log_abandoned_operation(operation: u64) {
    tracing::debug!(operation, "Offloaded operation finished after its caller went away");
}

pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}

/// Offloaded operations still running will finish before the process exits
pub fn log_shutdown(reason: &str, in_flight: usize) {
    tracing::info!(reason, in_flight, "Shutting down, no longer accepting connections");
}
