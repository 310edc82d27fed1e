//! Observability and Metrics
//!
//! Atomic counters for connection, packet, handler and game activity. One
//! [`Metrics`] lives in the server state and is shared by every connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently open connections
    pub connections_active: AtomicU64,
    /// Connections refused at the connection limit
    pub connections_rejected: AtomicU64,
    pub packets_received: AtomicU64,
    pub packets_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    /// Requests answered with the default empty response
    pub unknown_commands: AtomicU64,
    /// Handlers that returned an internal error or panicked
    pub handler_failures: AtomicU64,
    /// Requests refused for lack of authentication
    pub auth_rejections: AtomicU64,
    /// Requests answered with a domain error code
    pub domain_errors: AtomicU64,
    pub games_created: AtomicU64,
    pub games_released: AtomicU64,
    pub matchmaking_queued: AtomicU64,
    pub matchmaking_matched: AtomicU64,
    /// Framing failures that closed a connection
    pub protocol_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            unknown_commands: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            auth_rejections: AtomicU64::new(0),
            domain_errors: AtomicU64::new(0),
            games_created: AtomicU64::new(0),
            games_released: AtomicU64::new(0),
            matchmaking_queued: AtomicU64::new(0),
            matchmaking_matched: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> u64 {
        self.connections_active.load(Ordering::Relaxed)
    }

    pub fn packet_received(&self, byte_count: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn packet_sent(&self, byte_count: u64) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn unknown_command(&self) {
        self.unknown_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auth_rejected(&self) {
        self.auth_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn domain_error(&self) {
        self.domain_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn game_created(&self) {
        self.games_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn game_released(&self) {
        self.games_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn matchmaking_queued(&self) {
        self.matchmaking_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn matchmaking_matched(&self, count: u64) {
        self.matchmaking_matched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            unknown_commands: self.unknown_commands.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            auth_rejections: self.auth_rejections.load(Ordering::Relaxed),
            domain_errors: self.domain_errors.load(Ordering::Relaxed),
            games_created: self.games_created.load(Ordering::Relaxed),
            games_released: self.games_released.load(Ordering::Relaxed),
            matchmaking_queued: self.matchmaking_queued.load(Ordering::Relaxed),
            matchmaking_matched: self.matchmaking_matched.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current counters at info level.
    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            connections_total = s.connections_total,
            connections_active = s.connections_active,
            connections_rejected = s.connections_rejected,
            packets_received = s.packets_received,
            packets_sent = s.packets_sent,
            bytes_received = s.bytes_received,
            bytes_sent = s.bytes_sent,
            unknown_commands = s.unknown_commands,
            handler_failures = s.handler_failures,
            auth_rejections = s.auth_rejections,
            domain_errors = s.domain_errors,
            games_created = s.games_created,
            games_released = s.games_released,
            matchmaking_queued = s.matchmaking_queued,
            matchmaking_matched = s.matchmaking_matched,
            protocol_errors = s.protocol_errors,
            uptime_seconds = s.uptime_seconds,
            "Server metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub connections_rejected: u64,
    pub packets_received: u64,
    pub packets_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub unknown_commands: u64,
    pub handler_failures: u64,
    pub auth_rejections: u64,
    pub domain_errors: u64,
    pub games_created: u64,
    pub games_released: u64,
    pub matchmaking_queued: u64,
    pub matchmaking_matched: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

/// Logs how long a scope took when dropped.
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!(
            operation = self.operation,
            duration_us = self.start.elapsed().as_micros() as u64,
            "Operation completed"
        );
    }
}
