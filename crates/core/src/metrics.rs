//! Metrics for both ends of the protocol.
//!
//! - [`DispatchMetrics`]: what one requester run did (round trips, retries,
//!   bytes on the wire, timing) and how good the resulting code is
//!   (entropy vs expected code length).
//! - [`ServiceMetrics`]: connection counts for a coding service's lifetime.
//!
//! # Thread Safety
//!
//! Neither struct is shared between tasks. Per-unit counters are returned by
//! each task and merged by whoever joins it; service counters are owned by
//! the accept loop alone.

use std::time::{Duration, Instant};

/// Metrics for one requester run.
#[derive(Debug, Clone)]
pub struct DispatchMetrics {
    // === Timing ===
    /// When dispatch started
    pub start_time: Instant,

    /// When the join barrier was passed
    pub end_time: Option<Instant>,

    // === Work ===
    /// Units spawned, one per ranked symbol
    pub symbols_dispatched: u64,

    /// Units that finished a full request/response round trip
    pub round_trips: u64,

    /// Extra attempts made after retryable failures
    pub retries: u64,

    // === Wire ===
    /// Request bytes written
    pub bytes_sent: u64,

    /// Response bytes read (length prefix included)
    pub bytes_received: u64,

    // === Code quality ===
    /// Source entropy in bits per symbol
    pub entropy: f64,

    /// Expected code length sum(p * L) in bits per symbol
    pub expected_length: f64,
}

impl DispatchMetrics {
    /// Create new metrics with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            symbols_dispatched: 0,
            round_trips: 0,
            retries: 0,
            bytes_sent: 0,
            bytes_received: 0,
            entropy: 0.0,
            expected_length: 0.0,
        }
    }

    /// Mark dispatch as complete.
    pub fn complete(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Get total duration (or current elapsed if not complete).
    pub fn duration(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// Expected length minus entropy.
    ///
    /// Shannon-Fano-Elias codes land in [1, 2) bits of redundancy.
    pub fn redundancy(&self) -> f64 {
        self.expected_length - self.entropy
    }

    /// Print a human-readable summary to stderr.
    ///
    /// Stdout is reserved for the code report.
    pub fn print_summary(&self) {
        eprintln!("\n=== Dispatch Summary ===");
        eprintln!("Duration: {} ms", self.duration().as_millis());
        eprintln!("Symbols dispatched: {}", self.symbols_dispatched);
        eprintln!("Round trips completed: {}", self.round_trips);
        eprintln!("Retries: {}", self.retries);
        eprintln!("Bytes sent: {}", self.bytes_sent);
        eprintln!("Bytes received: {}", self.bytes_received);
        eprintln!();
        eprintln!("=== Code ===");
        eprintln!("Entropy: {:.4} bits/symbol", self.entropy);
        eprintln!("Expected length: {:.4} bits/symbol", self.expected_length);
        eprintln!("Redundancy: {:.4} bits/symbol", self.redundancy());
        eprintln!();
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection counters for a coding service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceMetrics {
    /// Connections accepted
    pub accepted: u64,

    /// Connections that sent a response and closed cleanly
    pub served: u64,

    /// Connections closed on an I/O, protocol or timeout error
    pub failed: u64,

    /// Connection tasks retired by the accept loop
    pub reaped: u64,

    /// Failed accept() calls
    pub accept_errors: u64,
}

impl ServiceMetrics {
    /// Connections accepted but not yet retired.
    pub fn in_flight(&self) -> u64 {
        self.accepted - self.reaped
    }

    /// One-line form for logging.
    pub fn summary(&self) -> String {
        format!(
            "accepted={} served={} failed={} reaped={} accept_errors={}",
            self.accepted, self.served, self.failed, self.reaped, self.accept_errors
        )
    }
}
