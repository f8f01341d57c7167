//! Request dispatcher: one connection and one task per ranked symbol.
//!
//! # Concurrency
//!
//! Every ranked symbol gets its own spawned task that connects, sends one
//! [`EncodeRequest`], reads one code and closes. The probability and
//! cumulative sequences are built once and shared read-only (`Arc<[f64]>`).
//! Each task owns exactly one rank and hands back `(rank, result)`; the
//! joiner writes that code into the rank's slot of a [`CodeTable`], so no
//! two writers ever touch the same slot and no lock is needed.
//!
//! The report is built only after the `JoinSet` is drained (the join
//! barrier). Completion order does not matter since slots are rank-indexed.
//!
//! # Failure
//!
//! Any unit failing fails the whole run: the first error is returned and
//! dropping the `JoinSet` aborts the units still in flight. Retryable
//! errors (I/O, timeouts) are retried up to `retries` extra times per unit.

use crate::alphabet::Ranking;
use crate::cumulative::cumulative_midpoints;
use crate::error::{Error, Result};
use crate::metrics::DispatchMetrics;
use crate::report::{CodeTable, Report};
use crate::wire::{self, EncodeRequest, LENGTH_PREFIX_SIZE, REQUEST_SIZE};
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Default bound on each connect, read and write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Where and how to send per-symbol requests.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Coding service endpoint as `host:port`
    pub endpoint: String,

    /// Bound on every socket operation
    pub io_timeout: Duration,

    /// Extra attempts per unit after a retryable failure
    pub retries: u32,
}

impl DispatchConfig {
    /// Config with the default timeout and no retries.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            io_timeout: DEFAULT_IO_TIMEOUT,
            retries: 0,
        }
    }
}

/// What one unit brought back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub code: String,
    pub retries: u32,
}

/// Fans a ranking out to the coding service and joins the results.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: Arc<DispatchConfig>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Request a code for every ranked symbol and build the report.
    ///
    /// An empty ranking dispatches nothing and yields an empty report.
    ///
    /// # Errors
    /// The first unit failure, wrapped in [`Error::Dispatch`] with its rank
    /// and symbol, or [`Error::Task`] if a unit panicked.
    pub async fn run(&self, ranking: &Ranking) -> Result<(Report, DispatchMetrics)> {
        let mut metrics = DispatchMetrics::new();
        metrics.entropy = ranking.entropy();

        let probabilities: Arc<[f64]> = ranking.probabilities().into();
        let cumulative: Arc<[f64]> = cumulative_midpoints(&probabilities).into();

        let mut units = JoinSet::new();
        for rank in 0..ranking.len() {
            let probabilities = Arc::clone(&probabilities);
            let cumulative = Arc::clone(&cumulative);
            let config = Arc::clone(&self.config);

            units.spawn(async move {
                let request = EncodeRequest::new(probabilities[rank], cumulative[rank]);
                (rank, request_code(&config, request).await)
            });
            metrics.symbols_dispatched += 1;
        }

        debug!(
            units = ranking.len(),
            endpoint = %self.config.endpoint,
            "dispatched encoding requests"
        );

        // Join barrier
        let mut table = CodeTable::with_len(ranking.len());
        while let Some(joined) = units.join_next().await {
            let (rank, outcome) = joined.map_err(|e| Error::Task(e.to_string()))?;
            let outcome = outcome.map_err(|source| Error::Dispatch {
                rank,
                symbol: ranking.get(rank).map_or('\u{FFFD}', |entry| entry.symbol),
                source: Box::new(source),
            })?;

            metrics.round_trips += 1;
            metrics.retries += u64::from(outcome.retries);
            metrics.bytes_sent += REQUEST_SIZE as u64;
            metrics.bytes_received += (LENGTH_PREFIX_SIZE + outcome.code.len()) as u64;
            table.record(rank, outcome.code)?;
        }
        metrics.complete();

        let report = Report::new(ranking, table)?;
        metrics.expected_length = report.expected_length();

        Ok((report, metrics))
    }
}

/// One unit of work, retried on transport failures.
pub async fn request_code(config: &DispatchConfig, request: EncodeRequest) -> Result<UnitOutcome> {
    let mut retries = 0;
    loop {
        match round_trip(&config.endpoint, &request, config.io_timeout).await {
            Ok(code) => return Ok(UnitOutcome { code, retries }),
            Err(e) if e.is_retryable() && retries < config.retries => {
                retries += 1;
                warn!(attempt = retries, error = %e, "round trip failed, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Connect, send one request, read one code, close.
///
/// # Errors
/// - [`Error::Setup`] if the connection cannot be opened in time
/// - [`Error::Io`] / [`Error::Timeout`] on a failed or stalled read/write
/// - [`Error::Protocol`] on a malformed response
pub async fn round_trip(endpoint: &str, request: &EncodeRequest, limit: Duration) -> Result<String> {
    let mut stream = match tokio::time::timeout(limit, TcpStream::connect(endpoint)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(Error::connect(endpoint, e)),
        Err(_) => return Err(Error::connect(endpoint, ErrorKind::TimedOut.into())),
    };

    wire::write_request(&mut stream, request, limit).await?;
    let code = wire::read_response(&mut stream, limit).await?;

    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "shutdown after response failed");
    }

    debug!(
        probability = request.probability,
        cumulative = request.cumulative,
        code = %code,
        "round trip complete"
    );
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DispatchConfig::new("localhost:9000");
        assert_eq!(config.endpoint, "localhost:9000");
        assert_eq!(config.io_timeout, DEFAULT_IO_TIMEOUT);
        assert_eq!(config.retries, 0);
    }

    #[tokio::test]
    async fn test_empty_ranking_dispatches_nothing() {
        // Nothing listens here; an empty ranking must never connect
        let dispatcher = Dispatcher::new(DispatchConfig::new("127.0.0.1:1"));
        let (report, metrics) = dispatcher.run(&Ranking::from_text("")).await.unwrap();

        assert!(report.lines().is_empty());
        assert_eq!(metrics.symbols_dispatched, 0);
        assert_eq!(metrics.round_trips, 0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_setup_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = DispatchConfig::new(addr.to_string());
        config.retries = 3;
        let err = request_code(&config, EncodeRequest::new(1.0, 0.5))
            .await
            .unwrap_err();
        assert!(err.is_setup(), "{err}");
    }
}
