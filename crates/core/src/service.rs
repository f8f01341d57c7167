//! The coding service: accept loop plus one stateless task per connection.
//!
//! # Connection Lifecycle
//!
//! ```text
//! LISTENING -> CONNECTED -> AWAITING_REQUEST -> READ_COMPLETE
//!           -> COMPUTING -> RESPONSE_SENT -> CLOSED
//! ```
//!
//! A failure in any state goes straight to CLOSED; the failure records the
//! state it happened in. Nothing is retried and nothing survives the
//! connection.
//!
//! # Concurrency
//!
//! The accept loop never waits on a connection. Each accepted stream is
//! handed to a task in a `JoinSet`; the same loop reaps finished tasks as
//! they complete (a `select!` branch beside `accept`), so retired tasks
//! never pile up. At most `max_connections` tasks are live at once: while
//! the set is full, accepting pauses until a task is reaped.
//!
//! Tasks share no mutable state. The only counters live in the accept loop.

use crate::coding;
use crate::error::{Error, Result};
use crate::metrics::ServiceMetrics;
use crate::wire;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, trace, warn};

/// Default bound on each read and write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on concurrently serviced connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Pause after a failed accept() before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Coding service configuration.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Address to listen on
    pub bind_addr: SocketAddr,

    /// Bound on every read and write
    pub io_timeout: Duration,

    /// Live connection cap (>= 1)
    pub max_connections: usize,
}

impl ServiceConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            io_timeout: DEFAULT_IO_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Listening,
    Connected,
    AwaitingRequest,
    ReadComplete,
    Computing,
    ResponseSent,
    Closed,
}

/// A connection that ended without completing its round trip.
#[derive(Debug, thiserror::Error)]
#[error("connection failed in state {state:?}: {error}")]
pub struct ConnectionFailure {
    pub state: ConnectionState,
    #[source]
    pub error: Error,
}

/// Serve one request on `stream` and close it.
///
/// Returns the code that was sent.
///
/// # Errors
/// A [`ConnectionFailure`] naming the state the connection was in when the
/// read, the computation or the write failed.
pub async fn serve_connection<S>(
    mut stream: S,
    limit: Duration,
) -> std::result::Result<String, ConnectionFailure>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut state = ConnectionState::Connected;

    let outcome = async {
        transition(&mut state, ConnectionState::AwaitingRequest);
        let request = wire::read_request(&mut stream, limit).await?;

        transition(&mut state, ConnectionState::ReadComplete);
        transition(&mut state, ConnectionState::Computing);
        let code = coding::encode(&request)?;

        // A failed write is charged to the response leg
        transition(&mut state, ConnectionState::ResponseSent);
        wire::write_response(&mut stream, &code, limit).await?;
        Ok::<String, Error>(code)
    }
    .await;

    let failed_in = state;
    transition(&mut state, ConnectionState::Closed);
    if let Err(e) = stream.shutdown().await {
        trace!(error = %e, "shutdown on close failed");
    }

    outcome.map_err(|error| ConnectionFailure {
        state: failed_in,
        error,
    })
}

fn transition(state: &mut ConnectionState, next: ConnectionState) {
    trace!(from = ?*state, to = ?next, "connection transition");
    *state = next;
}

/// A bound, not yet running, coding service.
pub struct CodingService {
    listener: TcpListener,
    config: ServiceConfig,
}

impl CodingService {
    /// Bind the listening socket.
    ///
    /// # Errors
    /// [`Error::Setup`] if the address cannot be bound, or
    /// [`Error::Config`] if `max_connections` is zero.
    pub async fn bind(config: ServiceConfig) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".into()));
        }

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| Error::bind(config.bind_addr, e))?;

        info!(
            addr = %listener.local_addr()?,
            timeout_ms = config.io_timeout.as_millis() as u64,
            max_connections = config.max_connections,
            "coding service listening"
        );

        Ok(Self { listener, config })
    }

    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve forever.
    pub async fn run(self) -> Result<ServiceMetrics> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then finish in-flight connections.
    pub async fn run_until<F>(self, shutdown: F) -> Result<ServiceMetrics>
    where
        F: Future<Output = ()>,
    {
        let mut metrics = ServiceMetrics::default();
        let mut connections = JoinSet::new();
        let limit = self.config.io_timeout;
        tokio::pin!(shutdown);

        trace!(state = ?ConnectionState::Listening, "accept loop started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(in_flight = metrics.in_flight(), "shutdown requested");
                    break;
                }

                Some(joined) = connections.join_next() => {
                    retire(joined, &mut metrics);
                }

                accepted = self.listener.accept(), if connections.len() < self.config.max_connections => {
                    match accepted {
                        Ok((stream, peer)) => {
                            metrics.accepted += 1;
                            debug!(%peer, "accepted connection");
                            connections.spawn(async move {
                                (peer, serve_connection(stream, limit).await)
                            });
                        }
                        Err(e) => {
                            metrics.accept_errors += 1;
                            error!(error = %e, "accept failed");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }

        while let Some(joined) = connections.join_next().await {
            retire(joined, &mut metrics);
        }

        info!(metrics = %metrics.summary(), "coding service stopped");
        Ok(metrics)
    }
}

type ConnectionResult = (SocketAddr, std::result::Result<String, ConnectionFailure>);

/// Account for one finished connection task.
fn retire(joined: std::result::Result<ConnectionResult, JoinError>, metrics: &mut ServiceMetrics) {
    metrics.reaped += 1;
    match joined {
        Ok((peer, Ok(code))) => {
            metrics.served += 1;
            debug!(%peer, %code, "served");
        }
        Ok((peer, Err(failure))) => {
            metrics.failed += 1;
            warn!(%peer, state = ?failure.state, error = %failure.error, "connection failed");
        }
        Err(e) => {
            metrics.failed += 1;
            error!(error = %e, "connection task did not finish");
        }
    }
}
