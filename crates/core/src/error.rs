//! Error types for the Shannon-Fano-Elias encoder.
//!
//! All operations return structured errors rather than panicking.
//! The requester treats any error as fatal to the run; the coding service
//! treats an error as fatal only to the connection it happened on.

use std::net::SocketAddr;
use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Setup: binding, listening or connecting
/// - I/O: short or failed reads/writes on an established connection
/// - Protocol: a frame arrived complete but its contents are malformed
/// - Timeout: a socket operation exceeded its bound
/// - Dispatch: one per-symbol unit of work failed
#[derive(Debug, Error)]
pub enum Error {
    /// Could not bind, listen on, or connect to an endpoint
    #[error("setup error: cannot {action} {endpoint}: {source}")]
    Setup {
        action: &'static str,
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Read or write failed on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request or response frame
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A socket operation did not complete in time
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The round trip for one ranked symbol failed
    #[error("request for symbol {symbol:?} (rank {rank}) failed: {source}")]
    Dispatch {
        rank: usize,
        symbol: char,
        #[source]
        source: Box<Error>,
    },

    /// Code table slot misuse (double write, missing code)
    #[error("code table error: {0}")]
    CodeTable(#[from] CodeTableError),

    /// A spawned unit of work panicked or was cancelled
    #[error("task error: {0}")]
    Task(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a setup error for a failed bind.
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Error::Setup {
            action: "bind",
            endpoint: addr.to_string(),
            source,
        }
    }

    /// Build a setup error for a failed connect.
    pub fn connect(endpoint: &str, source: std::io::Error) -> Self {
        Error::Setup {
            action: "connect to",
            endpoint: endpoint.to_string(),
            source,
        }
    }

    /// Whether this is a setup failure (bind/listen/connect).
    pub fn is_setup(&self) -> bool {
        match self {
            Error::Setup { .. } => true,
            Error::Dispatch { source, .. } => source.is_setup(),
            _ => false,
        }
    }

    /// Whether a bounded retry of the whole round trip may help.
    ///
    /// Only transport-level I/O failures qualify. Setup failures and
    /// malformed frames are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Timeout { .. })
    }
}

/// Wire protocol violations.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// Probability outside (0, 1] or not finite
    #[error("probability {0} is outside (0, 1]")]
    InvalidProbability(f64),

    /// Cumulative midpoint outside [0, 1) or not finite
    #[error("cumulative midpoint {0} is outside [0, 1)")]
    InvalidCumulative(f64),

    /// Code length is zero or larger than the protocol allows
    #[error("code length {length} outside 1..={max}")]
    CodeLengthOutOfRange { length: u32, max: u32 },

    /// A code byte was not ASCII '0' or '1'
    #[error("invalid code byte {byte:#04x} at position {position}")]
    InvalidCodeBit { position: usize, byte: u8 },
}

/// Code table errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeTableError {
    /// Rank index beyond the table
    #[error("rank {rank} out of range for {len} slots")]
    RankOutOfRange { rank: usize, len: usize },

    /// A slot was written twice
    #[error("rank {0} already has a code")]
    AlreadyRecorded(usize),

    /// A slot was never written
    #[error("rank {0} has no code")]
    Missing(usize),
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
