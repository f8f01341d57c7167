//! sfe-core: Shannon-Fano-Elias coding split across a requester and a coding service
//!
//! The requester ranks the symbols of a line of text, derives each rank's
//! cumulative midpoint, and sends one request per symbol, each over its own
//! connection. The coding service turns every (probability, midpoint) pair
//! into a code and forgets it.
//!
//! # Architecture
//!
//! Leaves first:
//! - `alphabet`: frequency analysis and the deterministic ranking
//! - `cumulative`: cumulative midpoints per rank
//! - `coding`: code length and binary expansion
//! - `wire`: fixed-layout request/response frames with timed I/O
//! - `dispatch`: one concurrent task per ranked symbol, joined before reporting
//! - `service`: accept loop with a reaped task per connection
//! - `report`: rank-indexed code table and the printed report
//! - `metrics`: observable counters for both sides
//!
//! # Design Principles
//!
//! - **No panics**: All errors are structured and propagated
//! - **Stateless service**: Nothing outlives a connection
//! - **Deterministic output**: The ranking fixes the report order
//! - **Bounded waits**: Every socket operation has a timeout

pub mod alphabet;
pub mod coding;
pub mod cumulative;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod report;
pub mod service;
pub mod wire;

// Re-export commonly used types
pub use alphabet::Ranking;
pub use dispatch::{DispatchConfig, Dispatcher};
pub use error::{Error, Result};
pub use report::Report;
pub use service::{CodingService, ServiceConfig};
