//! sfe-app: command-line front ends for the Shannon-Fano-Elias encoder
//!
//! - `config`: argument parsing for `sfe-client` and `sfe-server`
//! - `input_gen`: stdin line reading and seeded sample lines

pub mod config;
pub mod input_gen;

/// Install the stderr log subscriber shared by both binaries.
pub fn init_logging(level: tracing::Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
