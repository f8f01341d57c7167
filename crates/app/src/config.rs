//! Configuration for the requester and coding-service binaries.
//!
//! Handles parsing command-line arguments and filling in sensible defaults.
//!
//! # Philosophy
//!
//! Positional arguments match the classic invocations (`sfe-client <host>
//! <port>`, `sfe-server <port>`); everything else is an optional flag.

use sfe_core::service::{self, DEFAULT_MAX_CONNECTIONS};
use sfe_core::{dispatch, DispatchConfig, ServiceConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::Level;

/// Default requester bound on every socket operation, in milliseconds.
const CLIENT_TIMEOUT_MS: u64 = dispatch::DEFAULT_IO_TIMEOUT.as_millis() as u64;

/// Default service bound on every read and write, in milliseconds.
const SERVER_TIMEOUT_MS: u64 = service::DEFAULT_IO_TIMEOUT.as_millis() as u64;

/// Everything the requester needs for one run.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // === Endpoint ===
    /// Coding service host name or address
    pub host: String,

    /// Coding service port
    pub port: u16,

    // === Transport ===
    /// Bound on connect, read and write, in milliseconds
    pub timeout_ms: u64,

    /// Extra attempts per symbol after an I/O failure
    pub retries: u32,

    // === Input ===
    /// Generate a sample line of this many characters instead of reading stdin
    pub sample_len: Option<usize>,

    /// Seed for the sample generator
    pub seed: u64,

    // === Behavior ===
    /// Print dispatch metrics to stderr after the report
    pub print_metrics: bool,

    /// Print the resolved configuration to stderr
    pub print_config: bool,

    /// Most verbose log level shown
    pub log_level: Level,
}

impl ClientConfig {
    /// Parse configuration from command-line arguments (program name excluded).
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let mut positional: Vec<&str> = Vec::new();
        let mut timeout_ms: Option<u64> = None;
        let mut retries: Option<u32> = None;
        let mut sample_len: Option<usize> = None;
        let mut seed: Option<u64> = None;
        let mut print_metrics = false;
        let mut print_config = false;
        let mut log_level = Level::WARN;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--timeout-ms" => {
                    timeout_ms = Some(parse_value(args, &mut i, "--timeout-ms")?);
                }
                "--retries" => {
                    retries = Some(parse_value(args, &mut i, "--retries")?);
                }
                "--sample" => {
                    sample_len = Some(parse_value(args, &mut i, "--sample")?);
                }
                "--seed" => {
                    seed = Some(parse_value(args, &mut i, "--seed")?);
                }
                "--metrics" => {
                    print_metrics = true;
                }
                "--print-config" => {
                    print_config = true;
                }
                "--verbose" | "-v" => {
                    log_level = Level::DEBUG;
                }
                "--help" | "-h" => {
                    print_client_help();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => {
                    return Err(format!("unknown argument: {flag}"));
                }
                value => positional.push(value),
            }
            i += 1;
        }

        let (host, port) = match positional.as_slice() {
            [host, port] => (host.to_string(), parse_port(port)?),
            _ => return Err("usage: sfe-client <host> <port> [OPTIONS]".to_string()),
        };

        let timeout_ms = timeout_ms.unwrap_or(CLIENT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err("--timeout-ms must be positive".to_string());
        }

        Ok(ClientConfig {
            host,
            port,
            timeout_ms,
            retries: retries.unwrap_or(0),
            sample_len,
            seed: seed.unwrap_or_else(time_seed),
            print_metrics,
            print_config,
            log_level,
        })
    }

    /// `host:port` as handed to the resolver.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Core dispatcher settings.
    pub fn dispatch_config(&self) -> DispatchConfig {
        let mut config = DispatchConfig::new(self.endpoint());
        config.io_timeout = Duration::from_millis(self.timeout_ms);
        config.retries = self.retries;
        config
    }

    /// Print the configuration in human-readable form (stderr).
    pub fn print(&self) {
        eprintln!("=== Configuration ===");
        eprintln!("Endpoint: {}", self.endpoint());
        eprintln!("Timeout: {} ms", self.timeout_ms);
        eprintln!("Retries: {}", self.retries);
        match self.sample_len {
            Some(len) => eprintln!("Input: generated sample, {} chars, seed {}", len, self.seed),
            None => eprintln!("Input: stdin"),
        }
        eprintln!();
    }
}

/// Everything the coding service needs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Interface to bind
    pub bind_ip: IpAddr,

    /// Bound on read and write, in milliseconds
    pub timeout_ms: u64,

    /// Live connection cap
    pub max_connections: usize,

    /// Print the resolved configuration to stderr
    pub print_config: bool,

    /// Most verbose log level shown
    pub log_level: Level,
}

impl ServerConfig {
    /// Parse configuration from command-line arguments (program name excluded).
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let mut port: Option<u16> = None;
        let mut bind_ip: Option<IpAddr> = None;
        let mut timeout_ms: Option<u64> = None;
        let mut max_connections: Option<usize> = None;
        let mut print_config = false;
        let mut log_level = Level::INFO;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--bind" => {
                    bind_ip = Some(parse_value(args, &mut i, "--bind")?);
                }
                "--timeout-ms" => {
                    timeout_ms = Some(parse_value(args, &mut i, "--timeout-ms")?);
                }
                "--max-connections" => {
                    max_connections = Some(parse_value(args, &mut i, "--max-connections")?);
                }
                "--print-config" => {
                    print_config = true;
                }
                "--verbose" | "-v" => {
                    log_level = Level::DEBUG;
                }
                "--help" | "-h" => {
                    print_server_help();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => {
                    return Err(format!("unknown argument: {flag}"));
                }
                value if port.is_none() => {
                    port = Some(parse_port(value)?);
                }
                value => {
                    return Err(format!("unexpected argument: {value}"));
                }
            }
            i += 1;
        }

        let port = port.ok_or("ERROR: No port provided (usage: sfe-server <port> [OPTIONS])")?;

        let timeout_ms = timeout_ms.unwrap_or(SERVER_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err("--timeout-ms must be positive".to_string());
        }

        let max_connections = max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if max_connections == 0 {
            return Err("--max-connections must be at least 1".to_string());
        }

        Ok(ServerConfig {
            port,
            bind_ip: bind_ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            timeout_ms,
            max_connections,
            print_config,
            log_level,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Core service settings.
    pub fn service_config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::new(self.bind_addr());
        config.io_timeout = Duration::from_millis(self.timeout_ms);
        config.max_connections = self.max_connections;
        config
    }

    /// Print the configuration in human-readable form (stderr).
    pub fn print(&self) {
        eprintln!("=== Configuration ===");
        eprintln!("Bind: {}", self.bind_addr());
        eprintln!("Timeout: {} ms", self.timeout_ms);
        eprintln!("Max connections: {}", self.max_connections);
        eprintln!();
    }
}

/// Parse the value following a flag, advancing `i` past it.
fn parse_value<T: std::str::FromStr>(args: &[String], i: &mut usize, flag: &str) -> Result<T, String> {
    *i += 1;
    let raw = args
        .get(*i)
        .ok_or_else(|| format!("{flag} requires a value"))?;
    raw.parse()
        .map_err(|_| format!("invalid value for {flag}: {raw}"))
}

fn parse_port(raw: &str) -> Result<u16, String> {
    raw.parse().map_err(|_| format!("invalid port: {raw}"))
}

fn time_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn print_client_help() {
    println!("sfe-client: Shannon-Fano-Elias codes for one line of stdin");
    println!();
    println!("USAGE:");
    println!("    sfe-client <HOST> <PORT> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --timeout-ms <MS>     Bound on connect/read/write (default: {CLIENT_TIMEOUT_MS})");
    println!("    --retries <N>         Retries per symbol on I/O failure (default: 0)");
    println!("    --sample <LEN>        Encode a generated line instead of stdin");
    println!("    --seed <N>            Seed for --sample (default: time-based)");
    println!("    --metrics             Print dispatch metrics to stderr");
    println!("    --print-config        Print resolved configuration");
    println!("    --verbose, -v         Debug logging");
    println!("    --help, -h            Print this help");
    println!();
    println!("EXAMPLES:");
    println!("    echo aaab | sfe-client localhost 9000");
    println!("    sfe-client localhost 9000 --sample 80 --seed 42 --metrics");
    println!();
}

fn print_server_help() {
    println!("sfe-server: stateless Shannon-Fano-Elias coding service");
    println!();
    println!("USAGE:");
    println!("    sfe-server <PORT> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --bind <IP>              Interface to listen on (default: 0.0.0.0)");
    println!("    --timeout-ms <MS>        Bound on read/write (default: {SERVER_TIMEOUT_MS})");
    println!("    --max-connections <N>    Live connection cap (default: {DEFAULT_MAX_CONNECTIONS})");
    println!("    --print-config           Print resolved configuration");
    println!("    --verbose, -v            Debug logging");
    println!("    --help, -h               Print this help");
    println!();
}
