//! Wire protocol between the requester and the coding service.
//!
//! One connection carries exactly one request and one response.
//!
//! # Request Frame (16 bytes)
//!
//! ```text
//! +----------------------------+
//! | probability (8)            |  f64, IEEE-754 bits, big-endian
//! +----------------------------+
//! | cumulative midpoint (8)    |  f64, IEEE-754 bits, big-endian
//! +----------------------------+
//! ```
//!
//! # Response Frame (4 + L bytes)
//!
//! ```text
//! +----------------------------+
//! | code length L (4)          |  u32 big-endian, 1..=MAX_CODE_LENGTH
//! +----------------------------+
//! | code (L)                   |  ASCII '0' / '1', MSB first, unpacked
//! +----------------------------+
//! ```
//!
//! # Timeouts
//!
//! Every read, write and connect is bounded by a caller-supplied timeout.
//! A timeout surfaces as [`Error::Timeout`], a short read as an
//! `UnexpectedEof` [`Error::Io`].

use crate::error::{Error, ProtocolError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of a request frame in bytes
pub const REQUEST_SIZE: usize = 16;

/// Size of the response length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Longest code either side will produce or accept.
pub const MAX_CODE_LENGTH: u32 = 64;

/// One symbol's (probability, cumulative midpoint) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeRequest {
    pub probability: f64,
    pub cumulative: f64,
}

impl EncodeRequest {
    pub fn new(probability: f64, cumulative: f64) -> Self {
        Self {
            probability,
            cumulative,
        }
    }

    /// Serialize into the fixed 16-byte frame.
    pub fn to_bytes(&self) -> [u8; REQUEST_SIZE] {
        let mut frame = [0u8; REQUEST_SIZE];
        frame[..8].copy_from_slice(&self.probability.to_be_bytes());
        frame[8..].copy_from_slice(&self.cumulative.to_be_bytes());
        frame
    }

    /// Parse a 16-byte frame. Values are not validated here.
    pub fn from_bytes(frame: &[u8; REQUEST_SIZE]) -> Self {
        let mut probability = [0u8; 8];
        let mut cumulative = [0u8; 8];
        probability.copy_from_slice(&frame[..8]);
        cumulative.copy_from_slice(&frame[8..]);

        Self {
            probability: f64::from_be_bytes(probability),
            cumulative: f64::from_be_bytes(cumulative),
        }
    }

    /// Check both fields are usable for coding.
    ///
    /// # Errors
    /// - `ProtocolError::InvalidProbability` unless p is finite and in (0, 1]
    /// - `ProtocolError::InvalidCumulative` unless F is finite and in [0, 1)
    pub fn validate(&self) -> Result<()> {
        let p = self.probability;
        if !(p.is_finite() && p > 0.0 && p <= 1.0) {
            return Err(ProtocolError::InvalidProbability(p).into());
        }

        let f = self.cumulative;
        if !(f.is_finite() && (0.0..1.0).contains(&f)) {
            return Err(ProtocolError::InvalidCumulative(f).into());
        }

        Ok(())
    }
}

/// Serialize a code into a response frame.
pub fn encode_response(code: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + code.len());
    frame.extend_from_slice(&(code.len() as u32).to_be_bytes());
    frame.extend_from_slice(code.as_bytes());
    frame
}

/// Parse and range-check the length prefix of a response.
///
/// # Errors
/// `ProtocolError::CodeLengthOutOfRange` for 0 or anything above
/// [`MAX_CODE_LENGTH`].
pub fn parse_code_length(prefix: [u8; LENGTH_PREFIX_SIZE]) -> Result<usize> {
    let length = u32::from_be_bytes(prefix);
    if length == 0 || length > MAX_CODE_LENGTH {
        return Err(ProtocolError::CodeLengthOutOfRange {
            length,
            max: MAX_CODE_LENGTH,
        }
        .into());
    }
    Ok(length as usize)
}

/// Check that the code body is only ASCII '0'/'1' and turn it into a string.
pub fn parse_code(body: Vec<u8>) -> Result<String> {
    if let Some((position, &byte)) = body
        .iter()
        .enumerate()
        .find(|&(_, &b)| b != b'0' && b != b'1')
    {
        return Err(ProtocolError::InvalidCodeBit { position, byte }.into());
    }

    Ok(body.into_iter().map(char::from).collect())
}

/// Run `op` with a deadline, mapping expiry to [`Error::Timeout`].
pub async fn with_timeout<T, F>(operation: &'static str, limit: Duration, op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation,
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

/// Write a request frame.
pub async fn write_request<W>(writer: &mut W, request: &EncodeRequest, limit: Duration) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = request.to_bytes();
    with_timeout("request write", limit, async {
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok::<(), Error>(())
    })
    .await
}

/// Read exactly one request frame.
pub async fn read_request<R>(reader: &mut R, limit: Duration) -> Result<EncodeRequest>
where
    R: AsyncRead + Unpin,
{
    let mut frame = [0u8; REQUEST_SIZE];
    with_timeout("request read", limit, async {
        reader.read_exact(&mut frame).await?;
        Ok::<(), Error>(())
    })
    .await?;
    Ok(EncodeRequest::from_bytes(&frame))
}

/// Write a response frame (length prefix then code bytes).
pub async fn write_response<W>(writer: &mut W, code: &str, limit: Duration) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_response(code);
    with_timeout("response write", limit, async {
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok::<(), Error>(())
    })
    .await
}

/// Read one response frame and return the code.
///
/// The whole frame shares one deadline.
pub async fn read_response<R>(reader: &mut R, limit: Duration) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    with_timeout("response read", limit, async {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        reader.read_exact(&mut prefix).await?;
        let length = parse_code_length(prefix)?;

        let mut body = vec![0u8; length];
        reader.read_exact(&mut body).await?;
        parse_code(body)
    })
    .await
}
