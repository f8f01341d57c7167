//! The Shannon-Fano-Elias arithmetic performed by the coding service.
//!
//! Given a symbol's probability `p` and cumulative midpoint `F`:
//! - code length `L = ceil(log2(1/p)) + 1`
//! - code = the first `L` bits of the binary expansion of `F`
//!
//! The resulting codes are prefix-free: the code for a symbol, read as a
//! binary fraction, lies in `[F - 2^-L, F]`, and `2^-L <= p/2`, so the
//! dyadic interval it names stays inside the symbol's own slice of `[0, 1)`.

use crate::error::{ProtocolError, Result};
use crate::wire::{EncodeRequest, MAX_CODE_LENGTH};

/// Code length for a symbol of probability `p`.
///
/// `p = 1.0` gives `log2(1) = 0` and therefore a one-bit code. Exact powers
/// of one half are exact in binary floating point, so `p = 2^-k` yields
/// `L = k + 1` with no rounding drift.
///
/// # Errors
/// `ProtocolError::InvalidProbability` unless `p` is finite and in (0, 1].
pub fn code_length(p: f64) -> Result<u32> {
    if !(p.is_finite() && p > 0.0 && p <= 1.0) {
        return Err(ProtocolError::InvalidProbability(p).into());
    }

    let length = (1.0 / p).log2().ceil() + 1.0;
    if length > MAX_CODE_LENGTH as f64 {
        return Err(ProtocolError::CodeLengthOutOfRange {
            length: length as u32,
            max: MAX_CODE_LENGTH,
        }
        .into());
    }

    Ok(length as u32)
}

/// First `length` bits of the binary expansion of `value`, MSB first,
/// as ASCII '0'/'1'.
///
/// Doubling and subtracting one are exact in binary floating point, so the
/// bits are exactly those of the stored `f64`.
pub fn binary_expansion(value: f64, length: u32) -> String {
    let mut running = value;
    let mut bits = String::with_capacity(length as usize);

    for _ in 0..length {
        running *= 2.0;
        if running >= 1.0 {
            running -= 1.0;
            bits.push('1');
        } else {
            bits.push('0');
        }
    }

    bits
}

/// Read a '0'/'1' string as a binary fraction (MSB first).
///
/// `"011"` is `0.011b = 0.375`. Characters other than '1' count as zero.
pub fn decode_fraction(bits: &str) -> f64 {
    let mut value = 0.0;
    let mut weight = 0.5;
    for bit in bits.bytes() {
        if bit == b'1' {
            value += weight;
        }
        weight /= 2.0;
    }
    value
}

/// Compute the code for one request.
///
/// # Errors
/// Rejects probabilities outside (0, 1] and midpoints outside [0, 1).
pub fn encode(request: &EncodeRequest) -> Result<String> {
    request.validate()?;
    let length = code_length(request.probability)?;
    Ok(binary_expansion(request.cumulative, length))
}

/// Whether no code in `codes` is a prefix of another.
pub fn is_prefix_free<S: AsRef<str>>(codes: &[S]) -> bool {
    let mut sorted: Vec<&str> = codes.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    // In lexicographic order a prefix sorts directly before some extension of it
    sorted.windows(2).all(|w| !w[1].starts_with(w[0]))
}
