//! Sample input generation.
//!
//! When `--sample` is given, the requester encodes a generated line instead
//! of reading stdin. The line has a skewed symbol distribution so the codes
//! come out with visibly different lengths.
//!
//! # Design
//!
//! Symbols are drawn from a fixed alphabet with a squared uniform draw, which
//! biases toward the front of the alphabet: early letters are common, late
//! letters rare. Output is a pure function of (seed, length).

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::BufRead;

/// Symbols a generated line is drawn from, most likely first.
const ALPHABET: &[u8] = b"etaoinshrdlucmfwypvbgkjqxz .,";

/// Generate a reproducible line of `len` characters.
pub fn generate_sample_line(seed: u64, len: usize) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (0..len)
        .map(|_| {
            let r: f64 = rng.gen();
            let idx = ((r * r) * ALPHABET.len() as f64) as usize;
            ALPHABET[idx.min(ALPHABET.len() - 1)] as char
        })
        .collect()
}

/// Read one line of input, without its line terminator.
///
/// End of input before any newline yields whatever was read, possibly empty.
/// A line that is not valid UTF-8 is taken byte by byte, each byte becoming
/// the `char` of the same value, so distinct bytes stay distinct symbols.
pub fn read_input_line<R: BufRead>(mut reader: R) -> std::io::Result<String> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;

    if line.ends_with(b"\n") {
        line.pop();
        if line.ends_with(b"\r") {
            line.pop();
        }
    }

    Ok(match String::from_utf8(line) {
        Ok(text) => text,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfe_core::Ranking;

    #[test]
    fn test_generate_sample_line() {
        let line = generate_sample_line(42, 1000);
        assert_eq!(line.chars().count(), 1000);
        assert!(line.bytes().all(|b| ALPHABET.contains(&b)));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_determinism() {
        assert_eq!(generate_sample_line(12345, 500), generate_sample_line(12345, 500));
    }

    #[test]
    fn test_different_seeds() {
        assert_ne!(generate_sample_line(1, 200), generate_sample_line(2, 200));
    }

    #[test]
    fn test_distribution_is_skewed() {
        let ranking = Ranking::from_text(&generate_sample_line(7, 10_000));
        let top = ranking.get(0).unwrap();
        let bottom = ranking.get(ranking.len() - 1).unwrap();
        assert!(top.count > bottom.count * 4);
    }

    #[test]
    fn test_read_input_line() {
        assert_eq!(read_input_line("aaab\nrest".as_bytes()).unwrap(), "aaab");
        assert_eq!(read_input_line("zzzz\r\n".as_bytes()).unwrap(), "zzzz");
        assert_eq!(read_input_line("no newline".as_bytes()).unwrap(), "no newline");
        assert_eq!(read_input_line("\n".as_bytes()).unwrap(), "");
        assert_eq!(read_input_line("".as_bytes()).unwrap(), "");
        // Interior whitespace is part of the alphabet
        assert_eq!(read_input_line(" a b \n".as_bytes()).unwrap(), " a b ");
    }

    #[test]
    fn test_read_input_line_raw_bytes() {
        let line = read_input_line(&[0xE9, b'a', b'a', 0xE8, b'\n', 0xFF][..]).unwrap();
        assert_eq!(line, "\u{e9}aa\u{e8}");

        let ranking = Ranking::from_text(&line);
        assert_eq!(ranking.len(), 3);
        assert_eq!(ranking.get(0).unwrap().symbol, 'a');
    }

    #[test]
    fn test_read_input_line_keeps_utf8() {
        assert_eq!(read_input_line("h\u{e9}llo\n".as_bytes()).unwrap(), "h\u{e9}llo");
    }

    #[test]
    fn test_empty() {
        assert_eq!(generate_sample_line(9, 0), "");
    }
}
