//! Code table and the final symbol -> code report.
//!
//! The code table has one slot per rank. Each slot is written exactly once,
//! by whoever completed that rank's round trip, and is read only after every
//! slot is filled.

use crate::alphabet::Ranking;
use crate::error::{CodeTableError, Error, Result};
use std::fmt;

/// Header printed before the per-symbol lines.
pub const REPORT_HEADER: &str = "SHANNON-FANO-ELIAS Codes:";

/// Rank-indexed slots for retrieved codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTable {
    slots: Vec<Option<String>>,
}

impl CodeTable {
    /// A table with `len` empty slots.
    pub fn with_len(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots written so far.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Store the code for `rank`.
    ///
    /// # Errors
    /// - `CodeTableError::RankOutOfRange` if `rank >= len`
    /// - `CodeTableError::AlreadyRecorded` if the slot is already written
    pub fn record(&mut self, rank: usize, code: String) -> Result<()> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(rank)
            .ok_or(CodeTableError::RankOutOfRange { rank, len })?;

        if slot.is_some() {
            return Err(CodeTableError::AlreadyRecorded(rank).into());
        }

        *slot = Some(code);
        Ok(())
    }

    /// Consume the table, requiring every slot to be filled.
    ///
    /// # Errors
    /// `CodeTableError::Missing` naming the first empty rank.
    pub fn into_codes(self) -> Result<Vec<String>> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(rank, slot)| slot.ok_or_else(|| Error::from(CodeTableError::Missing(rank))))
            .collect()
    }
}

/// A complete report: every ranked symbol paired with its code.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    lines: Vec<(char, String)>,
    expected_length: f64,
}

impl Report {
    /// Join a ranking with its completed code table.
    ///
    /// # Errors
    /// Fails if the table size differs from the ranking or any slot is empty.
    pub fn new(ranking: &Ranking, table: CodeTable) -> Result<Self> {
        if table.len() != ranking.len() {
            return Err(CodeTableError::RankOutOfRange {
                rank: ranking.len(),
                len: table.len(),
            }
            .into());
        }

        let codes = table.into_codes()?;
        let expected_length = ranking
            .iter()
            .zip(&codes)
            .map(|(entry, code)| entry.probability * code.len() as f64)
            .sum();

        let lines = ranking
            .iter()
            .map(|entry| entry.symbol)
            .zip(codes)
            .collect();

        Ok(Self {
            lines,
            expected_length,
        })
    }

    /// (symbol, code) pairs in rank order.
    pub fn lines(&self) -> &[(char, String)] {
        &self.lines
    }

    /// Code of the symbol at `rank`.
    pub fn code(&self, rank: usize) -> Option<&str> {
        self.lines.get(rank).map(|(_, code)| code.as_str())
    }

    /// Expected code length sum(p * L) in bits per symbol.
    pub fn expected_length(&self) -> f64 {
        self.expected_length
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{REPORT_HEADER}")?;
        writeln!(f)?;
        for (symbol, code) in &self.lines {
            writeln!(f, "Symbol {symbol}, Code: {code}")?;
        }
        Ok(())
    }
}
