//! Frequency analysis and ranking.
//!
//! Turns one line of input text into a ranked list of distinct symbols.
//! The ranking is a deterministic total order: count descending, then
//! symbol value ascending. The rank index (array position) is used to
//! address probabilities, cumulative midpoints and codes everywhere else.

use std::collections::BTreeMap;

/// One distinct character and how often it occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub value: char,
    pub count: u64,
}

/// The set of distinct symbols observed in the input.
///
/// # Invariants
/// - each symbol appears exactly once
/// - every count is > 0
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alphabet {
    counts: BTreeMap<char, u64>,
    total: u64,
}

impl Alphabet {
    /// Count occurrences of every character in `text`.
    pub fn from_text(text: &str) -> Self {
        let mut counts = BTreeMap::new();
        let mut total = 0;
        for ch in text.chars() {
            *counts.entry(ch).or_insert(0) += 1;
            total += 1;
        }
        Self { counts, total }
    }

    /// Number of distinct symbols.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of characters counted (N).
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Symbols in ascending value order.
    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.counts
            .iter()
            .map(|(&value, &count)| Symbol { value, count })
    }
}

/// A symbol at a fixed rank, with its probability count / N.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedSymbol {
    pub symbol: char,
    pub count: u64,
    pub probability: f64,
}

/// Symbols ordered by probability descending, ties broken by value ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    entries: Vec<RankedSymbol>,
}

impl Ranking {
    /// Analyze `text` and rank its symbols.
    pub fn from_text(text: &str) -> Self {
        Self::from_alphabet(&Alphabet::from_text(text))
    }

    /// Rank an already-counted alphabet.
    pub fn from_alphabet(alphabet: &Alphabet) -> Self {
        let total = alphabet.total() as f64;

        let mut symbols: Vec<Symbol> = alphabet.symbols().collect();
        symbols.sort_by(|a, b| b.count.cmp(&a.count).then(a.value.cmp(&b.value)));

        let entries = symbols
            .into_iter()
            .map(|s| RankedSymbol {
                symbol: s.value,
                count: s.count,
                probability: s.count as f64 / total,
            })
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The symbol at `rank`, if any.
    pub fn get(&self, rank: usize) -> Option<&RankedSymbol> {
        self.entries.get(rank)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankedSymbol> {
        self.entries.iter()
    }

    /// Probabilities in rank order.
    pub fn probabilities(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.probability).collect()
    }

    /// Shannon entropy of the distribution in bits per symbol.
    pub fn entropy(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| -e.probability * e.probability.log2())
            .sum()
    }
}

impl<'a> IntoIterator for &'a Ranking {
    type Item = &'a RankedSymbol;
    type IntoIter = std::slice::Iter<'a, RankedSymbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
