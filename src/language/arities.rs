//! Operand counts accepted by the operators of a language.

use std::collections::BTreeMap;

use super::symbol::SymbolId;

/// Operand counts per symbol, kept sorted and free of duplicates.
///
/// An operator with a single count is identified by its name alone. One with several counts
/// is overloaded: generated matchers have to check the operand count of such a node as well.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Arities {
    counts: BTreeMap<SymbolId, Vec<usize>>,
}

impl Arities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the counts recorded for `symbol`
    pub fn set(&mut self, symbol: SymbolId, mut counts: Vec<usize>) {
        counts.sort_unstable();
        counts.dedup();
        self.counts.insert(symbol, counts);
    }

    pub fn get(&self, symbol: SymbolId) -> Option<&[usize]> {
        self.counts.get(&symbol).map(Vec::as_slice)
    }

    pub fn is_overloaded(&self, symbol: SymbolId) -> bool {
        self.get(symbol).is_some_and(|counts| counts.len() > 1)
    }
}
