//! Symbolizers and Suppressors

use std::collections::{HashMap, HashSet};

use crate::domain::report::{ReportDesc, Suppressor, SymbolInfo, Symbolizer};
use crate::domain::types::Pc;

/// Leaves every frame unresolved
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbolizer;

impl Symbolizer for NoSymbolizer {
    fn symbolize(&self, _pc: Pc) -> Option<SymbolInfo> {
        None
    }
}

/// Resolves pcs from a table filled by the embedder
///
/// # Example
///
/// ```rust
/// use krepis_race::adapters::TableSymbolizer;
/// use krepis_race::domain::report::Symbolizer;
///
/// let mut table = TableSymbolizer::new();
/// table.insert(0x40, "worker_loop", "worker.rs", 12);
/// assert_eq!(table.symbolize(0x40).unwrap().function, "worker_loop");
/// assert!(table.symbolize(0x41).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TableSymbolizer {
    symbols: HashMap<Pc, SymbolInfo>,
}

impl TableSymbolizer {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `pc` to a source location
    pub fn insert(&mut self, pc: Pc, function: impl Into<String>, file: impl Into<String>, line: u32) {
        self.symbols.insert(
            pc,
            SymbolInfo {
                function: function.into(),
                file: file.into(),
                line,
            },
        );
    }

    /// Number of known pcs
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether no pc is known
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Symbolizer for TableSymbolizer {
    fn symbolize(&self, pc: Pc) -> Option<SymbolInfo> {
        self.symbols.get(&pc).cloned()
    }
}

/// Forwards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSuppressions;

impl Suppressor for NoSuppressions {
    fn is_suppressed(&self, _report: &ReportDesc) -> bool {
        false
    }
}

/// Hides reports whose stacks contain a listed pc
///
/// Matches the innermost frame of every operation as well as any outer
/// frame, so suppressing a helper function hides races inside its callees.
#[derive(Debug, Clone, Default)]
pub struct PcSuppressions {
    pcs: HashSet<Pc>,
}

impl PcSuppressions {
    /// Suppress reports mentioning any of `pcs`
    pub fn new(pcs: impl IntoIterator<Item = Pc>) -> Self {
        Self {
            pcs: pcs.into_iter().collect(),
        }
    }
}

impl Suppressor for PcSuppressions {
    fn is_suppressed(&self, report: &ReportDesc) -> bool {
        report
            .mops
            .iter()
            .flat_map(|mop| mop.stack.frames.iter())
            .any(|frame| self.pcs.contains(&frame.pc))
    }
}
