//! Expected and Benign Races
//!
//! Annotated address ranges where a race is known. A race whose accesses
//! overlap an annotated range is swallowed under the annotation lock alone,
//! before the registry or report counters are locked. An
//! expected race that never fires is a failure at finalization; a benign one
//! is not.

use serde::Serialize;

use crate::domain::types::Address;

/// One annotated range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectedRace {
    /// First byte of the range
    pub addr: Address,
    /// Length in bytes
    pub size: usize,
    /// Free-form note from the annotation site
    pub description: String,
    /// Whether firing is optional
    pub benign: bool,
    /// Races swallowed by this entry
    pub hits: u64,
}

impl ExpectedRace {
    fn overlaps(&self, addr: Address, size: usize) -> bool {
        addr < self.addr.saturating_add(self.size) && self.addr < addr.saturating_add(size)
    }
}

/// Registry of annotated ranges
#[derive(Debug, Default)]
pub struct ExpectedRaces {
    entries: Vec<ExpectedRace>,
}

impl ExpectedRaces {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotate `[addr, addr + size)`
    pub fn add(&mut self, addr: Address, size: usize, description: impl Into<String>, benign: bool) {
        self.entries.push(ExpectedRace {
            addr,
            size: size.max(1),
            description: description.into(),
            benign,
            hits: 0,
        });
    }

    /// Record a race on `[addr, addr + size)`; true when it was annotated
    pub fn hit(&mut self, addr: Address, size: usize) -> bool {
        match self.entries.iter_mut().find(|e| e.overlaps(addr, size)) {
            Some(entry) => {
                entry.hits += 1;
                true
            }
            None => false,
        }
    }

    /// Races swallowed so far
    pub fn total_hits(&self) -> u64 {
        self.entries.iter().map(|e| e.hits).sum()
    }

    /// Expected (non-benign) entries that never fired
    pub fn missed(&self) -> impl Iterator<Item = &ExpectedRace> {
        self.entries.iter().filter(|e| !e.benign && e.hits == 0)
    }

    /// Number of annotations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is annotated
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
