//! Report Ports
//!
//! Collaborators the detector calls into when a report is assembled. The
//! detector owns boxed trait objects; report assembly is the cold path, so
//! dynamic dispatch costs nothing measurable there. Implementations live in
//! [`crate::adapters`].

use super::types::{ReportDesc, SymbolInfo};
use crate::domain::types::Pc;

/// Resolves program counters to source locations
pub trait Symbolizer: Send + Sync {
    /// Location of `pc`, if known
    fn symbolize(&self, pc: Pc) -> Option<SymbolInfo>;
}

/// Decides whether a report is hidden from the sink
pub trait Suppressor: Send + Sync {
    /// Whether `report` should be counted but not forwarded
    fn is_suppressed(&self, report: &ReportDesc) -> bool;
}

/// Receives every report that was not suppressed
pub trait ReportSink: Send + Sync {
    /// Consume one report
    fn report(&self, report: &ReportDesc);
}

impl<F> Suppressor for F
where
    F: Fn(&ReportDesc) -> bool + Send + Sync,
{
    fn is_suppressed(&self, report: &ReportDesc) -> bool {
        self(report)
    }
}
