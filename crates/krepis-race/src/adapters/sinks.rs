//! Report Sinks
//!
//! - [`LogSink`]: one `tracing` warning per report (the default)
//! - [`JsonSink`]: one JSON document per report, through `tracing`
//! - [`CollectingSink`]: keeps reports in memory for tests and embedders

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::domain::report::{ReportDesc, ReportSink};

/// Logs every report as a warning
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&self, report: &ReportDesc) {
        warn!(kind = %report.kind, threads = report.threads.len(), "WARNING: {report}");
        for (i, mop) in report.mops.iter().enumerate() {
            for frame in mop.stack.frames.iter().rev() {
                match &frame.symbol {
                    Some(sym) => warn!(
                        mop = i,
                        pc = frame.pc,
                        "  {} {}:{}",
                        sym.function,
                        sym.file,
                        sym.line
                    ),
                    None => warn!(mop = i, pc = frame.pc, "  <unknown>"),
                }
            }
            if mop.stack.truncated {
                warn!(mop = i, "  <stack truncated>");
            }
        }
    }
}

/// Logs every report as one serialized JSON document
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSink;

impl ReportSink for JsonSink {
    fn report(&self, report: &ReportDesc) {
        match serde_json::to_string(report) {
            Ok(json) => warn!(target: "krepis_race::report", "{json}"),
            Err(err) => warn!(%err, "{report}"),
        }
    }
}

/// Keeps every report; clones share the same storage
///
/// # Example
///
/// ```rust
/// use krepis_race::adapters::CollectingSink;
///
/// let sink = CollectingSink::new();
/// let handle = sink.clone();
/// assert!(handle.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    reports: Arc<Mutex<Vec<ReportDesc>>>,
}

impl CollectingSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every report received so far
    pub fn reports(&self) -> Vec<ReportDesc> {
        self.reports.lock().clone()
    }

    /// Number of reports received
    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    /// Remove and return every report
    pub fn take(&self) -> Vec<ReportDesc> {
        std::mem::take(&mut *self.reports.lock())
    }
}

impl ReportSink for CollectingSink {
    fn report(&self, report: &ReportDesc) {
        self.reports.lock().push(report.clone());
    }
}
