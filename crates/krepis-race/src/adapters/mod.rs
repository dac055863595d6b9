//! Adapters Layer - Ports & Adapters Pattern
//!
//! Concrete implementations of the report ports declared in
//! [`crate::domain::report::ports`].
//!
//! # Hexagonal Architecture
//! - Inbound: instrumentation hooks call [`Detector`](crate::domain::detector::Detector)
//! - Outbound: the detector calls a [`Symbolizer`](crate::domain::report::Symbolizer),
//!   a [`Suppressor`](crate::domain::report::Suppressor) and a
//!   [`ReportSink`](crate::domain::report::ReportSink)

pub mod sinks;
pub mod symbolizer;

pub use sinks::{CollectingSink, JsonSink, LogSink};
pub use symbolizer::{NoSuppressions, NoSymbolizer, PcSuppressions, TableSymbolizer};
