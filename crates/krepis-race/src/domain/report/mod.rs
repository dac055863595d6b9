//! Race Reports
//!
//! - [`types`]: owned report structures (serde-serializable)
//! - [`ports`]: symbolizer, suppressor and sink traits
//! - [`assembly`]: builds a report from a conflicting pair
//! - [`expect`]: annotated expected / benign races

pub mod assembly;
pub mod expect;
pub mod ports;
pub mod types;

pub use expect::{ExpectedRace, ExpectedRaces};
pub use ports::{ReportSink, Suppressor, Symbolizer};
pub use types::{
    ReportDesc, ReportFrame, ReportKind, ReportMop, ReportStack, ReportThread, SymbolInfo,
};
