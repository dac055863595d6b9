//! Report Types
//!
//! Immutable description of one detected conflict, built under the report
//! lock and handed to the embedder's sink. Everything is owned data, so a
//! sink may keep a report after the lock is released.

use std::fmt;

use serde::Serialize;

use crate::domain::thread::ThreadId;
use crate::domain::types::{Address, Pc};

/// What was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Two unordered accesses, at least one a write
    Race,
    /// Access to memory that was freed
    UseAfterFree,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Race => write!(f, "data race"),
            Self::UseAfterFree => write!(f, "heap-use-after-free"),
        }
    }
}

/// Source location resolved by a symbolizer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SymbolInfo {
    /// Function name
    pub function: String,
    /// Source file
    pub file: String,
    /// Line number
    pub line: u32,
}

/// One stack frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportFrame {
    /// Program counter
    pub pc: Pc,
    /// Resolved location, if the symbolizer knew it
    pub symbol: Option<SymbolInfo>,
}

/// Call stack, outermost caller first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportStack {
    /// Frames, root to leaf
    pub frames: Vec<ReportFrame>,
    /// Outer frames were dropped or could not be recovered
    pub truncated: bool,
}

impl ReportStack {
    /// Raw pcs, root to leaf
    pub fn pcs(&self) -> Vec<Pc> {
        self.frames.iter().map(|f| f.pc).collect()
    }

    /// Whether no frame is known
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// One of the conflicting memory operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportMop {
    /// Accessing thread
    pub tid: ThreadId,
    /// First byte accessed
    pub addr: Address,
    /// Access width in bytes
    pub size: usize,
    /// Whether the access was a write
    pub is_write: bool,
    /// Stack at the time of the access
    pub stack: ReportStack,
}

/// Thread involved in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportThread {
    /// Thread id
    pub tid: ThreadId,
    /// Incarnation of the tid
    pub reuse_count: u32,
    /// Embedder-supplied identifier
    pub uid: u64,
    /// Still running when the report was built
    pub running: bool,
    /// Name set through the detector, if any
    pub name: Option<String>,
    /// Stack of the creating thread at creation time
    pub creation_stack: ReportStack,
}

/// Complete report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDesc {
    /// Kind of problem
    pub kind: ReportKind,
    /// `[previous, current]` for a race; `[current]` for a use after free
    pub mops: Vec<ReportMop>,
    /// Threads whose incarnation could be identified
    pub threads: Vec<ReportThread>,
}

impl ReportDesc {
    /// Thread descriptor for `tid`, if included
    pub fn thread(&self, tid: ThreadId) -> Option<&ReportThread> {
        self.threads.iter().find(|t| t.tid == tid)
    }
}

impl fmt::Display for ReportDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for mop in &self.mops {
            write!(
                f,
                " | {} of size {} at {:#x} by {}",
                if mop.is_write { "write" } else { "read" },
                mop.size,
                mop.addr,
                mop.tid
            )?;
        }
        Ok(())
    }
}
