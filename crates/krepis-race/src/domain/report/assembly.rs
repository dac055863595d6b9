//! Report Assembly
//!
//! Turns the conflicting pair captured by the access scan into a
//! [`ReportDesc`]. Runs with the thread registry locked, so the traces and
//! epoch ranges it consults cannot change underneath it.

use super::ports::Symbolizer;
use super::types::{ReportDesc, ReportFrame, ReportKind, ReportMop, ReportStack, ReportThread};
use crate::domain::thread::{RacyAccess, ThreadRegistry, ThreadStatus};
use crate::domain::types::{Address, Pc};

/// Smallest range covering both accesses of a conflict
pub fn racy_range(racy: &RacyAccess) -> (Address, usize) {
    let cells = [racy.old, racy.cur];
    let pieces = cells
        .iter()
        .filter(|c| !c.is_freed())
        .map(|c| (racy.block + c.offset() as usize, c.size()));
    let start = pieces.clone().map(|(a, _)| a).min().unwrap_or(racy.block);
    let end = pieces.map(|(a, s)| a + s).max().unwrap_or(racy.block);
    (start, end - start)
}

/// Symbolize `pcs` (root first), keeping at most `limit` innermost frames
pub fn build_stack(pcs: &[Pc], truncated: bool, limit: usize, symbolizer: &dyn Symbolizer) -> ReportStack {
    let skip = pcs.len().saturating_sub(limit);
    ReportStack {
        frames: pcs[skip..]
            .iter()
            .map(|&pc| ReportFrame {
                pc,
                symbol: symbolizer.symbolize(pc),
            })
            .collect(),
        truncated: truncated || skip > 0,
    }
}

/// Build the report for one conflicting pair
pub fn assemble(
    registry: &ThreadRegistry,
    racy: &RacyAccess,
    symbolizer: &dyn Symbolizer,
    stack_limit: usize,
) -> ReportDesc {
    let pair = [racy.old, racy.cur];
    let (kind, cells) = if racy.old.is_freed() {
        (ReportKind::UseAfterFree, &pair[1..])
    } else {
        (ReportKind::Race, &pair[..])
    };

    let mops = cells
        .iter()
        .map(|cell| {
            let stack = match registry.restore_stack(cell.tid(), cell.epoch()) {
                Some(restored) => build_stack(&restored.frames, restored.truncated, stack_limit, symbolizer),
                None => ReportStack {
                    frames: Vec::new(),
                    truncated: true,
                },
            };
            ReportMop {
                tid: cell.tid(),
                addr: racy.block + cell.offset() as usize,
                size: cell.size(),
                is_write: cell.is_write(),
                stack,
            }
        })
        .collect();

    let mut threads: Vec<ReportThread> = Vec::with_capacity(cells.len());
    for cell in cells {
        if threads.iter().any(|t| t.tid == cell.tid()) {
            continue;
        }
        let Some(ctx) = registry.context(cell.tid()) else {
            continue;
        };
        if !ctx.owns_epoch(cell.epoch()) {
            continue;
        }
        threads.push(ReportThread {
            tid: ctx.tid,
            reuse_count: ctx.reuse_count,
            uid: ctx.uid,
            running: ctx.status == ThreadStatus::Running,
            name: ctx.name.clone(),
            creation_stack: build_stack(&ctx.creation_stack, false, stack_limit, symbolizer),
        });
    }

    ReportDesc {
        kind,
        mops,
        threads,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shadow::ShadowCell;
    use crate::domain::report::SymbolInfo;
    use crate::domain::thread::{RegistryLimits, ThreadId};
    use crate::domain::trace::{EventType, TraceGeometry};

    struct Names;

    impl Symbolizer for Names {
        fn symbolize(&self, pc: Pc) -> Option<SymbolInfo> {
            (pc == 0x10).then(|| SymbolInfo {
                function: "worker".into(),
                file: "worker.rs".into(),
                line: 7,
            })
        }
    }

    fn registry() -> ThreadRegistry {
        ThreadRegistry::new(RegistryLimits {
            max_threads: 8,
            quarantine: 0,
            trace: TraceGeometry::new(256, 4).unwrap(),
            stack_depth: 64,
        })
    }

    #[test]
    fn test_build_stack_keeps_innermost_frames() {
        let stack = build_stack(&[1, 2, 3, 4, 0x10], false, 3, &Names);
        assert_eq!(stack.pcs(), vec![3, 4, 0x10]);
        assert!(stack.truncated);
        assert_eq!(stack.frames[2].symbol.as_ref().unwrap().function, "worker");
        assert!(stack.frames[0].symbol.is_none());
    }

    #[test]
    fn test_racy_range_covers_both() {
        let racy = RacyAccess {
            block: 0x1000,
            old: ShadowCell::encode(ThreadId::new(1), 3, 0, 2, true),
            cur: ShadowCell::encode(ThreadId::new(2), 3, 2, 2, false),
        };
        assert_eq!(racy_range(&racy), (0x1000, 6));
    }

    #[test]
    fn test_assemble_race_between_live_threads() {
        let mut reg = registry();
        let main_tid = reg.create(None, 0, false).unwrap();
        let mut main = reg.start(main_tid).unwrap();
        main.enter(0x10).unwrap();
        let tid = reg.create(Some(&mut main), 5, false).unwrap();
        let mut child = reg.start(tid).unwrap();
        reg.set_name(tid, "worker").unwrap();

        let old_epoch = main.tick(EventType::Mop, 0x11).unwrap();
        let cur_epoch = child.tick(EventType::Mop, 0x21).unwrap();
        let racy = RacyAccess {
            block: 0x2000,
            old: ShadowCell::encode(main_tid, old_epoch, 4, 2, true),
            cur: ShadowCell::encode(tid, cur_epoch, 4, 2, false),
        };

        let report = assemble(&reg, &racy, &Names, 64);
        assert_eq!(report.kind, ReportKind::Race);
        assert_eq!(report.mops.len(), 2);
        assert_eq!(report.mops[0].tid, main_tid);
        assert_eq!(report.mops[0].addr, 0x2004);
        assert!(report.mops[0].is_write);
        assert_eq!(report.mops[0].stack.pcs(), vec![0x10, 0x11]);
        assert_eq!(report.mops[1].stack.pcs(), vec![0x21]);

        let worker = report.thread(tid).unwrap();
        assert_eq!(worker.name.as_deref(), Some("worker"));
        assert_eq!(worker.uid, 5);
        assert!(worker.running);
        assert_eq!(worker.creation_stack.pcs(), vec![0x10]);
    }

    #[test]
    fn test_assemble_use_after_free() {
        let mut reg = registry();
        let main_tid = reg.create(None, 0, false).unwrap();
        let mut main = reg.start(main_tid).unwrap();
        let epoch = main.tick(EventType::Mop, 0x30).unwrap();
        let racy = RacyAccess {
            block: 0x3000,
            old: ShadowCell::FREED,
            cur: ShadowCell::encode(main_tid, epoch, 0, 3, false),
        };

        let report = assemble(&reg, &racy, &Names, 64);
        assert_eq!(report.kind, ReportKind::UseAfterFree);
        assert_eq!(report.mops.len(), 1);
        assert_eq!(report.mops[0].tid, main_tid);
        assert_eq!(report.threads.len(), 1);
    }

    #[test]
    fn test_stale_epoch_has_no_thread_entry() {
        let mut reg = registry();
        let main_tid = reg.create(None, 0, false).unwrap();
        let mut main = reg.start(main_tid).unwrap();
        let epoch = main.tick(EventType::Mop, 0x30).unwrap();
        let racy = RacyAccess {
            block: 0x3000,
            old: ShadowCell::encode(ThreadId::new(6), 9, 0, 3, true),
            cur: ShadowCell::encode(main_tid, epoch, 0, 3, true),
        };

        let report = assemble(&reg, &racy, &Names, 64);
        assert!(report.mops[0].stack.is_empty());
        assert!(report.mops[0].stack.truncated);
        assert!(report.thread(ThreadId::new(6)).is_none());
        assert!(report.thread(main_tid).is_some());
    }
}
