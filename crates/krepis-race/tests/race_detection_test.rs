//! Race Detection Scenarios
//!
//! End-to-end checks through the public detector hooks: which access
//! patterns are reported, and what the reports contain.

use krepis_race::adapters::{CollectingSink, PcSuppressions, TableSymbolizer};
use krepis_race::domain::detector::DetectorBuilder;
use krepis_race::domain::shadow::FlatShadow;
use krepis_race::{DetectorConfig, ProductionDetector, ReportKind, ThreadState, VectorClock};

fn detector() -> (ProductionDetector, CollectingSink) {
    let sink = CollectingSink::new();
    let detector = DetectorBuilder::new().sink(sink.clone()).build().unwrap();
    (detector, sink)
}

fn spawn(detector: &ProductionDetector, parent: &mut ThreadState, uid: u64) -> ThreadState {
    let tid = detector.on_thread_create(parent, uid, false);
    detector.on_thread_start(tid)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reported patterns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_unordered_writes_race() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);

    detector.on_memory_access(&mut worker, 0x10, 0x1000, 8, true);
    detector.on_memory_access(&mut main, 0x20, 0x1000, 8, true);

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.kind, ReportKind::Race);
    assert_eq!(report.mops.len(), 2);

    // previously recorded access first
    assert_eq!(report.mops[0].tid, worker.tid());
    assert_eq!(report.mops[0].stack.pcs(), vec![0x10]);
    assert_eq!(report.mops[1].tid, main.tid());
    assert_eq!(report.mops[1].stack.pcs(), vec![0x20]);
    for mop in &report.mops {
        assert_eq!(mop.addr, 0x1000);
        assert_eq!(mop.size, 8);
        assert!(mop.is_write);
    }

    assert_eq!(report.threads.len(), 2);
    assert_eq!(report.thread(worker.tid()).unwrap().uid, 1);
    assert!(report.thread(main.tid()).unwrap().running);
}

#[test]
fn test_read_then_unordered_write_races() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);

    detector.on_memory_access(&mut worker, 0x10, 0x1000, 4, false);
    detector.on_memory_access(&mut main, 0x20, 0x1000, 4, true);

    let report = &sink.reports()[0];
    assert!(!report.mops[0].is_write);
    assert!(report.mops[1].is_write);
}

#[test]
fn test_straddling_access_races_on_overlapping_piece() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);

    // [0x1004, 0x100c) is split into (0x1004, 4) and (0x1008, 4)
    detector.on_memory_access(&mut worker, 0x10, 0x1004, 8, true);
    detector.on_memory_access(&mut main, 0x20, 0x1008, 2, false);

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    let mops = &reports[0].mops;
    assert_eq!((mops[0].addr, mops[0].size), (0x1008, 4));
    assert_eq!((mops[1].addr, mops[1].size), (0x1008, 2));
    assert_eq!(worker.stats().range_accesses, 1);
}

#[test]
fn test_every_racing_access_is_reported() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);

    detector.on_memory_access(&mut worker, 0x10, 0x1000, 8, true);
    detector.on_memory_access(&mut main, 0x20, 0x1000, 8, true);
    detector.on_memory_access(&mut main, 0x30, 0x1000, 8, true);

    assert_eq!(sink.len(), 2);
    assert_eq!(main.stats().races, 2);
    assert!(main.last_race().is_some());
}

#[test]
fn test_use_after_free_has_one_mop() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);

    detector.on_memory_access(&mut main, 0x10, 0x3000, 8, true);
    detector.on_memory_range_freed(&mut main, 0x20, 0x3000, 16);
    assert!(sink.is_empty());

    detector.on_memory_access(&mut worker, 0x30, 0x300b, 1, false);

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].kind, ReportKind::UseAfterFree);
    assert_eq!(reports[0].mops.len(), 1);
    assert_eq!(reports[0].mops[0].tid, worker.tid());
    assert_eq!(reports[0].mops[0].addr, 0x300b);
}

#[test]
fn test_reset_after_free_allows_reuse() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();

    detector.on_memory_range_freed(&mut main, 0x10, 0x3000, 8);
    detector.on_memory_range_reset(0x3000, 8);
    detector.on_memory_access(&mut main, 0x20, 0x3000, 8, true);
    assert!(sink.is_empty());
}

#[test]
fn test_release_after_write_is_too_late_for_early_acquire() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);
    let mut mutex = VectorClock::new();

    detector.on_release(&mut worker, &mut mutex);
    detector.on_acquire(&mut main, &mutex);
    detector.on_memory_access(&mut worker, 0x10, 0x1000, 8, true);
    detector.on_memory_access(&mut main, 0x20, 0x1000, 8, true);

    assert_eq!(sink.len(), 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Silent patterns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_concurrent_reads_do_not_race() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();
    let mut a = spawn(&detector, &mut main, 1);
    let mut b = spawn(&detector, &mut main, 2);

    detector.on_memory_access(&mut a, 0x10, 0x1000, 8, false);
    detector.on_memory_access(&mut b, 0x20, 0x1000, 8, false);
    detector.on_memory_access(&mut main, 0x30, 0x1000, 8, false);

    assert!(sink.is_empty());
}

#[test]
fn test_mutex_orders_accesses() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);
    let mut mutex = VectorClock::new();

    detector.on_acquire(&mut worker, &mutex);
    detector.on_memory_access(&mut worker, 0x10, 0x1000, 8, true);
    detector.on_release(&mut worker, &mut mutex);

    detector.on_acquire(&mut main, &mutex);
    detector.on_memory_access(&mut main, 0x20, 0x1000, 8, true);
    detector.on_release(&mut main, &mut mutex);

    assert!(sink.is_empty());
}

#[test]
fn test_fork_and_join_order_accesses() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();

    detector.on_memory_access(&mut main, 0x10, 0x1000, 8, true);
    let tid = detector.on_thread_create(&mut main, 1, false);
    let mut worker = detector.on_thread_start(tid);
    detector.on_memory_access(&mut worker, 0x20, 0x1000, 8, true);
    detector.on_thread_finish(worker);

    detector.on_thread_join(&mut main, tid);
    detector.on_memory_access(&mut main, 0x30, 0x1000, 8, false);

    assert!(sink.is_empty());
    assert_eq!(detector.finalize(main).exit_code, 0);
}

#[test]
fn test_disjoint_bytes_of_one_block_do_not_race() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);

    detector.on_memory_access(&mut worker, 0x10, 0x2000, 1, true);
    detector.on_memory_access(&mut main, 0x20, 0x2001, 1, true);
    detector.on_memory_access(&mut main, 0x30, 0x2004, 4, true);

    assert!(sink.is_empty());
}

#[test]
fn test_ignored_accesses_are_not_recorded() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);

    detector.on_ignore_begin(&mut worker, true);
    detector.on_memory_access(&mut worker, 0x10, 0x1000, 8, true);
    detector.on_ignore_end(&mut worker, true);
    detector.on_memory_access(&mut main, 0x20, 0x1000, 8, true);

    assert!(sink.is_empty());
    assert_eq!(worker.stats().ignored, 1);
    assert_eq!(worker.stats().writes, 0);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Report collaborators
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_symbolized_report_stacks() {
    let sink = CollectingSink::new();
    let mut symbols = TableSymbolizer::new();
    symbols.insert(0x200, "update_counter", "counter.rs", 17);
    let detector = DetectorBuilder::new()
        .symbolizer(symbols)
        .sink(sink.clone())
        .build()
        .unwrap();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);

    detector.on_function_enter(&mut worker, 0x100);
    detector.on_function_enter(&mut worker, 0x200);
    detector.on_memory_access(&mut worker, 0x210, 0x1000, 4, true);
    detector.on_function_exit(&mut worker);
    detector.on_function_exit(&mut worker);

    detector.on_function_enter(&mut main, 0x300);
    detector.on_memory_access(&mut main, 0x310, 0x1000, 4, true);

    let report = &sink.reports()[0];
    let old = &report.mops[0].stack;
    assert_eq!(old.pcs(), vec![0x100, 0x200, 0x210]);
    assert!(!old.truncated);
    assert_eq!(old.frames[1].symbol.as_ref().unwrap().function, "update_counter");
    assert!(old.frames[0].symbol.is_none());
    assert_eq!(report.mops[1].stack.pcs(), vec![0x300, 0x310]);
}

#[test]
fn test_report_stack_limit_keeps_innermost_frames() {
    let sink = CollectingSink::new();
    let config = DetectorConfig {
        report_stack_limit: 2,
        ..DetectorConfig::default()
    };
    let detector = DetectorBuilder::new().config(config).sink(sink.clone()).build().unwrap();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);

    for pc in [0x100, 0x200, 0x300] {
        detector.on_function_enter(&mut worker, pc);
    }
    detector.on_memory_access(&mut worker, 0x310, 0x1000, 8, true);
    detector.on_memory_access(&mut main, 0x20, 0x1000, 8, true);

    let stack = &sink.reports()[0].mops[0].stack;
    assert_eq!(stack.pcs(), vec![0x300, 0x310]);
    assert!(stack.truncated);
}

#[test]
fn test_suppressed_race_reaches_no_sink() {
    let sink = CollectingSink::new();
    let detector = DetectorBuilder::new()
        .suppressor(PcSuppressions::new([0x100]))
        .sink(sink.clone())
        .build()
        .unwrap();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);

    detector.on_function_enter(&mut worker, 0x100);
    detector.on_memory_access(&mut worker, 0x110, 0x1000, 8, true);
    detector.on_memory_access(&mut main, 0x20, 0x1000, 8, true);
    detector.on_memory_access(&mut worker, 0x120, 0x2000, 8, true);
    detector.on_memory_access(&mut main, 0x30, 0x2000, 8, true);

    assert_eq!(detector.suppressed(), 2);
    assert!(sink.is_empty());
}

#[test]
fn test_benign_race_is_silent() {
    let (detector, sink) = detector();
    let mut main = detector.initialize();
    let mut worker = spawn(&detector, &mut main, 1);
    detector.benign_race(0x1000, 8, "progress flag");

    detector.on_memory_access(&mut worker, 0x10, 0x1004, 4, true);
    detector.on_memory_access(&mut main, 0x20, 0x1004, 4, false);

    assert!(sink.is_empty());
    detector.on_thread_finish(worker);
    let summary = detector.finalize(main);
    assert_eq!(summary.expected_hits, 1);
    assert_eq!(summary.missed_expected, 0);
    assert_eq!(summary.exit_code, 0);
}

#[test]
fn test_fixed_range_backend_detects_races() {
    let sink = CollectingSink::new();
    let detector = DetectorBuilder::new()
        .shadow(FlatShadow::new(0x10_0000, 0x1000))
        .sink(sink.clone())
        .build()
        .unwrap();
    let mut main = detector.initialize();
    let tid = detector.on_thread_create(&mut main, 1, false);
    let mut worker = detector.on_thread_start(tid);

    detector.on_memory_access(&mut worker, 0x10, 0x10_0ff8, 8, true);
    detector.on_memory_access(&mut main, 0x20, 0x10_0ffc, 4, false);

    assert_eq!(sink.len(), 1);
}
