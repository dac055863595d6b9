//! Thread Lifecycle Tests
//!
//! Creation, start, finish, join, detach and tid reuse as seen through the
//! detector, including the fatal contract violations.

use krepis_race::adapters::CollectingSink;
use krepis_race::domain::detector::DetectorBuilder;
use krepis_race::{DetectorConfig, ProductionDetector, ThreadStatus};

fn detector_with(config: DetectorConfig) -> (ProductionDetector, CollectingSink) {
    let sink = CollectingSink::new();
    let detector = DetectorBuilder::new().config(config).sink(sink.clone()).build().unwrap();
    (detector, sink)
}

fn detector() -> (ProductionDetector, CollectingSink) {
    detector_with(DetectorConfig::default())
}

mod transitions {
    use super::*;

    #[test]
    fn test_joined_thread_goes_dead() {
        let (detector, _) = detector();
        let mut main = detector.initialize();
        assert_eq!(detector.thread_status(main.tid()), Some(ThreadStatus::Running));

        let tid = detector.on_thread_create(&mut main, 7, false);
        assert_eq!(detector.thread_status(tid), Some(ThreadStatus::Created));
        let worker = detector.on_thread_start(tid);
        assert_eq!(detector.thread_status(tid), Some(ThreadStatus::Running));
        detector.on_thread_finish(worker);
        assert_eq!(detector.thread_status(tid), Some(ThreadStatus::Finished));
        detector.on_thread_join(&mut main, tid);
        assert_eq!(detector.thread_status(tid), Some(ThreadStatus::Dead));
    }

    #[test]
    fn test_detached_thread_dies_on_finish() {
        let (detector, _) = detector();
        let mut main = detector.initialize();
        let tid = detector.on_thread_create(&mut main, 1, false);
        let worker = detector.on_thread_start(tid);
        detector.on_thread_detach(tid);
        assert_eq!(detector.thread_status(tid), Some(ThreadStatus::Running));
        detector.on_thread_finish(worker);
        assert_eq!(detector.thread_status(tid), Some(ThreadStatus::Dead));
    }

    #[test]
    fn test_detach_after_finish_reclaims() {
        let (detector, _) = detector();
        let mut main = detector.initialize();
        let tid = detector.on_thread_create(&mut main, 1, false);
        let worker = detector.on_thread_start(tid);
        detector.on_thread_finish(worker);
        detector.on_thread_detach(tid);
        assert_eq!(detector.thread_status(tid), Some(ThreadStatus::Dead));
    }

    #[test]
    fn test_created_detached_thread() {
        let (detector, _) = detector();
        let mut main = detector.initialize();
        let tid = detector.on_thread_create(&mut main, 1, true);
        let worker = detector.on_thread_start(tid);
        detector.on_thread_finish(worker);
        assert_eq!(detector.thread_status(tid), Some(ThreadStatus::Dead));
    }

    #[test]
    fn test_unknown_tid_has_no_status() {
        let (detector, _) = detector();
        let _main = detector.initialize();
        assert_eq!(detector.thread_status(krepis_race::ThreadId::new(9)), None);
    }

    #[test]
    fn test_finished_stats_are_merged() {
        let (detector, _) = detector();
        let mut main = detector.initialize();
        let tid = detector.on_thread_create(&mut main, 1, false);
        let mut worker = detector.on_thread_start(tid);
        detector.on_memory_access(&mut worker, 0x10, 0x1000, 4, false);
        detector.on_memory_access(&mut worker, 0x10, 0x1008, 2, true);
        detector.on_thread_finish(worker);
        detector.on_thread_join(&mut main, tid);

        let stats = detector.stats();
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.by_size, [0, 1, 1, 0]);

        detector.on_memory_access(&mut main, 0x20, 0x1000, 8, true);
        let summary = detector.finalize(main);
        assert_eq!(summary.stats.accesses(), 3);
        assert_eq!(summary.stats.acquires, 3);
    }
}

mod reuse {
    use super::*;

    #[test]
    fn test_tid_reused_after_quarantine() {
        let (detector, _) = detector_with(DetectorConfig {
            thread_quarantine: 1,
            ..DetectorConfig::default()
        });
        let mut main = detector.initialize();

        let mut tids = Vec::new();
        for uid in 1..=3 {
            let tid = detector.on_thread_create(&mut main, uid, false);
            let worker = detector.on_thread_start(tid);
            detector.on_thread_finish(worker);
            detector.on_thread_join(&mut main, tid);
            tids.push(tid);
        }
        // one dead tid stays quarantined; the third creation reuses the first
        assert_ne!(tids[0], tids[1]);
        assert_eq!(tids[2], tids[0]);
    }

    #[test]
    fn test_stale_tid_is_not_attributed_to_new_incarnation() {
        let (detector, sink) = detector_with(DetectorConfig {
            thread_quarantine: 0,
            ..DetectorConfig::default()
        });
        let mut main = detector.initialize();

        let tid = detector.on_thread_create(&mut main, 1, true);
        let mut old = detector.on_thread_start(tid);
        detector.on_memory_access(&mut old, 0x10, 0x1000, 8, true);
        detector.on_thread_finish(old);

        let reused = detector.on_thread_create(&mut main, 2, false);
        assert_eq!(reused, tid);
        let _new = detector.on_thread_start(reused);

        detector.on_memory_access(&mut main, 0x20, 0x1000, 8, true);
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.mops[0].tid, tid);
        assert!(report.mops[0].stack.is_empty());
        assert!(report.mops[0].stack.truncated);
        assert!(report.thread(tid).is_none());
        assert!(report.thread(main.tid()).is_some());
    }

    #[test]
    fn test_reused_tid_reports_reuse_count_and_name() {
        let (detector, sink) = detector_with(DetectorConfig {
            thread_quarantine: 0,
            ..DetectorConfig::default()
        });
        let mut main = detector.initialize();

        let first = detector.on_thread_create(&mut main, 1, true);
        let worker = detector.on_thread_start(first);
        detector.on_thread_finish(worker);

        detector.on_function_enter(&mut main, 0x500);
        let tid = detector.on_thread_create(&mut main, 2, false);
        detector.on_function_exit(&mut main);
        detector.set_thread_name(tid, "io-worker");
        let mut worker = detector.on_thread_start(tid);

        detector.on_memory_access(&mut worker, 0x10, 0x1000, 8, true);
        detector.on_memory_access(&mut main, 0x20, 0x1000, 8, true);

        let report = &sink.reports()[0];
        let thread = report.thread(tid).unwrap();
        assert_eq!(thread.reuse_count, 1);
        assert_eq!(thread.uid, 2);
        assert_eq!(thread.name.as_deref(), Some("io-worker"));
        assert_eq!(thread.creation_stack.pcs(), vec![0x500]);
    }

    #[test]
    #[should_panic(expected = "thread limit of 2 exceeded")]
    fn test_thread_limit_is_fatal() {
        let (detector, _) = detector_with(DetectorConfig {
            max_threads: 2,
            ..DetectorConfig::default()
        });
        let mut main = detector.initialize();
        let _a = detector.on_thread_create(&mut main, 1, false);
        let _b = detector.on_thread_create(&mut main, 2, false);
    }
}

mod contract_violations {
    use super::*;

    #[test]
    #[should_panic(expected = "invalid transition")]
    fn test_double_join_is_fatal() {
        let (detector, _) = detector();
        let mut main = detector.initialize();
        let tid = detector.on_thread_create(&mut main, 1, false);
        let worker = detector.on_thread_start(tid);
        detector.on_thread_finish(worker);
        detector.on_thread_join(&mut main, tid);
        detector.on_thread_join(&mut main, tid);
    }

    #[test]
    #[should_panic(expected = "invalid transition")]
    fn test_join_of_running_thread_is_fatal() {
        let (detector, _) = detector();
        let mut main = detector.initialize();
        let tid = detector.on_thread_create(&mut main, 1, false);
        let _worker = detector.on_thread_start(tid);
        detector.on_thread_join(&mut main, tid);
    }

    #[test]
    #[should_panic(expected = "shadow stack underflow")]
    fn test_unbalanced_function_exit_is_fatal() {
        let (detector, _) = detector();
        let mut main = detector.initialize();
        detector.on_function_exit(&mut main);
    }

    #[test]
    #[should_panic(expected = "shadow stack overflow")]
    fn test_shadow_stack_depth_is_enforced() {
        let (detector, _) = detector_with(DetectorConfig {
            shadow_stack_depth: 4,
            ..DetectorConfig::default()
        });
        let mut main = detector.initialize();
        for pc in 1..=5 {
            detector.on_function_enter(&mut main, pc);
        }
    }

    #[test]
    #[should_panic(expected = "unbalanced ignore end")]
    fn test_unbalanced_ignore_end_is_fatal() {
        let (detector, _) = detector();
        let mut main = detector.initialize();
        detector.on_ignore_begin(&mut main, false);
        detector.on_ignore_end(&mut main, true);
    }
}
