//! Partitioned Trace Ring
//!
//! # Layout
//!
//! ```text
//! events:  [ part 0 ........ | part 1 ........ | ... | part P-1 ...... ]
//! headers: [ hdr 0           | hdr 1           | ... | hdr P-1         ]
//!            epoch0, stack0
//! ```
//!
//! The event for epoch `e` lives in slot `e % size`. Whenever a thread
//! enters a part (`e % part_size == 0`), it first rewrites that part's header
//! with `e` and a snapshot of its current shadow stack. History older than
//! one full ring is lost part by part.
//!
//! # Concurrency
//!
//! Only the owning thread appends. Event slots are relaxed atomics so that a
//! reporting thread may replay a running thread's trace; a torn view at
//! worst yields a wrong or shorter stack. Headers are guarded by a mutex,
//! taken by the owner only once per part.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::event::{EventType, TraceEvent};
use crate::domain::error::ConfigError;
use crate::domain::types::{Epoch, Pc};

/// Ring size and partitioning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceGeometry {
    size: u64,
    part_size: u64,
}

impl TraceGeometry {
    /// `size` events split into `parts` equal segments
    ///
    /// # Errors
    ///
    /// Rejects a size that is zero or not a power of two, and a part count
    /// that is zero or does not divide the size.
    pub fn new(size: usize, parts: usize) -> Result<Self, ConfigError> {
        if size == 0 {
            return Err(ConfigError::Zero("trace_size"));
        }
        if !size.is_power_of_two() {
            return Err(ConfigError::TraceSizeNotPowerOfTwo(size));
        }
        if parts == 0 || parts > size || size % parts != 0 {
            return Err(ConfigError::TraceParts { size, parts });
        }
        Ok(Self {
            size: size as u64,
            part_size: (size / parts) as u64,
        })
    }

    /// Events in the whole ring
    pub fn size(&self) -> usize {
        self.size as usize
    }

    /// Events per segment
    pub fn part_size(&self) -> usize {
        self.part_size as usize
    }

    /// Number of segments
    pub fn parts(&self) -> usize {
        (self.size / self.part_size) as usize
    }

    #[inline(always)]
    fn slot(&self, epoch: Epoch) -> usize {
        (epoch % self.size) as usize
    }

    #[inline(always)]
    fn part(&self, epoch: Epoch) -> usize {
        self.slot(epoch) / self.part_size as usize
    }
}

/// Segment header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceHeader {
    /// First epoch recorded in the segment
    pub epoch0: Epoch,
    /// Shadow stack at `epoch0`, before that epoch's event took effect
    pub stack0: Vec<Pc>,
}

/// Call stack recovered from a trace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoredStack {
    /// Return pcs, outermost caller first, ending with the access pc
    pub frames: Vec<Pc>,
    /// Replay popped past the recorded snapshot
    pub truncated: bool,
}

/// Per-thread event history
pub struct Trace {
    geometry: TraceGeometry,
    events: Box<[AtomicU64]>,
    headers: Mutex<Vec<TraceHeader>>,
    /// Newest epoch the owner has reached
    latest: AtomicU64,
}

impl Trace {
    /// Fresh trace for a thread whose first epoch is `start_epoch`
    pub fn new(geometry: TraceGeometry, start_epoch: Epoch) -> Self {
        let events = (0..geometry.size()).map(|_| AtomicU64::new(0)).collect();
        let mut headers = vec![TraceHeader::default(); geometry.parts()];
        headers[geometry.part(start_epoch)].epoch0 = start_epoch;
        Self {
            geometry,
            events,
            headers: Mutex::new(headers),
            latest: AtomicU64::new(start_epoch),
        }
    }

    /// Ring geometry
    pub fn geometry(&self) -> TraceGeometry {
        self.geometry
    }

    /// Newest epoch recorded by the owner
    pub fn latest_epoch(&self) -> Epoch {
        self.latest.load(Ordering::Relaxed)
    }

    /// Record the event for `epoch`
    ///
    /// `stack` is the shadow stack as it was just before this event.
    #[inline(always)]
    pub fn append(&self, epoch: Epoch, event: TraceEvent, stack: &[Pc]) {
        if epoch % self.geometry.part_size == 0 {
            self.switch_part(epoch, stack);
        }
        self.events[self.geometry.slot(epoch)].store(event.raw(), Ordering::Relaxed);
        self.latest.store(epoch, Ordering::Relaxed);
    }

    #[cold]
    fn switch_part(&self, epoch: Epoch, stack: &[Pc]) {
        let mut headers = self.headers.lock();
        let hdr = &mut headers[self.geometry.part(epoch)];
        hdr.epoch0 = epoch;
        hdr.stack0.clear();
        hdr.stack0.extend_from_slice(stack);
    }

    /// Event recorded for `epoch`, if its slot still holds it
    pub fn event_at(&self, epoch: Epoch) -> TraceEvent {
        TraceEvent::from_raw(self.events[self.geometry.slot(epoch)].load(Ordering::Relaxed))
    }

    /// Reconstruct the call stack active at `epoch`
    ///
    /// Returns `None` when the segment holding `epoch` has been reused or was
    /// never written, and for epochs the owner has not reached yet.
    pub fn restore(&self, epoch: Epoch) -> Option<RestoredStack> {
        if epoch > self.latest_epoch() {
            return None;
        }
        let headers = self.headers.lock();
        let hdr = &headers[self.geometry.part(epoch)];
        if epoch < hdr.epoch0 || epoch - hdr.epoch0 >= self.geometry.part_size {
            return None;
        }

        let mut frames = hdr.stack0.clone();
        let mut leaf = None;
        let mut truncated = false;
        for e in hdr.epoch0..=epoch {
            let event = self.event_at(e);
            match event.kind() {
                Some(EventType::Mop) => leaf = Some(event.pc()),
                Some(EventType::FuncEnter) => {
                    frames.push(event.pc());
                    leaf = None;
                }
                Some(EventType::FuncExit) => {
                    if frames.pop().is_none() {
                        truncated = true;
                    }
                    leaf = None;
                }
                Some(EventType::Acquire | EventType::Release) | None => {}
            }
        }
        frames.extend(leaf);

        if frames.is_empty() && !truncated {
            return None;
        }
        Some(RestoredStack { frames, truncated })
    }
}

impl std::fmt::Debug for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trace")
            .field("geometry", &self.geometry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> TraceGeometry {
        TraceGeometry::new(64, 4).unwrap()
    }

    /// Minimal owner: keeps the shadow stack and appends like a thread does.
    struct Owner {
        trace: Trace,
        epoch: Epoch,
        stack: Vec<Pc>,
    }

    impl Owner {
        fn new(start: Epoch) -> Self {
            Self {
                trace: Trace::new(geometry(), start),
                epoch: start,
                stack: Vec::new(),
            }
        }

        fn tick(&mut self, kind: EventType, pc: Pc) -> Epoch {
            self.epoch += 1;
            self.trace.append(self.epoch, TraceEvent::new(kind, pc), &self.stack);
            self.epoch
        }

        fn enter(&mut self, pc: Pc) {
            self.tick(EventType::FuncEnter, pc);
            self.stack.push(pc);
        }

        fn exit(&mut self) {
            self.tick(EventType::FuncExit, 0);
            self.stack.pop();
        }
    }

    #[test]
    fn test_geometry_validation() {
        assert!(TraceGeometry::new(64, 4).is_ok());
        assert_eq!(
            TraceGeometry::new(48, 4),
            Err(ConfigError::TraceSizeNotPowerOfTwo(48))
        );
        assert_eq!(
            TraceGeometry::new(64, 3),
            Err(ConfigError::TraceParts { size: 64, parts: 3 })
        );
        assert_eq!(TraceGeometry::new(0, 1), Err(ConfigError::Zero("trace_size")));
        let g = geometry();
        assert_eq!((g.size(), g.parts(), g.part_size()), (64, 4, 16));
    }

    #[test]
    fn test_restore_nested_calls() {
        let mut owner = Owner::new(1);
        owner.enter(0x10);
        owner.enter(0x20);
        owner.enter(0x30);
        let epoch = owner.tick(EventType::Mop, 0x33);

        let stack = owner.trace.restore(epoch).unwrap();
        assert_eq!(stack.frames, vec![0x10, 0x20, 0x30, 0x33]);
        assert!(!stack.truncated);
    }

    #[test]
    fn test_restore_after_return() {
        let mut owner = Owner::new(1);
        owner.enter(0x10);
        owner.enter(0x20);
        owner.exit();
        let epoch = owner.tick(EventType::Mop, 0x11);

        let stack = owner.trace.restore(epoch).unwrap();
        assert_eq!(stack.frames, vec![0x10, 0x11]);
    }

    #[test]
    fn test_restore_uses_header_snapshot() {
        let mut owner = Owner::new(1);
        owner.enter(0xa);
        owner.enter(0xb);
        // Fill the rest of part 0 so the access lands in part 1.
        while owner.epoch < 20 {
            owner.tick(EventType::Mop, 0xbb);
        }
        owner.enter(0xc);
        let epoch = owner.tick(EventType::Mop, 0xcc);
        assert!(epoch >= 16);

        let stack = owner.trace.restore(epoch).unwrap();
        assert_eq!(stack.frames, vec![0xa, 0xb, 0xc, 0xcc]);
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut owner = Owner::new(1);
        owner.enter(0x10);
        let epoch = owner.tick(EventType::Mop, 0x12);
        owner.tick(EventType::Mop, 0x13);

        let first = owner.trace.restore(epoch);
        let second = owner.trace.restore(epoch);
        assert_eq!(first, second);
        assert_eq!(first.unwrap().frames, vec![0x10, 0x12]);
    }

    #[test]
    fn test_overwritten_segment_is_lost() {
        let mut owner = Owner::new(1);
        owner.enter(0x10);
        let early = owner.tick(EventType::Mop, 0x12);
        while owner.epoch < 64 + 20 {
            owner.tick(EventType::Mop, 0x14);
        }
        assert_eq!(owner.trace.restore(early), None);
    }

    #[test]
    fn test_epoch_before_thread_start_is_unknown() {
        let mut owner = Owner::new(40);
        owner.tick(EventType::Mop, 0x1);
        assert_eq!(owner.trace.restore(35), None);
    }

    #[test]
    fn test_epoch_not_reached_yet_is_unknown() {
        let mut owner = Owner::new(1);
        owner.enter(0x10);
        let now = owner.tick(EventType::Mop, 0xa1);
        assert_eq!(owner.trace.latest_epoch(), now);

        // same segment as `now`, so the header alone would still match
        assert_eq!(owner.trace.restore(now + 5), None);
        assert_eq!(owner.trace.restore(now).unwrap().frames, vec![0x10, 0xa1]);
    }

    #[test]
    fn test_exit_past_snapshot_marks_truncated() {
        let mut owner = Owner::new(1);
        // Part 1 starts with an empty snapshot, then the thread returns.
        while owner.epoch < 15 {
            owner.tick(EventType::Mop, 0x1);
        }
        owner.tick(EventType::FuncExit, 0);
        let epoch = owner.tick(EventType::Mop, 0x2);

        let stack = owner.trace.restore(epoch).unwrap();
        assert_eq!(stack.frames, vec![0x2]);
        assert!(stack.truncated);
    }
}
