//! Kani Proofs for the Shadow Cell Codec
//!
//! The codec is pure bit arithmetic on a `u64`, so Kani explores every
//! field combination symbolically instead of sampling.

#[cfg(kani)]
mod kani_proofs {
    use super::super::cell::{ShadowCell, MAX_EPOCH};
    use crate::domain::thread::ThreadId;

    fn any_cell(max_tid: u16) -> (u16, u64, u8, u8, bool, ShadowCell) {
        let tid: u16 = kani::any();
        let epoch: u64 = kani::any();
        let offset: u8 = kani::any();
        let size_log: u8 = kani::any();
        let is_write: bool = kani::any();
        kani::assume(tid <= max_tid);
        kani::assume(epoch >= 1 && epoch <= MAX_EPOCH);
        kani::assume(offset < 8 && size_log < 4);
        let cell = ShadowCell::encode(ThreadId(tid), epoch, offset, size_log, is_write);
        (tid, epoch, offset, size_log, is_write, cell)
    }

    /// Every field decodes to the value it was encoded with
    #[kani::proof]
    fn proof_encode_decode() {
        let (tid, epoch, offset, size_log, is_write, cell) = any_cell(u16::MAX);
        let fields = cell.decode();
        kani::assert(fields.tid == ThreadId(tid), "tid survives packing");
        kani::assert(fields.epoch == epoch, "epoch survives packing");
        kani::assert(fields.offset == offset, "offset survives packing");
        kani::assert(fields.size_log == size_log, "size_log survives packing");
        kani::assert(fields.is_write == is_write, "write bit survives packing");
        kani::assert(!cell.is_empty(), "a genuine access is never empty");
    }

    /// No thread below the reserved tid can produce the freed marker
    #[kani::proof]
    fn proof_freed_is_unreachable() {
        let (_, _, _, _, _, cell) = any_cell(u16::MAX - 1);
        kani::assert(!cell.is_freed(), "freed marker is reserved");
    }

    /// Masked comparisons agree with field comparisons
    #[kani::proof]
    fn proof_masked_comparisons() {
        let (tid_a, _, off_a, log_a, _, a) = any_cell(u16::MAX);
        let (tid_b, _, off_b, log_b, _, b) = any_cell(u16::MAX);
        kani::assert(ShadowCell::tids_equal(a, b) == (tid_a == tid_b), "tid mask");
        kani::assert(
            ShadowCell::same_range(a, b) == (off_a == off_b && log_a == log_b),
            "range mask",
        );
    }

    /// Interval overlap matches the byte-level definition
    #[kani::proof]
    fn proof_ranges_intersect() {
        let (_, _, off_a, log_a, _, a) = any_cell(u16::MAX);
        let (_, _, off_b, log_b, _, b) = any_cell(u16::MAX);
        let (a_lo, a_hi) = (off_a as usize, off_a as usize + (1 << log_a));
        let (b_lo, b_hi) = (off_b as usize, off_b as usize + (1 << log_b));
        let overlap = a_lo < b_hi && b_lo < a_hi;
        kani::assert(
            ShadowCell::ranges_intersect(a, b, 1 << log_b) == overlap,
            "overlap test is exact",
        );
    }
}
