//! Eviction Policy
//!
//! When a scan finds neither an empty nor a superseded slot, one live cell
//! has to go. The choice only affects precision (which history is lost),
//! never soundness of the races that are reported.

use crate::domain::shadow::ShadowCell;
use crate::domain::types::SHADOW_CELLS;

/// Chooses the slot overwritten when a block's cells are all live
pub trait EvictionPolicy: Send + Sync + 'static {
    /// Slot index in `0..SHADOW_CELLS` for the access `cur`
    fn victim(cur: ShadowCell) -> usize;
}

/// Slot `epoch % SHADOW_CELLS` of the current access
///
/// Consecutive accesses of one thread rotate through the slots, which
/// behaves like a cheap pseudo-LRU for hot blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochModulo;

impl EvictionPolicy for EpochModulo {
    #[inline(always)]
    fn victim(cur: ShadowCell) -> usize {
        (cur.epoch() % SHADOW_CELLS as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::thread::ThreadId;

    #[test]
    fn test_epoch_modulo() {
        for epoch in 1..=9 {
            let cell = ShadowCell::encode(ThreadId::new(1), epoch, 0, 0, true);
            assert_eq!(EpochModulo::victim(cell), (epoch % 4) as usize);
        }
    }
}
