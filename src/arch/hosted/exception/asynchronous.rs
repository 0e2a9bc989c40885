//! Hosted builds (unit tests, simulators) have no local interrupt mask, so
//! saving and restoring it is a no-op.

#[inline(always)]
pub fn local_irq_mask_save() -> u64 {
    0
}

#[inline(always)]
pub fn local_irq_restore(_saved: u64) {}
