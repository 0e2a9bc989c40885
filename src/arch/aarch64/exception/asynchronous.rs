use core::arch::asm;

use aarch64_cpu::registers::{Readable, Writeable, DAIF};

#[inline(always)]
fn local_irq_mask() {
    // DAIFSet bit 1 is the I flag
    unsafe {
        asm!("msr DAIFSet, #2", options(nomem, nostack, preserves_flags));
    }
}

#[inline(always)]
pub fn local_irq_mask_save() -> u64 {
    let saved = DAIF.get();
    local_irq_mask();
    saved
}

#[inline(always)]
pub fn local_irq_restore(saved: u64) {
    DAIF.set(saved);
}
