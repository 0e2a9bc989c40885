#[cfg(target_arch = "aarch64")]
#[path = "../arch/aarch64/exception/asynchronous.rs"]
mod arch_asynchronous;

#[cfg(not(target_arch = "aarch64"))]
#[path = "../arch/hosted/exception/asynchronous.rs"]
mod arch_asynchronous;

use core::marker::PhantomData;

pub use arch_asynchronous::*;

/// Proof that the current core is executing an interrupt handler.
#[derive(Clone, Copy)]
pub struct IRQContext<'irq_context> {
    _0: PhantomData<&'irq_context ()>,
}

impl<'irq_context> IRQContext<'irq_context> {
    /// # safety
    /// - this must only be called when the current core is in an interrupt context and will not
    ///   live beyond the end of it. entry points handed to a line controller qualify, since the
    ///   controller only ever calls them from its interrupt vector.
    /// - note that the lifetime `'irq_context` of the returned instance is unconstrained. user
    ///   code must not be able to influence the lifetime picked for this type, since that might
    ///   cause it to be inferred to `'static`.
    #[inline(always)]
    pub unsafe fn new() -> Self {
        IRQContext {
            _0: PhantomData,
        }
    }
}

#[inline(always)]
pub fn exec_with_irq_masked<T>(f: impl FnOnce() -> T) -> T {
    let saved = local_irq_mask_save();
    let ret = f();
    local_irq_restore(saved);

    ret
}
