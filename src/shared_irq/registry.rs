use core::ptr::NonNull;

use log::{debug, info, trace, warn};

use super::{
    entry::{EntryPoint, EntryPool, SlotAnchor},
    interface::{Dispatch, LineController},
    record::{HandlerRecord, RecordPool, RecordPoolUsage, RetiredList},
    slot::Slot,
    IrqLine, IsrArg, IsrFlags, IsrHandler, Result, SharedIrqError,
};
use crate::{
    exception::asynchronous::IRQContext,
    synchronization::{interface::Mutex, IRQSafeLock},
};

struct RegistryInner<const N: usize> {
    controller: &'static (dyn LineController + Sync),

    // line served by each slot, `None` while the slot is free
    lines: [Option<IrqLine>; N],

    // records unlinked while a dispatch was walking their slot
    retired: [RetiredList; N],
}

/// Fixed table of `N` shared lines.
///
/// `install` and `remove` run in normal context and serialize on one lock. Dispatch runs in
/// interrupt context, takes no lock and never blocks.
pub struct SharedIrqRegistry<const N: usize> {
    inner: IRQSafeLock<RegistryInner<N>>,
    slots: [Slot; N],
    entries: EntryPool<N>,
    pool: IRQSafeLock<RecordPool>,
}

impl<const N: usize> RegistryInner<N> {
    const fn new(controller: &'static (dyn LineController + Sync)) -> Self {
        Self {
            controller,
            lines: [None; N],
            retired: [RetiredList::new(); N],
        }
    }

    fn slot_of(&self, line: IrqLine) -> Option<usize> {
        self.lines.iter().position(|x| *x == Some(line))
    }

    fn free_slot(&self) -> Option<usize> {
        self.lines.iter().position(|x| x.is_none())
    }

    fn bound_slots(&self) -> usize {
        self.lines.iter().filter(|x| x.is_some()).count()
    }
}

impl<const N: usize> SharedIrqRegistry<N> {
    /// Create a registry whose entry points dispatch through `A`.
    ///
    /// `A::dispatcher()` must return this very registry, which in practice means the registry
    /// is a `static` and `A` is a type private to it.
    pub const fn new<A: SlotAnchor>(controller: &'static (dyn LineController + Sync)) -> Self {
        const FREE: Slot = Slot::new();

        Self {
            inner: IRQSafeLock::new(RegistryInner::new(controller)),
            slots: [FREE; N],
            entries: EntryPool::new::<A>(),
            pool: IRQSafeLock::new(RecordPool::new()),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Hand the registry the memory its handler records are carved from.
    pub fn init_record_pool(&self, region: &'static mut [u8]) {
        self.pool.lock(|pool| {
            if pool.is_initialized() {
                warn!("shared IRQ record pool already initialized!");
                return;
            }

            // safety: the region is exclusively and permanently ours
            unsafe { pool.init(region.as_mut_ptr(), region.len()) };
        });
    }

    /// Switch to another line controller. Only possible while no slot is bound.
    pub fn set_line_controller(&self, controller: &'static (dyn LineController + Sync)) -> core::result::Result<(), &'static str> {
        self.inner.lock(|inner| {
            if inner.bound_slots() != 0 {
                return Err("shared IRQ slots still bound to the current line controller");
            }

            inner.controller = controller;

            Ok(())
        })
    }

    /// Register `handler(arg)` on `line`.
    ///
    /// The first handler on a line claims a free slot and binds its entry point; later ones
    /// join the slot's chain unless either side asked for [`IsrFlags::NONSHARED`].
    ///
    /// A controller with [`native_sharing`](LineController::native_sharing) takes the
    /// registration itself; a refusal is reported as [`SharedIrqError::Bind`].
    pub fn install(&self, line: IrqLine, handler: IsrHandler, arg: IsrArg, flags: IsrFlags) -> Result<()> {
        let delegated = self.inner.lock(|inner| {
            let controller = inner.controller;

            controller.native_sharing().map(|native| {
                native.install_handler(line, handler, arg, flags.contains(IsrFlags::NONSHARED)).map_err(|x| {
                    warn!("{}: refused handler on line {}: {}", controller.compatible(), line, x);
                    SharedIrqError::Bind
                })
            })
        });

        if let Some(result) = delegated {
            return result;
        }

        let record = self.pool.lock(|pool| pool.alloc(HandlerRecord::new(handler, arg, flags)))?;

        let (result, reclaimed) = self.inner.lock(|inner| {
            let result = self.link(inner, line, record);

            (result, self.collect_quiescent(inner))
        });

        self.release(reclaimed);

        if result.is_err() {
            // safety: never linked, so no dispatch has seen it
            self.pool.lock(|pool| unsafe { pool.free(record) });
        }

        result.map(|_| ())
    }

    /// Unregister the first record on `line` matching `(handler, arg)`.
    ///
    /// Removing the last handler of a line unbinds the slot's entry point and frees the slot.
    pub fn remove(&self, line: IrqLine, handler: IsrHandler, arg: IsrArg) -> Result<()> {
        let delegated = self.inner.lock(|inner| {
            let controller = inner.controller;

            controller.native_sharing().map(|native| {
                native.remove_handler(line, handler, arg).map_err(|x| {
                    debug!("{}: no handler to remove on line {}: {}", controller.compatible(), line, x);
                    SharedIrqError::NotFound
                })
            })
        });

        if let Some(result) = delegated {
            return result;
        }

        let reclaimed = self.inner.lock(|inner| -> Result<RetiredList> {
            let slot = inner.slot_of(line).ok_or(SharedIrqError::NotFound)?;
            let chain = self.slots[slot].chain();

            // safety: lock held
            let record = unsafe { chain.unlink(handler, arg) }.ok_or(SharedIrqError::NotFound)?;

            if chain.is_empty() {
                if let Err(x) = inner.controller.unbind_line(line, self.entries.get(slot)) {
                    panic!("{}: failed to unbind line {} from shared IRQ slot {}: {}", inner.controller.compatible(), line, slot, x);
                }

                inner.lines[slot] = None;
                debug!("shared IRQ slot {} released line {}", slot, line);
            }

            if !self.slots[slot].is_quiescent() {
                debug!("shared IRQ slot {} busy, deferring release of removed handler", slot);
            }

            inner.retired[slot].push(record);

            Ok(self.collect_quiescent(inner))
        })?;

        self.release(reclaimed);

        Ok(())
    }

    /// Free removed records whose slot has gone quiet since their removal.
    pub fn reclaim(&self) {
        let reclaimed = self.inner.lock(|inner| self.collect_quiescent(inner));

        self.release(reclaimed);
    }

    /// Records removed but not yet freed.
    pub fn pending_reclaim(&self) -> usize {
        self.inner.lock(|inner| inner.retired.iter().map(RetiredList::len).sum())
    }

    /// Run the handlers of `line` as if its interrupt had fired.
    ///
    /// # safety
    /// - the caller stands in for the line controller's interrupt vector: the handlers run in
    ///   the caller's context and must tolerate that
    pub unsafe fn dispatch_line(&self, line: IrqLine) -> Result<()> {
        let slot = self.inner.lock(|inner| inner.slot_of(line)).ok_or(SharedIrqError::NotFound)?;

        (self.entries.get(slot))();

        Ok(())
    }

    pub fn bound_slots(&self) -> usize {
        self.inner.lock(|inner| inner.bound_slots())
    }

    pub fn free_slots(&self) -> usize {
        N - self.bound_slots()
    }

    /// Number of handlers registered on `line`.
    pub fn handler_count(&self, line: IrqLine) -> usize {
        self.inner.lock(|inner| match inner.slot_of(line) {
            Some(slot) => self.slots[slot].chain().len(),
            None => 0,
        })
    }

    pub fn line_of_slot(&self, slot: usize) -> Option<IrqLine> {
        self.inner.lock(|inner| inner.lines.get(slot).copied().flatten())
    }

    pub fn entry_point(&self, slot: usize) -> Option<EntryPoint> {
        (slot < N).then(|| self.entries.get(slot))
    }

    pub fn record_pool_usage(&self) -> RecordPoolUsage {
        self.pool.lock(|pool| pool.usage())
    }

    pub fn print_handlers(&self) {
        info!("    Shared IRQ slots ({} of {} bound):", self.bound_slots(), N);

        self.inner.lock(|inner| {
            for (slot, line) in inner.lines.iter().enumerate() {
                if let Some(line) = line {
                    info!("        {: >2}. line {: >3}", slot, line);

                    for record in self.slots[slot].chain().iter() {
                        let kind = if record.is_exclusive() { "exclusive" } else { "shared" };
                        info!("              handler {:p} arg {:p} ({})", record.handler() as *const (), record.arg().as_ptr(), kind);
                    }
                }
            }
        });
    }

    fn link(&self, inner: &mut RegistryInner<N>, line: IrqLine, record: NonNull<HandlerRecord>) -> Result<usize> {
        // safety: the record is still exclusively ours
        let exclusive = unsafe { record.as_ref() }.is_exclusive();

        if let Some(slot) = inner.slot_of(line) {
            let chain = self.slots[slot].chain();

            if exclusive || chain.iter().any(HandlerRecord::is_exclusive) {
                debug!("shared IRQ line {}: exclusive access requested or already held", line);
                return Err(SharedIrqError::Conflict);
            }

            // safety: lock held, record unlinked
            unsafe { chain.push_front(record) };

            return Ok(slot);
        }

        let slot = match inner.free_slot() {
            Some(slot) => slot,
            None => {
                warn!("no free shared IRQ slot for line {} ({} in use)", line, N);
                return Err(SharedIrqError::Capacity);
            }
        };

        if let Err(x) = inner.controller.bind_line(line, self.entries.get(slot)) {
            warn!("{}: refused to bind line {}: {}", inner.controller.compatible(), line, x);
            return Err(SharedIrqError::Bind);
        }

        inner.lines[slot] = Some(line);

        // the entry point may already fire here; it just finds an empty chain

        // safety: lock held, record unlinked
        unsafe { self.slots[slot].chain().push_front(record) };

        debug!("shared IRQ slot {} bound to line {}", slot, line);

        Ok(slot)
    }

    fn collect_quiescent(&self, inner: &mut RegistryInner<N>) -> RetiredList {
        let mut reclaimed = RetiredList::new();

        for (slot, retired) in self.slots.iter().zip(inner.retired.iter_mut()) {
            if !retired.is_empty() && slot.is_quiescent() {
                reclaimed.append(&mut retired.take());
            }
        }

        reclaimed
    }

    fn release(&self, mut records: RetiredList) {
        if records.is_empty() {
            return;
        }

        self.pool.lock(|pool| {
            while let Some(record) = records.pop() {
                // safety: unlinked, and its slot was seen quiescent after the unlink
                unsafe { pool.free(record) };
            }
        });
    }
}

impl<const N: usize> Dispatch for SharedIrqRegistry<N> {
    fn dispatch<'irq_context>(&'irq_context self, slot: usize, _ic: &IRQContext<'irq_context>) {
        let Some(state) = self.slots.get(slot) else {
            return;
        };

        state.enter();

        let mut invoked = 0usize;
        for record in state.chain().iter() {
            record.invoke();
            invoked += 1;
        }

        state.leave();

        if cfg!(feature = "debug_prints") {
            trace!("shared IRQ slot {}: {} handler(s) invoked", slot, invoked);
        }
    }
}
