//! Test doubles: a line controller that remembers its bindings and can fire them, plus probes
//! that let handlers report back through their argument.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{
    interface::{LineController, SharedLineController},
    EntryPoint, IrqLine, IsrArg, IsrHandler,
};

const MOCK_LINES: usize = 32;

pub struct MockController {
    bindings: spin::Mutex<[Option<EntryPoint>; MOCK_LINES]>,
    refuse_unbind: AtomicBool,
}

impl MockController {
    pub const fn new() -> Self {
        Self {
            bindings: spin::Mutex::new([None; MOCK_LINES]),
            refuse_unbind: AtomicBool::new(false),
        }
    }

    /// Raise `line`: call whatever entry point is bound to it.
    pub fn fire(&self, line: IrqLine) -> bool {
        match self.entry_of(line) {
            Some(entry) => {
                entry();
                true
            }
            None => false,
        }
    }

    pub fn entry_of(&self, line: IrqLine) -> Option<EntryPoint> {
        self.bindings.lock().get(line as usize).copied().flatten()
    }

    pub fn is_bound(&self, line: IrqLine) -> bool {
        self.entry_of(line).is_some()
    }

    pub fn bound_lines(&self) -> usize {
        self.bindings.lock().iter().filter(|x| x.is_some()).count()
    }

    pub fn refuse_unbind(&self) {
        self.refuse_unbind.store(true, Ordering::SeqCst);
    }
}

impl LineController for MockController {
    fn compatible(&self) -> &'static str {
        "mock line controller"
    }

    fn bind_line(&self, line: IrqLine, entry: EntryPoint) -> Result<(), &'static str> {
        let mut bindings = self.bindings.lock();
        let binding = bindings.get_mut(line as usize).ok_or("no such line")?;

        if binding.is_some() {
            return Err("line already bound");
        }

        *binding = Some(entry);

        Ok(())
    }

    fn unbind_line(&self, line: IrqLine, entry: EntryPoint) -> Result<(), &'static str> {
        if self.refuse_unbind.load(Ordering::SeqCst) {
            return Err("unbind refused");
        }

        let mut bindings = self.bindings.lock();
        let binding = bindings.get_mut(line as usize).ok_or("no such line")?;

        if binding.map(|bound| bound as *const ()) != Some(entry as *const ()) {
            return Err("line not bound to this entry point");
        }

        *binding = None;

        Ok(())
    }
}

/// Controller that keeps its own handler chains and hands each handler its argument.
pub struct NativeSharingController {
    handlers: spin::Mutex<std::vec::Vec<(IrqLine, IsrHandler, IsrArg, bool)>>,
}

impl NativeSharingController {
    pub const fn new() -> Self {
        Self {
            handlers: spin::Mutex::new(std::vec::Vec::new()),
        }
    }

    pub fn fire(&self, line: IrqLine) {
        let handlers: std::vec::Vec<_> = self.handlers.lock().iter().filter(|x| x.0 == line).map(|x| (x.1, x.2)).collect();

        for (handler, arg) in handlers {
            handler(arg);
        }
    }

    pub fn handler_count(&self, line: IrqLine) -> usize {
        self.handlers.lock().iter().filter(|x| x.0 == line).count()
    }
}

impl LineController for NativeSharingController {
    fn compatible(&self) -> &'static str {
        "native sharing controller"
    }

    fn bind_line(&self, _line: IrqLine, _entry: EntryPoint) -> Result<(), &'static str> {
        Err("entry points are never bound here")
    }

    fn unbind_line(&self, _line: IrqLine, _entry: EntryPoint) -> Result<(), &'static str> {
        Err("entry points are never bound here")
    }

    fn native_sharing(&self) -> Option<&dyn SharedLineController> {
        Some(self)
    }
}

impl SharedLineController for NativeSharingController {
    fn install_handler(&self, line: IrqLine, handler: IsrHandler, arg: IsrArg, exclusive: bool) -> Result<(), &'static str> {
        let mut handlers = self.handlers.lock();

        if handlers.iter().any(|x| x.0 == line && (exclusive || x.3)) {
            return Err("line held exclusively");
        }

        handlers.push((line, handler, arg, exclusive));

        Ok(())
    }

    fn remove_handler(&self, line: IrqLine, handler: IsrHandler, arg: IsrArg) -> Result<(), &'static str> {
        let mut handlers = self.handlers.lock();
        let index = handlers
            .iter()
            .position(|x| x.0 == line && x.1 as *const () == handler as *const () && x.2 == arg)
            .ok_or("no such handler")?;

        handlers.remove(index);

        Ok(())
    }
}

/// Ordered record of handler invocations.
pub struct CallLog(spin::Mutex<std::vec::Vec<usize>>);

impl CallLog {
    pub const fn new() -> Self {
        Self(spin::Mutex::new(std::vec::Vec::new()))
    }

    pub fn calls(&self) -> std::vec::Vec<usize> {
        self.0.lock().clone()
    }
}

/// Handler argument that appends `tag` to `log` when dispatched through [`record_call`].
pub struct Probe {
    log: &'static CallLog,
    tag: usize,
}

impl Probe {
    pub const fn new(log: &'static CallLog, tag: usize) -> Self {
        Self { log, tag }
    }
}

pub fn record_call(arg: IsrArg) {
    let probe = unsafe { &*(arg.as_ptr() as *const Probe) };

    probe.log.0.lock().push(probe.tag);
}

/// Handler whose argument points at an `AtomicUsize` hit counter.
pub fn bump(arg: IsrArg) {
    let hits = unsafe { &*(arg.as_ptr() as *const AtomicUsize) };

    hits.fetch_add(1, Ordering::SeqCst);
}

/// Word-aligned, leaked memory for a record pool.
pub fn leak_region(size: usize) -> &'static mut [u8] {
    let words = std::boxed::Box::leak(std::vec![0u64; (size + 7) / 8].into_boxed_slice());
    let len = words.len() * 8;

    unsafe { core::slice::from_raw_parts_mut(words.as_mut_ptr() as *mut u8, len) }
}

/// A private `static` registry of the given slot count, bound to its own [`MockController`].
macro_rules! registry_fixture {
    ($slots:expr) => {
        registry_fixture!($slots, 4096)
    };
    ($slots:expr, $pool_bytes:expr) => {{
        struct Anchor;

        static CONTROLLER: $crate::shared_irq::testing::MockController = $crate::shared_irq::testing::MockController::new();
        static REGISTRY: $crate::shared_irq::SharedIrqRegistry<{ $slots }> =
            $crate::shared_irq::SharedIrqRegistry::new::<Anchor>(&CONTROLLER);

        impl $crate::shared_irq::SlotAnchor for Anchor {
            fn dispatcher() -> &'static dyn $crate::shared_irq::interface::Dispatch {
                &REGISTRY
            }
        }

        REGISTRY.init_record_pool($crate::shared_irq::testing::leak_region($pool_bytes));

        (&REGISTRY, &CONTROLLER)
    }};
}

pub(crate) use registry_fixture;
