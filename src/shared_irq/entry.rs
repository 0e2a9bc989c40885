use super::interface::Dispatch;
use crate::exception::asynchronous::IRQContext;

/// Argument-less function handed to the line controller.
pub type EntryPoint = fn();

/// Size of the trampoline pool, and so the largest slot table a registry can have.
pub const MAX_SLOTS: usize = 16;

/// Ties a family of trampolines to the registry they dispatch into.
///
/// Trampolines cannot carry data, so the registry is found through a type instead: each
/// `static` registry gets its own zero-sized anchor type returning it.
pub trait SlotAnchor: 'static {
    fn dispatcher() -> &'static dyn Dispatch;
}

fn trampoline<A: SlotAnchor, const SLOT: usize>() {
    // safety: entry points are only ever invoked by the line controller from its interrupt vector
    let ic = unsafe { IRQContext::new() };

    A::dispatcher().dispatch(SLOT, &ic);
}

fn unanchored() {}

macro_rules! trampoline_pool {
    ($anchor:ty, $slot:expr, $($n:literal)*) => {
        match $slot {
            $($n => Some(trampoline::<$anchor, $n> as EntryPoint),)*
            _ => None,
        }
    };
}

const fn entry_point<A: SlotAnchor>(slot: usize) -> Option<EntryPoint> {
    trampoline_pool!(A, slot, 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15)
}

/// The `N` trampolines of one registry, `entries[i]` dispatching slot `i`.
pub(crate) struct EntryPool<const N: usize> {
    entries: [EntryPoint; N],
}

impl<const N: usize> EntryPool<N> {
    pub const fn new<A: SlotAnchor>() -> Self {
        assert!(N <= MAX_SLOTS, "slot table larger than the trampoline pool");

        let mut entries = [unanchored as EntryPoint; N];
        let mut slot = 0;

        while slot < N {
            entries[slot] = match entry_point::<A>(slot) {
                Some(entry) => entry,
                None => panic!("slot without trampoline"),
            };
            slot += 1;
        }

        Self { entries }
    }

    pub fn get(&self, slot: usize) -> EntryPoint {
        self.entries[slot]
    }
}
