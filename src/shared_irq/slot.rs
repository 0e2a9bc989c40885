use core::sync::atomic::{fence, AtomicUsize, Ordering};

use super::chain::HandlerChain;

/// The dispatch-visible half of a slot: its chain and the dispatches currently walking it.
///
/// The line a slot serves lives with the rest of the lock-protected registry state.
pub(crate) struct Slot {
    chain: HandlerChain,
    in_flight: AtomicUsize,
}

impl Slot {
    pub const fn new() -> Self {
        Self {
            chain: HandlerChain::new(),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    /// Announce a dispatch before reading the chain.
    pub fn enter(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);
    }

    pub fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::Release);
    }

    /// No dispatch is walking the chain right now.
    ///
    /// Observed after an unlink, this means no dispatch can still reach the unlinked record.
    pub fn is_quiescent(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0
    }
}
