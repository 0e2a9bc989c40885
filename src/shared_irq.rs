//! Shared interrupt lines on top of a controller that allows one argument-less handler per line.
//!
//! Every line in use occupies one slot of a [`SharedIrqRegistry`]. The slot's entry point is the
//! only thing the line controller ever sees; when it fires, the registry walks the slot's chain
//! and calls each registered handler with its own argument.

mod chain;
mod entry;
mod null_line_controller;
mod record;
mod registry;
mod slot;

#[cfg(test)]
mod testing;

use core::fmt;

use bitflags::bitflags;

pub use entry::{EntryPoint, SlotAnchor, MAX_SLOTS};
pub use record::RecordPoolUsage;
pub use registry::SharedIrqRegistry;

/// Physical interrupt line number as understood by the line controller.
pub type IrqLine = u32;

/// Handler invoked for every interrupt on its line.
pub type IsrHandler = fn(IsrArg);

/// Slot count of the process-wide registry.
pub const NUM_SLOTS: usize = if cfg!(feature = "wide_slot_table") { MAX_SLOTS } else { 7 };

pub type Result<T> = core::result::Result<T, SharedIrqError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedIrqError {
    /// record storage exhausted or not initialized
    Allocation,
    /// every slot is bound to some other line
    Capacity,
    /// exclusive access requested or already held
    Conflict,
    /// the line controller refused the line
    Bind,
    /// no matching registration
    NotFound,
}

bitflags! {
    pub struct IsrFlags: u32 {
        /// refuse to share the line with any other handler
        const NONSHARED = 0b0000_0001;
    }
}

/// Opaque, caller-owned handler argument. Never dereferenced by the registry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IsrArg(*mut ());

// the registry only stores and compares the pointer, never follows it
unsafe impl Send for IsrArg {}
unsafe impl Sync for IsrArg {}

pub mod interface {
    use super::{EntryPoint, IrqLine, IsrArg, IsrHandler};
    use crate::exception::asynchronous::IRQContext;

    /// The one-handler-per-line capability of the underlying interrupt controller.
    pub trait LineController {
        fn compatible(&self) -> &'static str;

        /// Install `entry` as the sole handler of `line`.
        fn bind_line(&self, line: IrqLine, entry: EntryPoint) -> Result<(), &'static str>;

        /// Reverse a previous `bind_line` of the same pair.
        fn unbind_line(&self, line: IrqLine, entry: EntryPoint) -> Result<(), &'static str>;

        /// Controllers that chain handlers and pass arguments themselves return `Some`; the
        /// registry then hands every registration straight to them and uses no slot.
        fn native_sharing(&self) -> Option<&dyn SharedLineController> {
            None
        }
    }

    pub trait SharedLineController {
        /// Add `handler(arg)` to `line`. `exclusive` asks for the line to stay unshared.
        fn install_handler(&self, line: IrqLine, handler: IsrHandler, arg: IsrArg, exclusive: bool) -> Result<(), &'static str>;

        fn remove_handler(&self, line: IrqLine, handler: IsrHandler, arg: IsrArg) -> Result<(), &'static str>;
    }

    pub trait Dispatch {
        /// Run every handler chained on `slot`.
        fn dispatch<'irq_context>(&'irq_context self, slot: usize, ic: &IRQContext<'irq_context>);
    }
}

struct GlobalAnchor;

static SHARED_IRQ_REGISTRY: SharedIrqRegistry<NUM_SLOTS> =
    SharedIrqRegistry::new::<GlobalAnchor>(&null_line_controller::NULL_LINE_CONTROLLER);

impl SlotAnchor for GlobalAnchor {
    fn dispatcher() -> &'static dyn interface::Dispatch {
        &SHARED_IRQ_REGISTRY
    }
}

impl fmt::Display for SharedIrqError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Allocation => write!(f, "handler record storage exhausted"),
            Self::Capacity => write!(f, "no free shared IRQ slot"),
            Self::Conflict => write!(f, "exclusive access to the line requested or already held"),
            Self::Bind => write!(f, "line controller rejected the line"),
            Self::NotFound => write!(f, "no such handler registered on the line"),
        }
    }
}

impl IsrArg {
    pub const fn null() -> Self {
        Self(core::ptr::null_mut())
    }

    pub const fn new(ptr: *mut ()) -> Self {
        Self(ptr)
    }

    pub fn from_ref<T>(value: &'static T) -> Self {
        Self(value as *const T as *mut ())
    }

    /// Cookie-style argument for drivers that index their own instance table.
    pub fn from_usize(value: usize) -> Self {
        Self(value as *mut ())
    }

    pub const fn as_ptr(&self) -> *mut () {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// The process-wide registry.
pub fn shared_irq() -> &'static SharedIrqRegistry<NUM_SLOTS> {
    &SHARED_IRQ_REGISTRY
}

/// Register `handler` with `arg` on `line` of the process-wide registry.
pub fn install_shared_isr(line: IrqLine, handler: IsrHandler, arg: IsrArg, flags: IsrFlags) -> Result<()> {
    SHARED_IRQ_REGISTRY.install(line, handler, arg, flags)
}

/// Undo a matching [`install_shared_isr`].
pub fn remove_shared_isr(line: IrqLine, handler: IsrHandler, arg: IsrArg) -> Result<()> {
    SHARED_IRQ_REGISTRY.remove(line, handler, arg)
}
