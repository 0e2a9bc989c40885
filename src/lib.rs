#![cfg_attr(not(test), no_std)]

//! Shared interrupt lines for the Starlight kernel.
//!
//! Some interrupt controllers accept exactly one handler per line and call it without an
//! argument. This crate sits in between: drivers register any number of `(handler, argument)`
//! pairs per line, and the controller only ever sees one trampoline per line in use.
//!
//! ```ignore
//! shared_irq().set_line_controller(&GIC_LINES)?;
//! shared_irq().init_record_pool(record_region);
//!
//! install_shared_isr(57, uart_isr, IsrArg::from_ref(&UART0), IsrFlags::empty())?;
//! install_shared_isr(57, uart_isr, IsrArg::from_ref(&UART1), IsrFlags::empty())?;
//! ```

pub mod exception;
pub mod shared_irq;
pub mod synchronization;

pub use shared_irq::{
    install_shared_isr, remove_shared_isr, shared_irq, EntryPoint, IrqLine, IsrArg, IsrFlags, IsrHandler,
    SharedIrqError, SharedIrqRegistry, SlotAnchor, MAX_SLOTS, NUM_SLOTS,
};
