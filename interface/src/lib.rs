//! Trap-and-emulate interface layer: lets driver code written for bare-metal register access
//! run in userspace, transparently redirecting loads and stores against registered address
//! windows to an out-of-process device model, and delivering model-originated interrupts back
//! as callbacks.
//!
//! See [`init`], [`register_device`], [`register_interrupt_handler`](interrupt::register_interrupt_handler),
//! [`unregister_device`], and [`cleanup`] for the library's public surface.

pub mod channel;
pub mod config;
pub mod decoder;
pub mod error;
mod fault;
pub mod interrupt;
mod lifecycle;
pub mod protector;
pub mod registry;
mod state;
pub mod wire;

pub use config::Config;
pub use lifecycle::{cleanup, init, init_default, register_device, unregister_device};
