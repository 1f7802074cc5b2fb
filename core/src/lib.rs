//! Platform-agnostic serial console pipeline
//!
//! This crate turns raw serial interrupts into byte streams and then into
//! text lines delivered to independently registered consumers. It has NO
//! hardware dependencies; boards plug in through the `hal-abstractions`
//! traits.
//!
//! # Data flow
//!
//! ```text
//! inbound:  UART IRQ ─► receive buffer ─► Semaphore ─► worker task
//!                       ─► ByteDistributor ─► LineAssembler ─► line subscribers
//! outbound: caller ─► redirect::current() ─► Channel ─► UART IRQ ─► TX register
//! ```
//!
//! # Contexts
//!
//! Operations that behave differently in interrupt and thread context come in
//! pairs: an `async` thread path that may suspend (bounded by a [`Timeout`])
//! and a `*_from_interrupt` path that never does. Callers always know which
//! context they run in and pick the matching entry point.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod config;
pub mod context;
pub mod error;
pub mod handle;
pub mod port;
pub mod redirect;
pub mod stream;
pub mod sync;
pub mod time;
pub mod work;

pub use error::{ChannelError, RegistryError, SendError, TimeError};
pub use handle::{Handle, HandleAllocator};
pub use port::{Console, PortId, PortStats, PortWriter, SerialPort};
pub use redirect::{OutputStack, Redirect};
pub use stream::{ByteDistributor, ByteSink, LineAssembler, LineSink};
pub use sync::{Channel, InterruptGuard, Latest, SchedulerCell, SchedulerGuard, Semaphore};
pub use time::Timeout;
pub use work::WorkQueue;

/// Serializes tests that touch process-wide state (output redirection, the
/// context override, installed hooks).
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
