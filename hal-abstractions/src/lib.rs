//! Hardware abstraction traits for the serial console firmware
//!
//! This crate defines the traits the platform-agnostic core consumes from a
//! board. BSPs implement these traits; the core never touches registers.
//!
//! - [`SerialHw`]: one physical serial channel, as seen from its interrupt
//! - [`SchedulerLock`]: suspend thread scheduling without masking interrupts
//! - [`ExecutionContext`]: "am I running inside an interrupt?"

#![no_std]
#![deny(unsafe_code)]

pub mod context;
pub mod sched;
pub mod serial;

pub use context::ExecutionContext;
pub use sched::SchedulerLock;
pub use serial::SerialHw;
