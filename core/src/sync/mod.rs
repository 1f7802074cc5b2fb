//! Synchronization primitives shared by threads and interrupt handlers

mod channel;
pub mod guard;
mod semaphore;

pub use channel::{Channel, Latest};
pub use guard::{install_scheduler_lock, InterruptGuard, SchedulerCell, SchedulerGuard};
pub use semaphore::Semaphore;
