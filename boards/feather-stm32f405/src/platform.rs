//! Platform hooks for the console core
//!
//! RTIC runs every software task inside a dispatcher interrupt, so "thread"
//! means "running in a dispatcher" here and "interrupt" means any other
//! exception or IRQ. Suspending the scheduler means masking the dispatchers
//! through BASEPRI while the UART hardware tasks keep running.

// BASEPRI restore is an unsafe register write.
#![allow(unsafe_code)]

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::scb::VectActive;
use cortex_m::peripheral::SCB;
use cortex_m::register::{basepri, basepri_max};
use embassy_stm32::interrupt::Interrupt;
use embassy_stm32::NVIC_PRIO_BITS;
use hal_abstractions::{ExecutionContext, SchedulerLock};

/// Highest priority of any software task. Must match the app's tasks.
pub const THREAD_CEILING: u8 = 2;

/// Interrupts RTIC uses as software task dispatchers. Must match the app's
/// `dispatchers` list.
pub const DISPATCHERS: [Interrupt; 2] = [Interrupt::UART4, Interrupt::UART5];

/// Logical RTIC priority to the hardware BASEPRI encoding
const fn logical_to_hw(priority: u8) -> u8 {
    ((1 << NVIC_PRIO_BITS) - priority) << (8 - NVIC_PRIO_BITS)
}

/// Masks every software task dispatcher, never the UART interrupts.
pub struct BasepriLock {
    ceiling: u8,
}

impl BasepriLock {
    pub const fn new(ceiling: u8) -> Self {
        Self {
            ceiling: logical_to_hw(ceiling),
        }
    }
}

impl SchedulerLock for BasepriLock {
    fn suspend(&self) -> u32 {
        let previous = basepri::read();
        basepri_max::write(self.ceiling);
        u32::from(previous)
    }

    fn resume(&self, token: u32) {
        // SAFETY: restores the value read by the matching `suspend`, which
        // was itself a valid BASEPRI (tokens only come from `suspend`).
        unsafe { basepri::write(token as u8) }
    }
}

/// Active-vector based interrupt detection
pub struct VectorContext;

impl ExecutionContext for VectorContext {
    fn in_interrupt(&self) -> bool {
        match SCB::vect_active() {
            VectActive::ThreadMode => false,
            VectActive::Interrupt { irqn } => !DISPATCHERS
                .iter()
                .any(|d| d.number() == u16::from(irqn)),
            VectActive::Exception(_) => true,
        }
    }
}

static SCHEDULER_LOCK: BasepriLock = BasepriLock::new(THREAD_CEILING);
static CONTEXT: VectorContext = VectorContext;

/// Install the scheduler lock and context predicate into the core.
pub fn install() {
    console_core::sync::install_scheduler_lock(&SCHEDULER_LOCK);
    console_core::context::install(&CONTEXT);
}
