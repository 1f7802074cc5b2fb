//! Counting semaphore usable from threads and interrupt handlers

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::WakerRegistration;
use embassy_time::with_timeout;

use crate::time::Timeout;

struct State {
    count: u32,
    max: u32,
    waker: WakerRegistration,
}

/// Counting semaphore with a ceiling.
///
/// `give` never raises the count past `max`; extra gives are absorbed. A
/// binary semaphore (`max == 1`) is the usual "work pending" signal between
/// an interrupt handler and its worker thread.
pub struct Semaphore {
    state: Mutex<CriticalSectionRawMutex, RefCell<State>>,
}

impl Semaphore {
    pub const fn new(initial: u32, max: u32) -> Self {
        let count = if initial > max { max } else { initial };
        Self {
            state: Mutex::new(RefCell::new(State {
                count,
                max,
                waker: WakerRegistration::new(),
            })),
        }
    }

    /// Decrement, waiting up to `timeout` for a unit. Returns whether a unit
    /// was taken.
    pub async fn take(&self, timeout: Timeout) -> bool {
        let wait = poll_fn(|cx| {
            self.state.lock(|s| {
                let mut s = s.borrow_mut();
                if s.count > 0 {
                    s.count -= 1;
                    Poll::Ready(())
                } else {
                    s.waker.register(cx.waker());
                    Poll::Pending
                }
            })
        });

        match timeout.duration() {
            None => {
                wait.await;
                true
            }
            Some(d) if d.as_ticks() == 0 => self.try_take(),
            Some(d) => with_timeout(d, wait).await.is_ok(),
        }
    }

    /// Decrement if a unit is available. Never waits.
    pub fn try_take(&self) -> bool {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if s.count > 0 {
                s.count -= 1;
                true
            } else {
                false
            }
        })
    }

    /// Interrupt path of [`take`](Self::take).
    pub fn take_from_interrupt(&self) -> bool {
        self.try_take()
    }

    /// Increment (saturating at `max`) and wake a waiter.
    pub fn give(&self) {
        self.give_from_interrupt();
    }

    /// Interrupt path of [`give`](Self::give). Returns true when a parked
    /// thread was woken and should run once the handler returns.
    pub fn give_from_interrupt(&self) -> bool {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if s.count < s.max {
                s.count += 1;
            }
            let woke = s.waker.occupied();
            s.waker.wake();
            woke
        })
    }

    /// Units currently available. Same answer from any context.
    pub fn count(&self) -> u32 {
        self.state.lock(|s| s.borrow().count)
    }
}
