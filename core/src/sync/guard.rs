//! Critical-section guards
//!
//! Two distinct guards, never interchangeable:
//!
//! - [`InterruptGuard`] masks every interrupt. It is the only protection
//!   valid for data shared with an interrupt handler. Hold it briefly.
//! - [`SchedulerGuard`] stops other threads from being scheduled while
//!   interrupts keep firing. It is enough for thread-only data such as the
//!   subscriber registries, and insufficient for anything an ISR touches.
//!
//! The platform provides the scheduler lock through
//! [`install_scheduler_lock`]. Until one is installed (and always on the
//! host) a `SchedulerGuard` escalates to an `InterruptGuard`, which is
//! strictly stronger.

// Raw critical-section acquire/release and the `Sync` impl of
// `SchedulerCell` need unsafe; everything else in the crate stays safe.
#![allow(unsafe_code)]

use core::cell::{Cell, RefCell};
use core::marker::PhantomData;

use critical_section::{CriticalSection, Mutex, RestoreState};
use hal_abstractions::SchedulerLock;

static SCHEDULER_LOCK: Mutex<Cell<Option<&'static dyn SchedulerLock>>> =
    Mutex::new(Cell::new(None));

/// Install the platform's scheduler lock. Call once during init.
pub fn install_scheduler_lock(lock: &'static dyn SchedulerLock) {
    critical_section::with(|cs| SCHEDULER_LOCK.borrow(cs).set(Some(lock)));
}

/// Interrupts are masked for as long as this value lives.
///
/// Guards must be dropped in reverse order of creation.
pub struct InterruptGuard {
    restore: RestoreState,
    // Restoring must happen on the context that acquired.
    _not_send: PhantomData<*mut ()>,
}

impl InterruptGuard {
    pub fn new() -> Self {
        // SAFETY: paired with the `release` in `Drop`; the guard is !Send so
        // the release runs on the acquiring context.
        let restore = unsafe { critical_section::acquire() };
        Self {
            restore,
            _not_send: PhantomData,
        }
    }

    /// Token for `critical_section::Mutex` borrows made under this guard.
    pub fn token(&self) -> CriticalSection<'_> {
        // SAFETY: the critical section is held until `self` is dropped, and
        // the token cannot outlive `self`.
        unsafe { CriticalSection::new() }
    }
}

impl Default for InterruptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        // SAFETY: `restore` came from the matching `acquire` in `new`.
        unsafe { critical_section::release(self.restore) }
    }
}

enum Held {
    Scheduler(&'static dyn SchedulerLock, u32),
    // Held for its Drop only.
    Interrupts(#[allow(dead_code)] InterruptGuard),
}

/// Other threads are not scheduled for as long as this value lives.
pub struct SchedulerGuard {
    held: Held,
    _not_send: PhantomData<*mut ()>,
}

impl SchedulerGuard {
    pub fn new() -> Self {
        let lock = critical_section::with(|cs| SCHEDULER_LOCK.borrow(cs).get());
        let held = match lock {
            Some(lock) => Held::Scheduler(lock, lock.suspend()),
            None => Held::Interrupts(InterruptGuard::new()),
        };
        Self {
            held,
            _not_send: PhantomData,
        }
    }
}

impl Default for SchedulerGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SchedulerGuard {
    fn drop(&mut self) {
        if let Held::Scheduler(lock, token) = &self.held {
            lock.resume(*token);
        }
        // `Held::Interrupts` releases through the inner guard's own Drop.
    }
}

/// Thread-only shared state, protected by a [`SchedulerGuard`].
///
/// Never access a `SchedulerCell` from an interrupt handler: the guard does
/// not mask interrupts once a platform scheduler lock is installed.
pub struct SchedulerCell<T> {
    inner: RefCell<T>,
}

// SAFETY: every access goes through `lock`, which holds a `SchedulerGuard`
// (scheduler suspended, or interrupts masked before a lock is installed), so
// no two threads can hold a borrow at the same time. Interrupt handlers are
// excluded by contract.
unsafe impl<T: Send> Sync for SchedulerCell<T> {}

impl<T> SchedulerCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    /// Run `f` with exclusive access. `f` must not call back into code that
    /// locks the same cell.
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _guard = SchedulerGuard::new();
        f(&mut self.inner.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_interrupt_guard_token_borrows_mutex() {
        static VALUE: Mutex<Cell<u32>> = Mutex::new(Cell::new(0));
        {
            let guard = InterruptGuard::new();
            VALUE.borrow(guard.token()).set(7);
        }
        assert_eq!(critical_section::with(|cs| VALUE.borrow(cs).get()), 7);
    }

    #[test]
    fn test_interrupt_guards_nest() {
        let outer = InterruptGuard::new();
        {
            let _inner = InterruptGuard::new();
        }
        drop(outer);
        // Still able to enter afterwards: nothing leaked.
        critical_section::with(|_| {});
    }

    #[test]
    fn test_scheduler_cell_without_installed_lock() {
        let cell = SchedulerCell::new(1u32);
        cell.lock(|v| *v += 1);
        assert_eq!(cell.lock(|v| *v), 2);
    }

    struct CountingLock {
        suspended: AtomicU32,
        resumed: AtomicU32,
    }

    impl SchedulerLock for CountingLock {
        fn suspend(&self) -> u32 {
            self.suspended.fetch_add(1, Ordering::SeqCst);
            42
        }

        fn resume(&self, token: u32) {
            assert_eq!(token, 42);
            self.resumed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_held_scheduler_lock_resumes_with_token() {
        // Driven directly rather than installed: an installed lock would
        // replace the host critical section for every other test.
        let lock: &'static CountingLock = Box::leak(Box::new(CountingLock {
            suspended: AtomicU32::new(0),
            resumed: AtomicU32::new(0),
        }));
        let token = lock.suspend();
        {
            let _guard = SchedulerGuard {
                held: Held::Scheduler(lock, token),
                _not_send: PhantomData,
            };
        }
        assert_eq!(lock.suspended.load(Ordering::SeqCst), 1);
        assert_eq!(lock.resumed.load(Ordering::SeqCst), 1);
    }
}
