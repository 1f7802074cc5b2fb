//! Deferred work
//!
//! The core does not run a work queue of its own. The platform installs one
//! (jobs run later on a low-priority thread) and the core uses it to cancel
//! jobs queued under a label.

use core::cell::Cell;

use critical_section::Mutex;

/// Queue of labelled jobs executed later on a low-priority thread
pub trait WorkQueue: Sync {
    /// Returns false when the queue is full.
    fn queue(&self, label: &'static str, job: &'static (dyn Fn() + Sync)) -> bool;

    /// Drop every pending job queued under `label`. Returns how many.
    fn cancel_by_label(&self, label: &str) -> u32;
}

static QUEUE: Mutex<Cell<Option<&'static dyn WorkQueue>>> = Mutex::new(Cell::new(None));

/// Install the platform work queue. Call once during init.
pub fn install(queue: &'static dyn WorkQueue) {
    critical_section::with(|cs| QUEUE.borrow(cs).set(Some(queue)));
}

fn installed() -> Option<&'static dyn WorkQueue> {
    critical_section::with(|cs| QUEUE.borrow(cs).get())
}

/// Queue `job` under `label`. False when no queue is installed or it is full.
pub fn queue(label: &'static str, job: &'static (dyn Fn() + Sync)) -> bool {
    installed().is_some_and(|q| q.queue(label, job))
}

/// Cancel pending jobs labelled `label`; 0 when no queue is installed.
pub fn cancel_by_label(label: &str) -> u32 {
    let cancelled = installed().map_or(0, |q| q.cancel_by_label(label));
    if cancelled > 0 {
        debug!("cancelled {} deferred jobs", cancelled);
    }
    cancelled
}


#[cfg(test)]
mod tests {
    use super::*;

    fn noop() {}

    #[test]
    fn test_cancel_by_label_counts_matching_jobs() {
        mock::install();
        assert!(queue("work-test-a", &noop));
        assert!(queue("work-test-a", &noop));
        assert!(queue("work-test-b", &noop));
        assert_eq!(cancel_by_label("work-test-a"), 2);
        assert_eq!(cancel_by_label("work-test-a"), 0);
        assert_eq!(cancel_by_label("work-test-b"), 1);
    }
}
