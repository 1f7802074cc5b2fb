//! Scheduler suspension

/// Prevents other threads from being scheduled while interrupts keep running.
///
/// This is weaker than disabling interrupts: data shared with an interrupt
/// handler is NOT protected by it.
pub trait SchedulerLock: Sync {
    /// Suspend scheduling. Returns an opaque token for [`resume`](Self::resume).
    fn suspend(&self) -> u32;

    /// Restore the scheduling state captured by the matching `suspend`.
    fn resume(&self, token: u32);
}
