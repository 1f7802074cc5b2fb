//! Execution context query

/// Reports whether the caller is executing inside an interrupt handler.
pub trait ExecutionContext: Sync {
    fn in_interrupt(&self) -> bool;
}
