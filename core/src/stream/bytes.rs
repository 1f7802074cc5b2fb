use core::sync::atomic::{AtomicU8, Ordering};

use crate::config::MAX_SUBSCRIBERS;
use crate::error::RegistryError;
use crate::handle::Handle;
use crate::stream::registry::Registry;
use crate::sync::SchedulerCell;

/// Consumer of raw received byte chunks.
///
/// Called on the port's worker thread, never from an interrupt. Chunk
/// boundaries carry no meaning.
pub trait ByteSink: Sync {
    fn on_bytes(&self, chunk: &[u8]);
}

impl<F> ByteSink for F
where
    F: Fn(&[u8]) + Sync,
{
    fn on_bytes(&self, chunk: &[u8]) {
        self(chunk)
    }
}

/// Fan-out of byte chunks to dynamically registered sinks.
///
/// Every pass iterates a snapshot of the registry, so a sink may add or
/// remove subscribers (itself included) while being called; the change
/// applies from the next pass on.
pub struct ByteDistributor<const C: usize = MAX_SUBSCRIBERS> {
    registry: SchedulerCell<Registry<&'static dyn ByteSink, C>>,
    // Mirror of the registry size for the interrupt handler, which must not
    // touch the registry itself.
    count: AtomicU8,
}

impl<const C: usize> ByteDistributor<C> {
    pub const fn new() -> Self {
        Self {
            registry: SchedulerCell::new(Registry::new()),
            count: AtomicU8::new(0),
        }
    }

    pub fn add(&self, sink: &'static dyn ByteSink) -> Result<Handle, RegistryError> {
        self.mutate(|reg| reg.add(sink)).inspect_err(|_| {
            warn!("byte subscriber registry full");
        })
    }

    pub fn set(&self, handle: Handle, sink: &'static dyn ByteSink) -> Result<(), RegistryError> {
        self.mutate(|reg| reg.set(handle, sink))
    }

    pub fn remove(&self, handle: Handle) -> Result<(), RegistryError> {
        self.mutate(|reg| reg.remove(handle))
    }

    /// Hand `chunk` to every sink registered when the pass started.
    pub fn distribute(&self, chunk: &[u8]) {
        let snapshot = self.registry.lock(|reg| reg.snapshot());
        for sink in snapshot.iter().flatten() {
            sink.on_bytes(chunk);
        }
    }

    /// Registered sinks. Lock-free, safe from an interrupt handler.
    pub fn callback_count(&self) -> usize {
        usize::from(self.count.load(Ordering::Acquire))
    }

    /// Sinks `add` can register at most
    pub const fn capacity(&self) -> usize {
        C - 1
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Registry<&'static dyn ByteSink, C>) -> R) -> R {
        self.registry.lock(|reg| {
            let out = f(reg);
            self.count
                .store(u8::try_from(reg.len()).unwrap_or(u8::MAX), Ordering::Release);
            out
        })
    }
}

impl<const C: usize> Default for ByteDistributor<C> {
    fn default() -> Self {
        Self::new()
    }
}
