use crate::error::RegistryError;
use crate::handle::{Handle, HandleAllocator};

/// Handle-indexed subscriber table with a reserved slot 0.
///
/// Entries are `Copy` (a `&'static` sink plus flags), so a full snapshot is
/// a plain array copy and can be iterated with no lock held.
pub(crate) struct Registry<E: Copy, const C: usize> {
    ids: HandleAllocator<C>,
    slots: [Option<E>; C],
}

impl<E: Copy, const C: usize> Registry<E, C> {
    pub(crate) const fn new() -> Self {
        Self {
            ids: HandleAllocator::reserving_zero(),
            slots: [None; C],
        }
    }

    pub(crate) fn add(&mut self, entry: E) -> Result<Handle, RegistryError> {
        let handle = self.ids.allocate().ok_or(RegistryError::Full)?;
        self.slots[handle.index()] = Some(entry);
        Ok(handle)
    }

    /// Upsert at `handle`. Handle 0 always succeeds; any other handle must
    /// have been issued by `add`.
    pub(crate) fn set(&mut self, handle: Handle, entry: E) -> Result<(), RegistryError> {
        if !handle.is_reserved() && !self.ids.is_allocated(handle) {
            return Err(RegistryError::UnknownHandle);
        }
        self.slots[handle.index()] = Some(entry);
        Ok(())
    }

    /// Clear the slot. Handle 0 stays reserved in the allocator.
    pub(crate) fn remove(&mut self, handle: Handle) -> Result<(), RegistryError> {
        if handle.is_reserved() {
            self.slots[0] = None;
            return Ok(());
        }
        if !self.ids.release(handle) {
            return Err(RegistryError::UnknownHandle);
        }
        self.slots[handle.index()] = None;
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> [Option<E>; C] {
        self.slots
    }

    /// Occupied slots
    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
