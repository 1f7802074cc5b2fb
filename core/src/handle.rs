//! Subscriber handle allocation
//!
//! A fixed-capacity bitset of small integer handles. Registries built on it
//! pre-consume handle 0 so that automatic allocation never yields it, while
//! `set` can still address slot 0 directly. Code that owns a well-known
//! subscriber (the console shell, say) installs it at handle 0 without
//! racing anyone for an allocation.

/// Identifier of one subscriber inside one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handle(u8);

impl Handle {
    /// Pre-consumed slot, reachable only through explicit `set`
    pub const RESERVED: Handle = Handle(0);

    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_reserved(self) -> bool {
        self.0 == 0
    }
}

impl core::fmt::Display for Handle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bitset of `C` handles, `C <= 64`
#[derive(Debug, Clone)]
pub struct HandleAllocator<const C: usize> {
    bits: u64,
}

impl<const C: usize> HandleAllocator<C> {
    const VALID: u64 = {
        assert!(C > 0 && C <= 64, "HandleAllocator capacity must be 1..=64");
        if C == 64 {
            u64::MAX
        } else {
            (1u64 << C) - 1
        }
    };

    /// Every handle free
    pub const fn new() -> Self {
        let _ = Self::VALID;
        Self { bits: 0 }
    }

    /// Handle 0 already taken
    pub const fn reserving_zero() -> Self {
        let _ = Self::VALID;
        Self { bits: 1 }
    }

    /// Take the lowest free handle.
    pub fn allocate(&mut self) -> Option<Handle> {
        let free = !self.bits & Self::VALID;
        if free == 0 {
            return None;
        }
        let idx = free.trailing_zeros() as u8;
        self.bits |= 1 << idx;
        Some(Handle(idx))
    }

    /// Mark `handle` in use. Returns false if out of range.
    pub fn claim(&mut self, handle: Handle) -> bool {
        if handle.index() >= C {
            return false;
        }
        self.bits |= 1 << handle.0;
        true
    }

    /// Give `handle` back. Returns whether it was allocated.
    pub fn release(&mut self, handle: Handle) -> bool {
        if !self.is_allocated(handle) {
            return false;
        }
        self.bits &= !(1 << handle.0);
        true
    }

    pub fn is_allocated(&self, handle: Handle) -> bool {
        handle.index() < C && self.bits & (1 << handle.0) != 0
    }

    /// Handles in use, reserved ones included
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub const fn capacity(&self) -> usize {
        C
    }

    /// Allocated handles in ascending order
    pub fn iter(&self) -> impl Iterator<Item = Handle> + '_ {
        (0..C as u8)
            .map(Handle)
            .filter(move |h| self.is_allocated(*h))
    }
}

impl<const C: usize> Default for HandleAllocator<C> {
    fn default() -> Self {
        Self::new()
    }
}
