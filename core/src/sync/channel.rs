//! Bounded FIFO channel with thread and interrupt entry points
//!
//! Storage is inline (`N` slots of `T`), no allocation per element. Thread
//! paths are `async` and may suspend for up to a [`Timeout`]; interrupt paths
//! return immediately. Waking a task parked on the other end from an
//! interrupt pends that task's dispatcher, so it runs as soon as the
//! interrupt returns.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel;
use embassy_time::with_timeout;

use crate::error::ChannelError;
use crate::time::Timeout;

/// Fixed-capacity FIFO queue shared between contexts.
///
/// At most `N` items are resident; `get` yields items in the order their
/// `put` succeeded. No partial item is ever delivered.
pub struct Channel<T, const N: usize> {
    inner: channel::Channel<CriticalSectionRawMutex, T, N>,
}

impl<T, const N: usize> Channel<T, N> {
    pub const fn new() -> Self {
        Self {
            inner: channel::Channel::new(),
        }
    }

    /// Enqueue `value`, suspending while the channel is full.
    ///
    /// On timeout the value is dropped and nothing is enqueued.
    pub async fn put(&self, value: T, timeout: Timeout) -> Result<(), ChannelError> {
        match timeout.duration() {
            None => {
                self.inner.send(value).await;
                Ok(())
            }
            Some(d) if d.as_ticks() == 0 => self.try_put(value),
            Some(d) => with_timeout(d, self.inner.send(value))
                .await
                .map_err(|_| ChannelError::Timeout),
        }
    }

    /// Enqueue without waiting. Valid in any context.
    pub fn try_put(&self, value: T) -> Result<(), ChannelError> {
        self.inner.try_send(value).map_err(|_| ChannelError::Full)
    }

    /// Interrupt path of [`put`](Self::put): fails at once when full.
    pub fn put_from_interrupt(&self, value: T) -> Result<(), ChannelError> {
        self.try_put(value)
    }

    /// Dequeue the oldest item, suspending while the channel is empty.
    pub async fn get(&self, timeout: Timeout) -> Result<T, ChannelError> {
        match timeout.duration() {
            None => Ok(self.inner.receive().await),
            Some(d) if d.as_ticks() == 0 => self.try_get(),
            Some(d) => with_timeout(d, self.inner.receive())
                .await
                .map_err(|_| ChannelError::Timeout),
        }
    }

    /// Dequeue without waiting. Valid in any context.
    pub fn try_get(&self) -> Result<T, ChannelError> {
        self.inner.try_receive().map_err(|_| ChannelError::Empty)
    }

    /// Interrupt path of [`get`](Self::get): fails at once when empty.
    pub fn get_from_interrupt(&self) -> Result<T, ChannelError> {
        self.try_get()
    }

    /// Items currently queued. Same answer from any context.
    pub fn count(&self) -> u16 {
        u16::try_from(self.inner.len()).unwrap_or(u16::MAX)
    }

    /// Slots still available.
    pub fn free(&self) -> usize {
        self.inner.free_capacity()
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Discard everything queued.
    pub fn flush(&self) {
        self.inner.clear();
    }
}

impl<T: Copy, const N: usize> Channel<T, N> {
    /// Enqueue each value in order, each bounded by `timeout`.
    ///
    /// Stops at the first failure so later values never overtake a dropped
    /// one. Returns how many were enqueued.
    pub async fn put_many(&self, values: &[T], timeout: Timeout) -> Result<usize, ChannelError> {
        for (sent, value) in values.iter().enumerate() {
            if let Err(e) = self.put(*value, timeout).await {
                return if sent == 0 { Err(e) } else { Ok(sent) };
            }
        }
        Ok(values.len())
    }

    /// Interrupt path of [`put_many`](Self::put_many). Returns how many
    /// values fit.
    pub fn put_many_from_interrupt(&self, values: &[T]) -> usize {
        values
            .iter()
            .take_while(|v| self.put_from_interrupt(**v).is_ok())
            .count()
    }
}

impl<T> Channel<T, 1> {
    /// Replace the single slot unconditionally (last write wins). Never
    /// suspends, valid in any context.
    pub fn overwrite(&self, value: T) {
        critical_section::with(|_| {
            self.inner.clear();
            // Cannot fail: the slot was just emptied inside the same
            // critical section.
            let _ = self.inner.try_send(value);
        });
    }
}

impl<T, const N: usize> Default for Channel<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single value that writers replace and readers sample without blocking.
///
/// Writers overwrite the one-slot channel. Readers take the freshest value
/// if one arrived since the last read, otherwise they get the value they
/// last saw.
pub struct Latest<T> {
    slot: Channel<T, 1>,
    last: Mutex<CriticalSectionRawMutex, RefCell<T>>,
}

impl<T: Clone> Latest<T> {
    pub const fn new(initial: T) -> Self {
        Self {
            slot: Channel::new(),
            last: Mutex::new(RefCell::new(initial)),
        }
    }

    pub fn put(&self, value: T) {
        self.slot.overwrite(value);
    }

    pub fn get(&self) -> T {
        self.last.lock(|last| {
            if let Ok(fresh) = self.slot.try_get() {
                last.replace(fresh);
            }
            last.borrow().clone()
        })
    }
}
