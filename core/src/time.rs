//! Wait bounds and runtime tick scaling
//!
//! Blocking calls take a [`Timeout`] expressed in logical milliseconds. The
//! conversion to kernel time goes through a global scaling factor so that
//! "wait 10 ms" stays 10 ms when the core clock (and with it the tick rate)
//! is changed at runtime. Code that cannot re-evaluate an in-progress wait
//! registers a listener and reacts to changes itself.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use embassy_time::Duration;
use heapless::Vec;

use crate::config::MAX_SCALING_LISTENERS;
use crate::error::TimeError;

/// Scaling factor of 1.0, in per-mille
pub const UNITY_SCALE: u32 = 1000;

static SCALE_PER_MILLE: AtomicU32 = AtomicU32::new(UNITY_SCALE);

static LISTENERS: Mutex<RefCell<Vec<fn(), MAX_SCALING_LISTENERS>>> =
    Mutex::new(RefCell::new(Vec::new()));

/// Upper bound on a blocking wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Fail immediately instead of waiting
    NoWait,
    /// Wait until the operation can complete
    Forever,
    /// Wait at most this many logical milliseconds
    Millis(u32),
}

impl Timeout {
    /// Kernel wait duration after scaling; `None` means wait forever.
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::NoWait => Some(Duration::from_ticks(0)),
            Self::Forever => None,
            Self::Millis(ms) => Some(Duration::from_millis(scale_millis(ms))),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        match d.as_millis() {
            0 => Self::NoWait,
            ms => Self::Millis(u32::try_from(ms).unwrap_or(u32::MAX)),
        }
    }
}

/// Apply the current scaling factor, rounding to the nearest millisecond.
pub fn scale_millis(ms: u32) -> u64 {
    let scale = u64::from(SCALE_PER_MILLE.load(Ordering::Acquire));
    (u64::from(ms) * scale + u64::from(UNITY_SCALE / 2)) / u64::from(UNITY_SCALE)
}

/// Current scaling factor in per-mille (1000 = 1.0)
pub fn scaling_factor() -> u32 {
    SCALE_PER_MILLE.load(Ordering::Acquire)
}

/// Change the scaling factor and notify every registered listener.
///
/// Listeners run on the caller's thread after the new factor is visible,
/// outside any critical section.
pub fn set_scaling_factor(per_mille: u32) {
    SCALE_PER_MILLE.store(per_mille, Ordering::Release);
    info!("time scaling factor set to {}/1000", per_mille);

    let listeners = critical_section::with(|cs| LISTENERS.borrow_ref(cs).clone());
    for listener in listeners.iter() {
        listener();
    }
}

/// Register a callback for scaling factor changes.
pub fn on_scaling_change(listener: fn()) -> Result<(), TimeError> {
    critical_section::with(|cs| LISTENERS.borrow_ref_mut(cs).push(listener)).map_err(|_| {
        warn!("scaling listener table full");
        TimeError::ListenerTableFull
    })
}
