//! Capacities and per-port configuration
//!
//! Capacities are compile-time: every buffer is statically sized and lives
//! for the lifetime of the firmware.

/// Outbound queue depth per port, in bytes
pub const OUTPUT_CHANNEL_CAPACITY: usize = 1000;

/// Receive buffer shared between a port's interrupt handler and worker
pub const RX_BUFFER_CAPACITY: usize = 1002;

/// Longest line delivered to line subscribers; longer input is truncated
pub const MAX_LINE_LENGTH: usize = 1000;

/// Longest a thread waits for outbound queue space in `send_bytes` and
/// `Console` output, before time scaling
pub const SEND_TIMEOUT_MS: u32 = 5_000;

/// Handles per subscriber registry (handle 0 included)
pub const MAX_SUBSCRIBERS: usize = 32;

/// Nested output redirections beyond the base entry
pub const REDIRECT_STACK_DEPTH: usize = 8;

/// Callbacks notified when the time scaling factor changes
pub const MAX_SCALING_LISTENERS: usize = 8;

/// Runtime settings for one serial port
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortConfig {
    /// Name used in logs and for deferred-work labels
    pub label: &'static str,
    /// Line rate in bits per second
    pub baud_rate: u32,
}

impl PortConfig {
    pub const fn new(label: &'static str, baud_rate: u32) -> Self {
        Self { label, baud_rate }
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self::new("uart", 76_800)
    }
}
