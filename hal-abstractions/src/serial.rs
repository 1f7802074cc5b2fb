//! Serial peripheral abstraction
//!
//! Register-level access to a UART as needed by an interrupt handler that
//! drains an outbound queue and fills a receive buffer. All methods take
//! `&self`: the underlying registers are memory-mapped and shared between the
//! interrupt handler and the synchronous fallback write path.

/// One physical serial channel.
pub trait SerialHw: Sync {
    /// Transmit holding register can accept another byte.
    fn is_writable(&self) -> bool;

    /// Write one byte to the transmit register. Only valid after
    /// [`is_writable`](Self::is_writable) returned `true`.
    fn write_byte(&self, byte: u8);

    /// At least one received byte is waiting.
    fn is_readable(&self) -> bool;

    /// Read one received byte. Only valid after
    /// [`is_readable`](Self::is_readable) returned `true`.
    fn read_byte(&self) -> u8;

    /// Enable or disable the "ready for more" transmit interrupt.
    fn set_tx_interrupt(&self, enabled: bool);

    /// Enable or disable the "data available" receive interrupt.
    fn set_rx_interrupt(&self, enabled: bool);

    /// Busy-wait until the transmitter is free, then write `byte`.
    ///
    /// Used where queues cannot be used (interrupt context, fatal paths).
    fn write_blocking(&self, byte: u8) {
        while !self.is_writable() {
            core::hint::spin_loop();
        }
        self.write_byte(byte);
    }
}
