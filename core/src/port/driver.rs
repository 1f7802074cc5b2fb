use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use critical_section::Mutex;
use embassy_time::Instant;
use hal_abstractions::SerialHw;
use heapless::Vec;

use crate::config::{PortConfig, OUTPUT_CHANNEL_CAPACITY, RX_BUFFER_CAPACITY};
use crate::error::SendError;
use crate::port::writer::PortWriter;
use crate::port::PortId;
use crate::stream::{ByteDistributor, LineAssembler};
use crate::sync::{Channel, InterruptGuard, Semaphore};
use crate::time::Timeout;

/// Snapshot of one port's queues and subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortStats {
    /// Bytes waiting for the worker
    pub rx_queued: usize,
    /// Bytes dropped on a full receive buffer since boot
    pub rx_dropped: u32,
    /// Worker wakeups signalled by the interrupt handler since boot
    pub rx_signals: u32,
    /// Bytes waiting for the transmitter
    pub tx_queued: usize,
    /// Raw byte subscribers, the port's own line assembler excluded
    pub byte_subscribers: usize,
    pub line_subscribers: usize,
    /// Bytes of the partial line being assembled
    pub line_buffered: usize,
}

/// One physical serial channel: interrupt handler, worker, queues and
/// subscribers.
///
/// The interrupt handler drains `tx` into the hardware and fills `rx`. The
/// worker is woken through `rx_ready`, takes the received bytes and hands
/// them to the byte distributor, which feeds the line assembler.
pub struct SerialPort {
    id: PortId,
    config: PortConfig,
    hw: Mutex<Cell<Option<&'static dyn SerialHw>>>,
    started: AtomicBool,
    tx: Channel<u8, OUTPUT_CHANNEL_CAPACITY>,
    // Written only by the interrupt handler, taken only by the worker.
    rx: Mutex<RefCell<Vec<u8, RX_BUFFER_CAPACITY>>>,
    rx_ready: Semaphore,
    rx_dropped: AtomicU32,
    rx_dropped_reported: AtomicU32,
    rx_signals: AtomicU32,
    bytes: ByteDistributor,
    lines: LineAssembler,
}

impl SerialPort {
    pub const fn new(id: PortId, config: PortConfig) -> Self {
        Self {
            id,
            config,
            hw: Mutex::new(Cell::new(None)),
            started: AtomicBool::new(false),
            tx: Channel::new(),
            rx: Mutex::new(RefCell::new(Vec::new())),
            rx_ready: Semaphore::new(0, 1),
            rx_dropped: AtomicU32::new(0),
            rx_dropped_reported: AtomicU32::new(0),
            rx_signals: AtomicU32::new(0),
            bytes: ByteDistributor::new(),
            lines: LineAssembler::new(id, config.label),
        }
    }

    /// Chain the line assembler onto the byte distributor. Idempotent.
    pub fn start(&'static self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.bytes.add(&self.lines).is_err() {
            error!("{}: cannot chain line assembler", self.id);
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn bytes(&self) -> &ByteDistributor {
        &self.bytes
    }

    pub fn lines(&self) -> &LineAssembler {
        &self.lines
    }

    fn hardware(&self) -> Option<&'static dyn SerialHw> {
        critical_section::with(|cs| self.hw.borrow(cs).get())
    }

    /// Attach the hardware, enable receive interrupts and kick any output
    /// queued while the port was disabled.
    pub fn enable(&self, hw: &'static dyn SerialHw) {
        {
            let guard = InterruptGuard::new();
            self.hw.borrow(guard.token()).set(Some(hw));
            hw.set_rx_interrupt(true);
            if !self.tx.is_empty() {
                hw.set_tx_interrupt(true);
            }
        }
        info!("{}: enabled at {} baud", self.id, self.config.baud_rate);
    }

    /// Detach the hardware and flush both directions.
    pub fn disable(&self) {
        let hw = {
            let guard = InterruptGuard::new();
            self.hw.borrow(guard.token()).take()
        };
        if let Some(hw) = hw {
            hw.set_rx_interrupt(false);
            hw.set_tx_interrupt(false);
        }
        self.clear_tx();
        self.clear_rx();
        info!("{}: disabled", self.id);
    }

    pub fn is_enabled(&self) -> bool {
        self.hardware().is_some()
    }

    /// Drop received bytes not yet distributed, the partial line and any
    /// deferred line work.
    pub fn clear_rx(&self) {
        {
            let guard = InterruptGuard::new();
            self.rx.borrow_ref_mut(guard.token()).clear();
        }
        self.lines.clear();
        self.lines.clear_in_flight();
    }

    /// Drop queued output.
    pub fn clear_tx(&self) {
        self.tx.flush();
    }

    pub fn stats(&self) -> PortStats {
        let rx_queued = critical_section::with(|cs| self.rx.borrow_ref(cs).len());
        let chained = usize::from(self.started.load(Ordering::Acquire));
        PortStats {
            rx_queued,
            rx_dropped: self.rx_dropped.load(Ordering::Relaxed),
            rx_signals: self.rx_signals.load(Ordering::Relaxed),
            tx_queued: usize::from(self.tx.count()),
            byte_subscribers: self.bytes.callback_count().saturating_sub(chained),
            line_subscribers: self.lines.callback_count(),
            line_buffered: self.lines.buffered_size(),
        }
    }

    /// Interrupt handler body. Bind it to the port's UART interrupt.
    ///
    /// Bounded work: at most the queued output and whatever the receive
    /// register holds. Never allocates or blocks.
    pub fn on_interrupt(&self) {
        let Some(hw) = self.hardware() else {
            return;
        };

        while hw.is_writable() {
            match self.tx.get_from_interrupt() {
                Ok(byte) => hw.write_byte(byte),
                Err(_) => break,
            }
        }
        if self.tx.is_empty() {
            hw.set_tx_interrupt(false);
        }

        let listening = self.bytes.callback_count() != 0;
        let mut accepted = false;
        critical_section::with(|cs| {
            let mut rx = self.rx.borrow_ref_mut(cs);
            while hw.is_readable() {
                let byte = hw.read_byte();
                if !listening {
                    continue;
                }
                if rx.push(byte).is_ok() {
                    accepted = true;
                } else {
                    self.rx_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

        // Once per interrupt, not per byte: the worker drains everything.
        if accepted {
            self.rx_signals.fetch_add(1, Ordering::Relaxed);
            self.rx_ready.give_from_interrupt();
        }
    }

    /// Worker thread body: wait for received data and distribute it.
    pub async fn run_worker(&self) -> ! {
        info!("{}: worker started", self.id);
        loop {
            self.rx_ready.take(Timeout::Forever).await;
            self.drain_rx();
        }
    }

    /// Take everything received so far and distribute it. Returns the
    /// number of bytes distributed.
    ///
    /// Interrupts are masked only while the buffer is swapped out;
    /// subscribers run with interrupts enabled.
    pub fn drain_rx(&self) -> usize {
        let chunk = {
            let guard = InterruptGuard::new();
            let taken = core::mem::take(&mut *self.rx.borrow_ref_mut(guard.token()));
            taken
        };

        let dropped = self.rx_dropped.load(Ordering::Relaxed);
        let reported = self.rx_dropped_reported.swap(dropped, Ordering::Relaxed);
        if dropped != reported {
            warn!(
                "{}: receive buffer overflowed, {} bytes dropped",
                self.id,
                dropped.wrapping_sub(reported)
            );
        }

        if !chunk.is_empty() {
            self.bytes.distribute(&chunk);
        }
        chunk.len()
    }

    /// Queue `bytes` for transmission, waiting up to `timeout` whenever the
    /// outbound channel is full.
    ///
    /// On timeout the bytes queued so far stay queued.
    pub async fn send(&self, bytes: &[u8], timeout: Timeout) -> Result<(), SendError> {
        let hw = self.hardware().ok_or(SendError::Disabled)?;
        if bytes.len() > self.tx.capacity() {
            return Err(SendError::TooLarge);
        }

        for &byte in bytes {
            if self.tx.try_put(byte).is_err() {
                // Make sure the transmitter is draining before waiting on it.
                hw.set_tx_interrupt(true);
                self.tx.put(byte, timeout).await?;
            }
        }
        hw.set_tx_interrupt(true);
        Ok(())
    }

    /// Queue all of `bytes` or none of them. Never waits.
    pub fn try_send(&self, bytes: &[u8]) -> Result<(), SendError> {
        let hw = self.hardware().ok_or(SendError::Disabled)?;
        if bytes.len() > self.tx.capacity() {
            return Err(SendError::TooLarge);
        }

        critical_section::with(|_| {
            if self.tx.free() < bytes.len() {
                return Err(SendError::Full);
            }
            self.tx.put_many_from_interrupt(bytes);
            Ok(())
        })?;
        hw.set_tx_interrupt(true);
        Ok(())
    }

    /// Queue `bytes` of any length from a context that cannot await,
    /// busy-waiting up to `timeout` for the interrupt handler to make room.
    ///
    /// The caller must run below the UART interrupt's priority, otherwise
    /// the queue never drains. On timeout the bytes queued so far stay
    /// queued.
    pub fn send_blocking(&self, bytes: &[u8], timeout: Timeout) -> Result<(), SendError> {
        let hw = self.hardware().ok_or(SendError::Disabled)?;
        let deadline = timeout.duration().map(|d| Instant::now() + d);

        let mut rest = bytes;
        loop {
            let queued = self.tx.put_many_from_interrupt(rest);
            rest = &rest[queued..];
            if queued > 0 {
                hw.set_tx_interrupt(true);
            }
            if rest.is_empty() {
                return Ok(());
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(match timeout {
                    Timeout::NoWait => SendError::Full,
                    _ => SendError::Timeout,
                });
            }
            if !self.is_enabled() {
                return Err(SendError::Disabled);
            }
            core::hint::spin_loop();
        }
    }

    /// Write `bytes` straight to the hardware, bypassing the queue.
    ///
    /// For interrupt handlers and fatal-error reporting, where queued output
    /// might never drain.
    pub fn send_from_interrupt(&self, bytes: &[u8]) -> Result<(), SendError> {
        let hw = self.hardware().ok_or(SendError::Disabled)?;
        for &byte in bytes {
            hw.write_blocking(byte);
        }
        Ok(())
    }

    /// `embedded-io` writer over this port.
    pub fn writer(&self, timeout: Timeout) -> PortWriter<'_> {
        PortWriter::new(self, timeout)
    }

    pub(crate) fn tx_is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}
