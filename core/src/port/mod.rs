//! Serial ports
//!
//! The ports live in a fixed arena indexed by [`PortId`]; each slot owns its
//! outbound channel, receive buffer, wakeup semaphore, byte distributor and
//! line assembler. The free functions here are the entry points the rest of
//! the firmware uses: they look the port up by identifier, and the textual
//! ones follow the output redirection stack.

mod driver;
mod writer;

use core::fmt;

pub use driver::{PortStats, SerialPort};
pub use writer::PortWriter;

use crate::config::{PortConfig, SEND_TIMEOUT_MS};
use crate::context;
use crate::error::{RegistryError, SendError};
use crate::handle::Handle;
use crate::redirect;
use crate::stream::{ByteSink, LineSink};
use crate::time::Timeout;

/// Number of physical serial ports
pub const PORT_COUNT: usize = 2;

/// Physical serial port identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortId {
    /// Console port
    Uart0,
    /// Auxiliary port, off by default
    Uart1,
}

impl PortId {
    pub const ALL: [PortId; PORT_COUNT] = [PortId::Uart0, PortId::Uart1];

    pub const fn index(self) -> usize {
        match self {
            Self::Uart0 => 0,
            Self::Uart1 => 1,
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uart0 => write!(f, "UART0"),
            Self::Uart1 => write!(f, "UART1"),
        }
    }
}

static PORTS: [SerialPort; PORT_COUNT] = [
    SerialPort::new(PortId::Uart0, PortConfig::new("uart0-lines", 76_800)),
    SerialPort::new(PortId::Uart1, PortConfig::new("uart1-lines", 9_600)),
];

pub fn port(id: PortId) -> &'static SerialPort {
    &PORTS[id.index()]
}

/// Chain every port's line assembler onto its byte distributor. Call once
/// during init, before enabling any port.
pub fn start_all() {
    for id in PortId::ALL {
        port(id).start();
    }
}

/// Send raw bytes on `id` from any context.
///
/// Thread context queues `bytes` of any length, waiting up to
/// [`SEND_TIMEOUT_MS`] for the interrupt handler to make room. Interrupt
/// context (or a forced interrupt path) writes synchronously to the hardware
/// so output still escapes when the queues cannot drain. Use
/// [`SerialPort::try_send`] to never wait.
pub fn send_bytes(id: PortId, bytes: &[u8]) -> Result<(), SendError> {
    let port = port(id);
    if context::in_interrupt() {
        port.send_from_interrupt(bytes)
    } else {
        port.send_blocking(bytes, Timeout::Millis(SEND_TIMEOUT_MS))
    }
}

/// Send text to the port output is currently redirected to.
pub fn send_text(text: &str) -> Result<(), SendError> {
    send_bytes(redirect::current(), text.as_bytes())
}

/// `core::fmt::Write` sink following the output redirection stack.
///
/// ```ignore
/// use core::fmt::Write;
/// writeln!(Console, "uptime {}s", secs).ok();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Console;

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        send_text(s).map_err(|_| fmt::Error)
    }
}

pub fn add_byte_subscriber(id: PortId, sink: &'static dyn ByteSink) -> Result<Handle, RegistryError> {
    port(id).bytes().add(sink)
}

pub fn set_byte_subscriber(
    id: PortId,
    handle: Handle,
    sink: &'static dyn ByteSink,
) -> Result<(), RegistryError> {
    port(id).bytes().set(handle, sink)
}

pub fn remove_byte_subscriber(id: PortId, handle: Handle) -> Result<(), RegistryError> {
    port(id).bytes().remove(handle)
}

pub fn add_line_subscriber(
    id: PortId,
    sink: &'static dyn LineSink,
    hide_blank_lines: bool,
) -> Result<Handle, RegistryError> {
    port(id).lines().add(sink, hide_blank_lines)
}

pub fn set_line_subscriber(
    id: PortId,
    handle: Handle,
    sink: &'static dyn LineSink,
    hide_blank_lines: bool,
) -> Result<(), RegistryError> {
    port(id).lines().set(handle, sink, hide_blank_lines)
}

pub fn remove_line_subscriber(id: PortId, handle: Handle) -> Result<(), RegistryError> {
    port(id).lines().remove(handle)
}

#[cfg(test)]
mod tests {
    use super::driver::mock::MockSerial;
    use super::*;
    use crate::config::OUTPUT_CHANNEL_CAPACITY;
    use core::fmt::Write;
    use std::sync::atomic::{AtomicBool, Ordering};

    // The arena is process-wide: enable once, share between tests.
    fn arena() -> (&'static MockSerial, &'static MockSerial) {
        static HW: std::sync::OnceLock<(&'static MockSerial, &'static MockSerial)> =
            std::sync::OnceLock::new();
        *HW.get_or_init(|| {
            let hw0 = MockSerial::leak();
            let hw1 = MockSerial::leak();
            start_all();
            port(PortId::Uart0).enable(hw0);
            port(PortId::Uart1).enable(hw1);
            (hw0, hw1)
        })
    }

    fn transmit_all(id: PortId, hw: &MockSerial) -> std::string::String {
        port(id).on_interrupt();
        let out = std::string::String::from_utf8(hw.transmitted()).unwrap();
        hw.tx.lock().unwrap().clear();
        out
    }

    fn reply_pong(line: &str) {
        if line == "ping" {
            writeln!(Console, "pong").unwrap();
        }
    }

    #[test]
    fn test_reply_goes_back_to_requesting_port() {
        let _global = crate::test_lock();
        let (hw0, hw1) = arena();
        let h0 = add_line_subscriber(PortId::Uart0, &reply_pong, true).unwrap();
        let h1 = add_line_subscriber(PortId::Uart1, &reply_pong, true).unwrap();

        hw1.receive(b"ping\r\n");
        port(PortId::Uart1).on_interrupt();
        port(PortId::Uart1).drain_rx();

        assert_eq!(transmit_all(PortId::Uart1, hw1), "pong\n");
        assert_eq!(transmit_all(PortId::Uart0, hw0), "");

        remove_line_subscriber(PortId::Uart0, h0).unwrap();
        remove_line_subscriber(PortId::Uart1, h1).unwrap();
    }

    #[test]
    fn test_console_follows_redirect() {
        let _global = crate::test_lock();
        let (hw0, hw1) = arena();
        write!(Console, "base").unwrap();
        {
            let _r = redirect::redirect(PortId::Uart1);
            write!(Console, "redirected").unwrap();
        }
        assert_eq!(transmit_all(PortId::Uart0, hw0), "base");
        assert_eq!(transmit_all(PortId::Uart1, hw1), "redirected");
    }

    #[test]
    fn test_send_bytes_in_interrupt_is_synchronous() {
        let _global = crate::test_lock();
        let (hw0, _) = arena();
        context::force_interrupt_path(true);
        let res = send_bytes(PortId::Uart0, b"fatal");
        context::force_interrupt_path(false);
        res.unwrap();
        // Written without an interrupt pass.
        assert_eq!(std::string::String::from_utf8(hw0.transmitted()).unwrap(), "fatal");
        assert_eq!(port(PortId::Uart0).stats().tx_queued, 0);
        hw0.tx.lock().unwrap().clear();
    }

    #[test]
    fn test_send_text_near_capacity() {
        let _global = crate::test_lock();
        let (hw0, _) = arena();
        let text = "x".repeat(OUTPUT_CHANNEL_CAPACITY - 1);
        send_text(&text).unwrap();
        assert_eq!(transmit_all(PortId::Uart0, hw0).len(), OUTPUT_CHANNEL_CAPACITY - 1);
    }

    #[test]
    fn test_long_reply_waits_for_transmitter() {
        let _global = crate::test_lock();
        let (hw0, _) = arena();
        transmit_all(PortId::Uart0, hw0);

        let text = "y".repeat(OUTPUT_CHANNEL_CAPACITY + 200);
        let done = AtomicBool::new(false);
        let (sent, next) = std::thread::scope(|s| {
            // Stands in for the higher-priority UART interrupt.
            s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    port(PortId::Uart0).on_interrupt();
                    std::thread::yield_now();
                }
            });
            let sent = send_text(&text);
            let next = writeln!(Console, "next reply");
            done.store(true, Ordering::Release);
            (sent, next)
        });
        assert_eq!(sent, Ok(()));
        assert_eq!(next, Ok(()));
        assert_eq!(transmit_all(PortId::Uart0, hw0), text + "next reply\n");
    }

    #[test]
    fn test_byte_subscriber_wrappers() {
        let _global = crate::test_lock();
        arena();
        fn ignore(_: &[u8]) {}
        fn ignore_line(_: &str) {}
        let before = port(PortId::Uart1).stats().byte_subscribers;
        let h = add_byte_subscriber(PortId::Uart1, &ignore).unwrap();
        assert_eq!(port(PortId::Uart1).stats().byte_subscribers, before + 1);
        set_byte_subscriber(PortId::Uart1, h, &ignore).unwrap();
        remove_byte_subscriber(PortId::Uart1, h).unwrap();
        assert_eq!(port(PortId::Uart1).stats().byte_subscribers, before);
        assert_eq!(
            remove_byte_subscriber(PortId::Uart1, h),
            Err(RegistryError::UnknownHandle)
        );
        set_line_subscriber(PortId::Uart1, Handle::RESERVED, &ignore_line, true).unwrap();
        remove_line_subscriber(PortId::Uart1, Handle::RESERVED).unwrap();
    }

    #[test]
    fn test_port_id_display() {
        assert_eq!(std::format!("{}", PortId::Uart1), "UART1");
        assert_eq!(PortId::ALL.map(PortId::index), [0, 1]);
    }
}
