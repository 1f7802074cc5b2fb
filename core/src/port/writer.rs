use embassy_time::{with_timeout, Duration, Timer};

use crate::error::SendError;
use crate::port::driver::SerialPort;
use crate::time::Timeout;

/// `embedded-io` adapter for one port.
///
/// The async writer queues through the outbound channel, waiting up to the
/// writer's timeout for room. The blocking writer goes straight to the
/// hardware, like [`SerialPort::send_from_interrupt`].
pub struct PortWriter<'a> {
    port: &'a SerialPort,
    timeout: Timeout,
}

impl<'a> PortWriter<'a> {
    pub(crate) fn new(port: &'a SerialPort, timeout: Timeout) -> Self {
        Self { port, timeout }
    }
}

impl embedded_io::ErrorType for PortWriter<'_> {
    type Error = SendError;
}

impl embedded_io_async::Write for PortWriter<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(crate::config::OUTPUT_CHANNEL_CAPACITY);
        if n == 0 {
            return Ok(0);
        }
        self.port.send(&buf[..n], self.timeout).await?;
        Ok(n)
    }

    /// Wait until the transmitter has taken every queued byte.
    async fn flush(&mut self) -> Result<(), Self::Error> {
        if !self.port.is_enabled() {
            return Err(SendError::Disabled);
        }
        let drained = async {
            while !self.port.tx_is_empty() {
                Timer::after(Duration::from_millis(1)).await;
            }
        };
        match self.timeout.duration() {
            None => {
                drained.await;
                Ok(())
            }
            Some(d) => with_timeout(d, drained)
                .await
                .map_err(|_| SendError::Timeout),
        }
    }
}

impl embedded_io::Write for PortWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.port.send_from_interrupt(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortConfig;
    use crate::port::driver::mock::MockSerial;
    use crate::port::PortId;
    use embassy_futures::block_on;

    fn enabled_port() -> (&'static SerialPort, &'static MockSerial) {
        let port: &'static SerialPort = Box::leak(Box::new(SerialPort::new(
            PortId::Uart1,
            PortConfig::new("writer-test", 9_600),
        )));
        let hw = MockSerial::leak();
        port.enable(hw);
        (port, hw)
    }

    #[test]
    fn test_async_write_all_and_flush() {
        use embedded_io_async::Write;

        let (port, hw) = enabled_port();
        let mut w = port.writer(Timeout::Millis(50));
        block_on(w.write_all(b"status ok\r\n")).unwrap();
        assert_eq!(port.stats().tx_queued, 11);

        port.on_interrupt();
        block_on(w.flush()).unwrap();
        assert_eq!(hw.transmitted(), b"status ok\r\n");
    }

    #[test]
    fn test_async_flush_times_out_when_stuck() {
        use embedded_io_async::Write;

        let (port, _hw) = enabled_port();
        let mut w = port.writer(Timeout::Millis(5));
        block_on(w.write(b"never drained")).unwrap();
        assert_eq!(block_on(w.flush()), Err(SendError::Timeout));
    }

    #[test]
    fn test_blocking_write_fmt_goes_to_hardware() {
        use embedded_io::Write;

        let (port, hw) = enabled_port();
        let mut w = port.writer(Timeout::NoWait);
        write!(w, "fault {:#x}", 0x2a).unwrap();
        assert_eq!(hw.transmitted(), b"fault 0x2a");
        assert_eq!(port.stats().tx_queued, 0);
    }
}
