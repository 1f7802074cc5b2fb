//! USART register access for the console pipeline
//!
//! Clocks, pins, baud rate and frame format are configured once by the
//! embassy blocking driver; after that the core only needs the status flags,
//! the data register and the two interrupt enables, which this module
//! exposes as a `SerialHw`.

// The register block handle is a raw MMIO pointer.
#![allow(unsafe_code)]

use console_core::port::PortId;
use embassy_stm32::mode::Blocking;
use embassy_stm32::usart::{self, Uart};
use hal_abstractions::SerialHw;
use static_cell::StaticCell;
use stm32_metapac::usart::Usart;

/// USART3 (Feather TX/RX pins), console port
pub static UART0_HW: UsartHw = UsartHw::new(stm32_metapac::USART3);

/// USART2, auxiliary port
pub static UART1_HW: UsartHw = UsartHw::new(stm32_metapac::USART2);

// The embassy drivers own pins and clocks; dropping them would power the
// peripherals down.
static UART0_DRIVER: StaticCell<Uart<'static, Blocking>> = StaticCell::new();
static UART1_DRIVER: StaticCell<Uart<'static, Blocking>> = StaticCell::new();

/// Frame configuration for `id`, baud rate from the port's settings.
pub fn config(id: PortId) -> usart::Config {
    let mut config = usart::Config::default();
    config.baudrate = console_core::port::port(id).config().baud_rate;
    config
}

/// Keep the embassy driver for `id` alive for the rest of the program.
pub fn retain(id: PortId, uart: Uart<'static, Blocking>) {
    match id {
        PortId::Uart0 => {
            let _ = UART0_DRIVER.init(uart);
        }
        PortId::Uart1 => {
            let _ = UART1_DRIVER.init(uart);
        }
    }
}

/// Register-level view of one STM32F4 USART
pub struct UsartHw {
    regs: Usart,
}

impl UsartHw {
    pub const fn new(regs: Usart) -> Self {
        Self { regs }
    }
}

// SAFETY: every access is a single volatile register read or write, except
// the CR1 read-modify-writes, which only the owning interrupt and the
// thread that enables/disables the port perform.
unsafe impl Sync for UsartHw {}

impl SerialHw for UsartHw {
    fn is_writable(&self) -> bool {
        self.regs.sr().read().txe()
    }

    fn write_byte(&self, byte: u8) {
        self.regs.dr().write(|w| w.set_dr(u16::from(byte)));
    }

    fn is_readable(&self) -> bool {
        // An overrun also sets RXNE's interrupt; reading DR clears both.
        let sr = self.regs.sr().read();
        sr.rxne() || sr.ore()
    }

    fn read_byte(&self) -> u8 {
        self.regs.dr().read().dr() as u8
    }

    fn set_tx_interrupt(&self, enabled: bool) {
        critical_section::with(|_| self.regs.cr1().modify(|w| w.set_txeie(enabled)));
    }

    fn set_rx_interrupt(&self, enabled: bool) {
        critical_section::with(|_| self.regs.cr1().modify(|w| w.set_rxneie(enabled)));
    }
}
