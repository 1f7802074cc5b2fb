#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod console;
mod platform;
mod serial;

stm32_tim2_monotonic!(Mono, 1_000_000);

// Dispatchers must match `platform::DISPATCHERS`.
#[app(device = embassy_stm32, peripherals = true, dispatchers = [UART4, UART5])]
mod app {
    use super::*;
    use console_core::port::{self, PortId};
    use defmt::{error, info};
    use embassy_stm32::gpio::{Level, Output, Speed};
    use embassy_stm32::rcc::{Hse, HseMode};
    use embassy_stm32::time::Hertz;
    use embassy_stm32::usart::Uart;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        led: Output<'static>,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Serial console starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        // VCO / DIVQ(7) = 48 MHz
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        let p = embassy_stm32::init(config);

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        Mono::start(84_000_000);

        // Hooks first: everything below may take a SchedulerGuard.
        platform::install();
        port::start_all();
        console::install();

        // UART0: USART3 on PB11 (RX) / PB10 (TX)
        match Uart::new_blocking(p.USART3, p.PB11, p.PB10, serial::config(PortId::Uart0)) {
            Ok(uart) => {
                serial::retain(PortId::Uart0, uart);
                port::port(PortId::Uart0).enable(&serial::UART0_HW);
            }
            Err(e) => error!("UART0 init failed: {:?}", e),
        }

        // UART1: USART2 on PA3 (RX) / PA2 (TX)
        match Uart::new_blocking(p.USART2, p.PA3, p.PA2, serial::config(PortId::Uart1)) {
            Ok(uart) => {
                serial::retain(PortId::Uart1, uart);
                port::port(PortId::Uart1).enable(&serial::UART1_HW);
            }
            Err(e) => error!("UART1 init failed: {:?}", e),
        }

        let led = Output::new(p.PC1, Level::High, Speed::Low);

        heartbeat::spawn().ok();
        uart0_worker::spawn().ok();
        uart1_worker::spawn().ok();

        (Shared {}, Local { led })
    }

    /// UART0 interrupt: drain output, buffer input
    #[task(binds = USART3, priority = 3)]
    fn usart3(_cx: usart3::Context) {
        port::port(PortId::Uart0).on_interrupt();
    }

    /// UART1 interrupt: drain output, buffer input
    #[task(binds = USART2, priority = 3)]
    fn usart2(_cx: usart2::Context) {
        port::port(PortId::Uart1).on_interrupt();
    }

    /// UART0 receive worker: distributes bytes and lines
    #[task(priority = 1)]
    async fn uart0_worker(_cx: uart0_worker::Context) -> ! {
        port::port(PortId::Uart0).run_worker().await
    }

    /// UART1 receive worker: distributes bytes and lines
    #[task(priority = 1)]
    async fn uart1_worker(_cx: uart1_worker::Context) -> ! {
        port::port(PortId::Uart1).run_worker().await
    }

    /// Heartbeat task
    #[task(priority = 1, local = [led])]
    async fn heartbeat(cx: heartbeat::Context) {
        info!("Heartbeat task started");
        loop {
            cx.local.led.set_high();
            Mono::delay(100.millis()).await;
            cx.local.led.set_low();
            Mono::delay(4900.millis()).await;
        }
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
