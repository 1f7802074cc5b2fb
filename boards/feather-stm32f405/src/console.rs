//! Demo console commands
//!
//! Installed at the reserved line-subscriber handle of every port. Replies
//! go through `Console`, so they come back on the port the command was typed
//! on.

use core::fmt::Write;

use console_core::port::{self, Console, PortId};
use console_core::{redirect, time, Handle};
use defmt::{info, warn};
use heapless::Vec;

use crate::serial;

const MAX_ARGS: usize = 4;

pub fn install() {
    for id in PortId::ALL {
        if let Err(e) = port::set_line_subscriber(id, Handle::RESERVED, &handle_line, true) {
            warn!("{}: console not installed: {}", id, e);
        }
    }
    if time::on_scaling_change(scaling_changed).is_err() {
        warn!("no room for scaling listener");
    }
}

fn scaling_changed() {
    info!("timeouts now scaled by {}/1000", time::scaling_factor());
}

fn parse_port(s: &str) -> Option<PortId> {
    match s {
        "0" => Some(PortId::Uart0),
        "1" => Some(PortId::Uart1),
        _ => None,
    }
}

fn handle_line(line: &str) {
    let args: Vec<&str, MAX_ARGS> = line.split_ascii_whitespace().take(MAX_ARGS).collect();

    // Console output is best effort: a full queue just loses the reply.
    let _ = match args.as_slice() {
        ["ping"] => writeln!(Console, "pong"),
        ["stats"] => print_stats(),
        ["uart1", "on"] => {
            port::port(PortId::Uart1).enable(&serial::UART1_HW);
            writeln!(Console, "UART1 on")
        }
        ["uart1", "off"] => {
            port::port(PortId::Uart1).disable();
            writeln!(Console, "UART1 off")
        }
        ["uart1", "clear", "rx"] => {
            port::port(PortId::Uart1).clear_rx();
            Ok(())
        }
        ["uart1", "clear", "tx"] => {
            port::port(PortId::Uart1).clear_tx();
            Ok(())
        }
        ["log", target, msg @ ..] => match parse_port(target) {
            Some(id) => {
                let _to = redirect::redirect(id);
                for word in msg {
                    let _ = write!(Console, "{} ", word);
                }
                writeln!(Console)
            }
            None => writeln!(Console, "usage: log <0|1> <msg>"),
        },
        ["scale", per_mille] => match per_mille.parse::<u32>() {
            Ok(v) if v > 0 => {
                time::set_scaling_factor(v);
                writeln!(Console, "scale {}/1000", v)
            }
            _ => writeln!(Console, "usage: scale <per-mille>"),
        },
        [] => Ok(()),
        [cmd, ..] => writeln!(Console, "unknown command: {}", cmd),
    };
}

fn print_stats() -> core::fmt::Result {
    for id in PortId::ALL {
        let port = port::port(id);
        let s = port.stats();
        writeln!(Console, "{} ({})", id, if port.is_enabled() { "on" } else { "off" })?;
        writeln!(Console, "- irq queued    : {}", s.rx_queued)?;
        writeln!(Console, "- irq dropped   : {}", s.rx_dropped)?;
        writeln!(Console, "- irq signals   : {}", s.rx_signals)?;
        writeln!(Console, "- tx queued     : {}", s.tx_queued)?;
        writeln!(Console, "- raw listeners : {}", s.byte_subscribers)?;
        writeln!(Console, "- line listeners: {}", s.line_subscribers)?;
        writeln!(Console, "  - queued      : {}", s.line_buffered)?;
    }
    Ok(())
}
