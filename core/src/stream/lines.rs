use heapless::Vec;

use crate::config::{MAX_LINE_LENGTH, MAX_SUBSCRIBERS};
use crate::error::RegistryError;
use crate::handle::Handle;
use crate::port::PortId;
use crate::redirect;
use crate::stream::bytes::ByteSink;
use crate::stream::registry::Registry;
use crate::sync::SchedulerCell;
use crate::work;

/// Consumer of complete text lines, terminator stripped.
///
/// Called on the port's worker thread with output redirected to the port
/// the line arrived on.
pub trait LineSink: Sync {
    fn on_line(&self, line: &str);
}

impl<F> LineSink for F
where
    F: Fn(&str) + Sync,
{
    fn on_line(&self, line: &str) {
        self(line)
    }
}

#[derive(Clone, Copy)]
struct LineSubscriber {
    sink: &'static dyn LineSink,
    hide_blank_lines: bool,
}

/// What one scan of input produced
enum Scan<const MAX: usize> {
    /// All input consumed without completing a line
    Partial,
    /// A line completed after `consumed` bytes
    Line { consumed: usize, line: Vec<u8, MAX> },
}

/// Reframes a byte stream into lines for its own set of subscribers.
///
/// Lines end at `\n` or `\r`. Printable ASCII, space and tab are kept; every
/// other byte is dropped without counting toward the length limit. A line
/// reaching `MAX` bytes is delivered as is, and the rest of it (up to and
/// including the next terminator in the same chunk) is thrown away.
pub struct LineAssembler<const MAX: usize = MAX_LINE_LENGTH, const C: usize = MAX_SUBSCRIBERS> {
    port: PortId,
    label: &'static str,
    subscribers: SchedulerCell<Registry<LineSubscriber, C>>,
    line: SchedulerCell<Vec<u8, MAX>>,
}

impl<const MAX: usize, const C: usize> LineAssembler<MAX, C> {
    /// `label` names deferred work queued on behalf of this assembler.
    pub const fn new(port: PortId, label: &'static str) -> Self {
        Self {
            port,
            label,
            subscribers: SchedulerCell::new(Registry::new()),
            line: SchedulerCell::new(Vec::new()),
        }
    }

    pub fn add(
        &self,
        sink: &'static dyn LineSink,
        hide_blank_lines: bool,
    ) -> Result<Handle, RegistryError> {
        self.subscribers
            .lock(|reg| {
                reg.add(LineSubscriber {
                    sink,
                    hide_blank_lines,
                })
            })
            .inspect_err(|_| warn!("{}: line subscriber registry full", self.label))
    }

    pub fn set(
        &self,
        handle: Handle,
        sink: &'static dyn LineSink,
        hide_blank_lines: bool,
    ) -> Result<(), RegistryError> {
        self.subscribers.lock(|reg| {
            reg.set(
                handle,
                LineSubscriber {
                    sink,
                    hide_blank_lines,
                },
            )
        })
    }

    pub fn remove(&self, handle: Handle) -> Result<(), RegistryError> {
        self.subscribers.lock(|reg| reg.remove(handle))
    }

    pub fn callback_count(&self) -> usize {
        self.subscribers.lock(|reg| reg.len())
    }

    /// Bytes of the line being assembled
    pub fn buffered_size(&self) -> usize {
        self.line.lock(|line| line.len())
    }

    /// Drop the partial line. Returns how many bytes were discarded.
    pub fn clear(&self) -> usize {
        self.line.lock(|line| {
            let n = line.len();
            line.clear();
            n
        })
    }

    /// Cancel deferred work queued under this assembler's label. Returns how
    /// many jobs were cancelled.
    pub fn clear_in_flight(&self) -> u32 {
        work::cancel_by_label(self.label)
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Feed received bytes. Completed lines are dispatched before this
    /// returns, on the caller's thread.
    pub fn add_data(&self, data: &[u8]) {
        if self.callback_count() == 0 {
            return;
        }

        let mut rest = data;
        while !rest.is_empty() {
            // Scan under the lock, dispatch outside it: subscribers may call
            // back into this assembler.
            match self.line.lock(|line| Self::scan(line, rest)) {
                Scan::Partial => break,
                Scan::Line { consumed, line } => {
                    rest = &rest[consumed..];
                    self.dispatch(&line);
                }
            }
        }
    }

    fn scan(line: &mut Vec<u8, MAX>, input: &[u8]) -> Scan<MAX> {
        for (i, &c) in input.iter().enumerate() {
            if is_terminator(c) {
                return Scan::Line {
                    consumed: i + 1,
                    line: core::mem::take(line),
                };
            }
            if line.is_full() {
                // Over-length: this byte and the remainder of the line go.
                let consumed = input[i..]
                    .iter()
                    .position(|&b| is_terminator(b))
                    .map_or(input.len(), |end| i + end + 1);
                return Scan::Line {
                    consumed,
                    line: core::mem::take(line),
                };
            }
            if c.is_ascii_graphic() || c == b' ' || c == b'\t' {
                // Cannot fail, `is_full` was checked above.
                let _ = line.push(c);
            }
        }
        Scan::Partial
    }

    fn dispatch(&self, line: &[u8]) {
        // Only printable ASCII is ever buffered.
        let text = core::str::from_utf8(line).unwrap_or_default();
        let snapshot = self.subscribers.lock(|reg| reg.snapshot());
        for sub in snapshot.iter().flatten() {
            if text.is_empty() && sub.hide_blank_lines {
                continue;
            }
            let _reply_here = redirect::redirect(self.port);
            sub.sink.on_line(text);
        }
    }
}

impl<const MAX: usize, const C: usize> ByteSink for LineAssembler<MAX, C> {
    fn on_bytes(&self, chunk: &[u8]) {
        self.add_data(chunk);
    }
}

fn is_terminator(c: u8) -> bool {
    c == b'\n' || c == b'\r'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use std::sync::Mutex;

    struct Lines {
        seen: Mutex<std::vec::Vec<String>>,
    }

    impl Lines {
        fn leak() -> &'static Self {
            Box::leak(Box::new(Self {
                seen: Mutex::new(std::vec::Vec::new()),
            }))
        }

        fn seen(&self) -> std::vec::Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl LineSink for Lines {
        fn on_line(&self, line: &str) {
            self.seen.lock().unwrap().push(line.into());
        }
    }

    fn leak_assembler<const MAX: usize>() -> &'static LineAssembler<MAX, 8> {
        Box::leak(Box::new(LineAssembler::new(PortId::Uart0, "lines-test")))
    }

    #[test]
    fn test_single_line_delivered_once() {
        let _global = crate::test_lock();
        let asm = leak_assembler::<1000>();
        let sub = Lines::leak();
        asm.add(sub, true).unwrap();
        asm.add_data(b"PING\n");
        assert_eq!(sub.seen(), ["PING"]);
        assert_eq!(asm.buffered_size(), 0);
    }

    #[test]
    fn test_blank_lines_respect_flag() {
        let _global = crate::test_lock();
        let asm = leak_assembler::<1000>();
        let hidden = Lines::leak();
        let shown = Lines::leak();
        asm.add(hidden, true).unwrap();
        asm.add(shown, false).unwrap();
        asm.add_data(b"\n\n");
        assert!(hidden.seen().is_empty());
        assert_eq!(shown.seen(), ["", ""]);
    }

    #[test]
    fn test_over_length_line_truncated_and_remainder_dropped() {
        let _global = crate::test_lock();
        const MAX: usize = 1000;
        let asm = leak_assembler::<MAX>();
        let sub = Lines::leak();
        asm.add(sub, true).unwrap();

        let mut input: std::vec::Vec<u8> = (0..MAX + 5).map(|i| b'a' + (i % 26) as u8).collect();
        input.push(b'\n');
        asm.add_data(&input);
        asm.add_data(b"next\n");

        let seen = sub.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].as_bytes(), &input[..MAX]);
        assert_eq!(seen[1], "next");
    }

    #[test]
    fn test_discard_does_not_outlive_chunk() {
        let _global = crate::test_lock();
        let asm = leak_assembler::<4>();
        let sub = Lines::leak();
        asm.add(sub, true).unwrap();
        asm.add_data(b"abcdef");
        // The discard ran to the end of the first chunk only.
        asm.add_data(b"gh\n");
        assert_eq!(sub.seen(), ["abcd", "gh"]);
    }

    #[test]
    fn test_lines_split_across_chunks_and_crlf() {
        let _global = crate::test_lock();
        let asm = leak_assembler::<64>();
        let sub = Lines::leak();
        asm.add(sub, true).unwrap();
        asm.add_data(b"hel");
        assert_eq!(asm.buffered_size(), 3);
        asm.add_data(b"lo\r\nwor");
        asm.add_data(b"ld\r\n");
        assert_eq!(sub.seen(), ["hello", "world"]);
    }

    #[test]
    fn test_non_printable_bytes_dropped() {
        let _global = crate::test_lock();
        let asm = leak_assembler::<16>();
        let sub = Lines::leak();
        asm.add(sub, false).unwrap();
        asm.add_data(b"a\x00b\x1b\tc\xff\n");
        assert_eq!(sub.seen(), ["ab\tc"]);
    }

    #[test]
    fn test_no_subscribers_drops_data() {
        let _global = crate::test_lock();
        let asm = leak_assembler::<64>();
        asm.add_data(b"ignored");
        assert_eq!(asm.buffered_size(), 0);
        let sub = Lines::leak();
        asm.add(sub, true).unwrap();
        asm.add_data(b"kept\n");
        assert_eq!(sub.seen(), ["kept"]);
    }

    #[test]
    fn test_clear_reports_discarded_bytes() {
        let _global = crate::test_lock();
        let asm = leak_assembler::<64>();
        asm.add(Lines::leak(), true).unwrap();
        asm.add_data(b"partial");
        assert_eq!(asm.clear(), 7);
        assert_eq!(asm.buffered_size(), 0);
    }

    #[test]
    fn test_registry_full_leaves_existing() {
        let _global = crate::test_lock();
        let asm = leak_assembler::<64>();
        let subs: std::vec::Vec<_> = (0..7).map(|_| Lines::leak()).collect();
        for s in &subs {
            asm.add(*s, true).unwrap();
        }
        let extra = Lines::leak();
        assert_eq!(asm.add(extra, true), Err(RegistryError::Full));
        asm.add_data(b"x\n");
        assert!(subs.iter().all(|s| s.seen() == ["x"]));
        assert!(extra.seen().is_empty());
    }

    #[test]
    fn test_set_rules() {
        let _global = crate::test_lock();
        let asm = leak_assembler::<64>();
        let sub = Lines::leak();
        assert_eq!(
            asm.set(Handle::new(5), sub, true),
            Err(RegistryError::UnknownHandle)
        );
        asm.set(Handle::RESERVED, sub, true).unwrap();
        asm.set(Handle::RESERVED, sub, false).unwrap();
        assert_eq!(asm.callback_count(), 1);
        let h = asm.add(sub, true).unwrap();
        asm.remove(h).unwrap();
        assert_eq!(asm.callback_count(), 1);
    }

    static REENTRANT: LineAssembler<64, 8> = LineAssembler::new(PortId::Uart1, "reentrant");
    static REENTRANT_SEEN: Mutex<std::vec::Vec<String>> = Mutex::new(std::vec::Vec::new());

    fn unsubscribe_self(line: &str) {
        REENTRANT_SEEN.lock().unwrap().push(line.into());
        // Self-registered at the reserved handle.
        REENTRANT.remove(Handle::RESERVED).unwrap();
        // Re-entering the assembler from a callback is allowed.
        let _ = REENTRANT.buffered_size();
    }

    #[test]
    fn test_subscriber_removing_itself_mid_dispatch() {
        let _global = crate::test_lock();
        let other = Lines::leak();
        REENTRANT.set(Handle::RESERVED, &unsubscribe_self, false).unwrap();
        REENTRANT.add(other, false).unwrap();

        REENTRANT.add_data(b"one\ntwo\n");

        assert_eq!(*REENTRANT_SEEN.lock().unwrap(), ["one"]);
        assert_eq!(other.seen(), ["one", "two"]);
        assert_eq!(REENTRANT.callback_count(), 1);
    }

    static REPLY_TARGET: Mutex<Option<PortId>> = Mutex::new(None);

    fn record_target(_: &str) {
        *REPLY_TARGET.lock().unwrap() = Some(redirect::current());
    }

    #[test]
    fn test_callbacks_run_redirected_to_source_port() {
        let _global = crate::test_lock();
        let asm: &'static LineAssembler<16, 4> =
            Box::leak(Box::new(LineAssembler::new(PortId::Uart1, "redirect-test")));
        asm.add(&record_target, true).unwrap();
        asm.add_data(b"x\n");
        assert_eq!(*REPLY_TARGET.lock().unwrap(), Some(PortId::Uart1));
    }

    #[test]
    fn test_clear_in_flight_cancels_by_label() {
        let _global = crate::test_lock();
        crate::work::mock::install();
        fn noop() {}
        let asm = leak_assembler::<16>();
        assert!(work::queue(asm.label(), &noop));
        assert!(work::queue("lines-test-other", &noop));
        assert_eq!(asm.clear_in_flight(), 1);
        assert_eq!(asm.clear_in_flight(), 0);
        assert_eq!(work::cancel_by_label("lines-test-other"), 1);
    }
}
