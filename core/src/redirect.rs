//! Output redirection
//!
//! A process-wide stack of port identifiers selects where textual output
//! goes. The base entry is fixed at construction and can never be popped.
//! [`Redirect`] pushes for the duration of a scope, which lets a command
//! handler reply on whichever port the command arrived on without passing
//! the port around.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Vec;

use crate::config::REDIRECT_STACK_DEPTH;
use crate::port::PortId;

/// Process-wide output target
pub static OUTPUT: OutputStack = OutputStack::new(PortId::Uart0);

/// Port textual output currently targets
pub fn current() -> PortId {
    OUTPUT.current()
}

/// Redirect textual output to `port` until the guard is dropped.
pub fn redirect(port: PortId) -> Redirect<'static> {
    OUTPUT.redirect(port)
}

/// Non-empty stack of output targets
pub struct OutputStack {
    base: PortId,
    entries: Mutex<RefCell<Vec<PortId, REDIRECT_STACK_DEPTH>>>,
}

impl OutputStack {
    pub const fn new(base: PortId) -> Self {
        Self {
            base,
            entries: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Returns false, leaving the stack unchanged, when it is full.
    pub fn push(&self, port: PortId) -> bool {
        let pushed = critical_section::with(|cs| self.entries.borrow_ref_mut(cs).push(port).is_ok());
        if !pushed {
            warn!("output redirect stack full, staying on {}", self.current());
        }
        pushed
    }

    /// Drop the top entry. No-op when only the base remains.
    pub fn pop(&self) {
        critical_section::with(|cs| {
            self.entries.borrow_ref_mut(cs).pop();
        });
    }

    pub fn current(&self) -> PortId {
        critical_section::with(|cs| self.entries.borrow_ref(cs).last().copied())
            .unwrap_or(self.base)
    }

    /// Entries above the base
    pub fn depth(&self) -> usize {
        critical_section::with(|cs| self.entries.borrow_ref(cs).len())
    }

    pub fn redirect(&self, port: PortId) -> Redirect<'_> {
        Redirect {
            stack: self,
            pushed: self.push(port),
        }
    }
}

/// Scoped output redirection; pops on drop, including on unwind.
#[must_use = "output reverts as soon as the guard is dropped"]
pub struct Redirect<'a> {
    stack: &'a OutputStack,
    // An overflowed push must not pop someone else's entry.
    pushed: bool,
}

impl Redirect<'_> {
    pub fn is_active(&self) -> bool {
        self.pushed
    }
}

impl Drop for Redirect<'_> {
    fn drop(&mut self) {
        if self.pushed {
            self.stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_sequence_keeps_base() {
        let stack = OutputStack::new(PortId::Uart0);
        stack.push(PortId::Uart1);
        stack.push(PortId::Uart0);
        assert_eq!(stack.current(), PortId::Uart0);
        assert_eq!(stack.depth(), 2);
        stack.pop();
        assert_eq!(stack.current(), PortId::Uart1);
        stack.pop();
        assert_eq!(stack.current(), PortId::Uart0);
        stack.pop();
        assert_eq!(stack.current(), PortId::Uart0);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_base_other_than_first_port() {
        let stack = OutputStack::new(PortId::Uart1);
        stack.pop();
        assert_eq!(stack.current(), PortId::Uart1);
    }

    #[test]
    fn test_guard_restores_on_scope_exit() {
        let stack = OutputStack::new(PortId::Uart0);
        {
            let _outer = stack.redirect(PortId::Uart1);
            assert_eq!(stack.current(), PortId::Uart1);
            {
                let _inner = stack.redirect(PortId::Uart0);
                assert_eq!(stack.current(), PortId::Uart0);
            }
            assert_eq!(stack.current(), PortId::Uart1);
        }
        assert_eq!(stack.current(), PortId::Uart0);
    }

    #[test]
    fn test_guard_restores_on_unwind() {
        let stack = OutputStack::new(PortId::Uart0);
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _r = stack.redirect(PortId::Uart1);
            panic!("handler failed");
        }));
        assert!(res.is_err());
        assert_eq!(stack.current(), PortId::Uart0);
    }

    #[test]
    fn test_overflowing_guard_does_not_pop_others() {
        let stack = OutputStack::new(PortId::Uart0);
        for _ in 0..REDIRECT_STACK_DEPTH {
            assert!(stack.push(PortId::Uart1));
        }
        {
            let guard = stack.redirect(PortId::Uart0);
            assert!(!guard.is_active());
            assert_eq!(stack.current(), PortId::Uart1);
        }
        assert_eq!(stack.depth(), REDIRECT_STACK_DEPTH);
    }
}
