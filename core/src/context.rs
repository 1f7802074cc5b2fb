//! "Am I in an interrupt?" predicate
//!
//! Entry points come in explicit thread/interrupt pairs, so most code never
//! asks. The query exists for the few callers that cannot know, chiefly the
//! byte sender used by fatal-error reporting, and it can be forced so that
//! such reporting takes the non-blocking path from any context.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use hal_abstractions::ExecutionContext;

static CONTEXT: Mutex<Cell<Option<&'static dyn ExecutionContext>>> = Mutex::new(Cell::new(None));
static FORCED: AtomicBool = AtomicBool::new(false);

/// Install the platform predicate. Call once during init.
pub fn install(ctx: &'static dyn ExecutionContext) {
    critical_section::with(|cs| CONTEXT.borrow(cs).set(Some(ctx)));
}

/// True inside an interrupt handler, or while the override is forced on.
pub fn in_interrupt() -> bool {
    FORCED.load(Ordering::Relaxed) || in_interrupt_real()
}

/// The platform's answer, ignoring the override. False before `install`.
pub fn in_interrupt_real() -> bool {
    critical_section::with(|cs| CONTEXT.borrow(cs).get()).is_some_and(|ctx| ctx.in_interrupt())
}

/// Force [`in_interrupt`] to report true (fatal-error reporting).
pub fn force_interrupt_path(force: bool) {
    FORCED.store(force, Ordering::Relaxed);
}
