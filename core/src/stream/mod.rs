//! Received-data fan-out
//!
//! A port's worker hands every drained chunk to its [`ByteDistributor`].
//! The port's [`LineAssembler`] is one of the distributor's sinks and
//! reframes the bytes into lines for its own subscribers.
//!
//! Both keep a handle-indexed registry and iterate a snapshot of it, so
//! subscribers may attach and detach (themselves included) from inside a
//! callback.

mod bytes;
mod lines;
mod registry;

pub use bytes::{ByteDistributor, ByteSink};
pub use lines::{LineAssembler, LineSink};
