//! Fault-notification channel abstraction.
//!
//! A `FaultChannel` is the source of fault events for one registered region
//! and the sink for the copy-in that resolves them.
//!
//! # Implementors
//!
//! - `UserfaultChannel` (lazypage-module): a Linux userfaultfd in
//!   MISSING mode, optionally multiplexed with a shutdown eventfd.
//! - Scripted channels in tests.

use crate::error::Result;
use crate::event::FaultEvent;

/// Outcome of waiting on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A fault record is (probably) readable.
    Event,
    /// The attached shutdown source fired and no fault is pending.
    Shutdown,
}

/// Source of fault events and target of copy-ins.
///
/// **Contract:**
/// - `wait()` blocks with no timeout until something is readable.
/// - `read_event()` consumes at most one record. `Ok(None)` means the
///   wakeup was spurious and nothing was consumed.
/// - End-of-stream, an unreadable descriptor and read failures are errors,
///   never `Ok(None)`.
pub trait FaultChannel: Send {
    /// Block until a fault record or a shutdown request is pending.
    fn wait(&mut self) -> Result<Readiness>;

    /// Read exactly one fault record.
    fn read_event(&mut self) -> Result<Option<FaultEvent>>;

    /// Atomically copy `src` into the unbacked page at `dst` and wake the
    /// faulting thread. Returns the number of bytes copied.
    ///
    /// # Safety
    /// `dst` must be page aligned, inside a range registered on this
    /// channel, and `src.len()` must not run past the end of that range.
    unsafe fn copy_in(&mut self, src: &[u8], dst: usize) -> Result<usize>;
}
