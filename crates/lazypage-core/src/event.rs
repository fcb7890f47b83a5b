//! Decoded fault-notification events.
//!
//! A channel turns each raw kernel record into one `FaultEvent`. Only
//! `EventKind::MissingPage` is serviceable; everything else is fatal to the
//! dispatch loop.

use std::fmt;

use crate::region::page_align_down;

/// Kernel flag bit: fault caused by a write
pub const FLAG_WRITE: u64 = 1 << 0;
/// Kernel flag bit: write-protect fault
pub const FLAG_WP: u64 = 1 << 1;

/// What the kernel reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Access to a page with no backing. The only kind registered for.
    MissingPage,
    /// Write to a write-protected page.
    WriteProtected,
    /// Any other page-fault flavour (e.g. minor faults).
    OtherFault,
    Fork,
    Remap,
    Remove,
    Unmap,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::MissingPage => "pagefault (missing)",
            EventKind::WriteProtected => "pagefault (write-protect)",
            EventKind::OtherFault => "pagefault (other)",
            EventKind::Fork => "fork",
            EventKind::Remap => "remap",
            EventKind::Remove => "remove",
            EventKind::Unmap => "unmap",
        }
    }
}

/// Whether the faulting access was a load or a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// One fault notification, consumed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultEvent {
    pub kind: EventKind,
    /// Byte-precise faulting address (not page aligned)
    pub addr: usize,
    pub access: Access,
}

impl FaultEvent {
    pub fn missing(addr: usize, access: Access) -> Self {
        Self { kind: EventKind::MissingPage, addr, access }
    }

    /// Page-aligned address the copy-in must target
    #[inline]
    pub fn page_base(&self, page_size: usize) -> usize {
        page_align_down(self.addr, page_size)
    }

    /// Kernel-style flag word
    pub fn flags(&self) -> u64 {
        let mut flags = 0;
        if self.access == Access::Write {
            flags |= FLAG_WRITE;
        }
        if self.kind == EventKind::WriteProtected {
            flags |= FLAG_WP;
        }
        flags
    }
}

impl fmt::Display for FaultEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} event: flags = {:x}; address = {:x}",
            self.kind.name(),
            self.flags(),
            self.addr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_base() {
        let ev = FaultEvent::missing(0x7f12_3456_7abc, Access::Read);
        assert_eq!(ev.page_base(4096), 0x7f12_3456_7000);
    }

    #[test]
    fn test_flags() {
        assert_eq!(FaultEvent::missing(0, Access::Read).flags(), 0);
        assert_eq!(FaultEvent::missing(0, Access::Write).flags(), FLAG_WRITE);
        let wp = FaultEvent { kind: EventKind::WriteProtected, addr: 0, access: Access::Write };
        assert_eq!(wp.flags(), FLAG_WRITE | FLAG_WP);
    }

    #[test]
    fn test_display() {
        let ev = FaultEvent::missing(0x1234, Access::Write);
        assert_eq!(
            ev.to_string(),
            "pagefault (missing) event: flags = 1; address = 1234"
        );
    }
}
