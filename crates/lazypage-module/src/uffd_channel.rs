//! `UserfaultChannel`: default `FaultChannel` implementation.
//!
//! A close-on-exec, non-blocking userfaultfd with exactly one region
//! registered in MISSING mode. Write-protect and minor faults are never
//! requested, so the only serviceable record is a missing-page fault.
//!
//! `wait()` polls the userfaultfd with no timeout. If a `ShutdownSignal`
//! is attached its eventfd is polled as well; a pending fault always wins
//! over shutdown so no faulting thread is left blocked.

use lazypage_core::channel::{FaultChannel, Readiness};
use lazypage_core::error::{PagerError, Result};
use lazypage_core::event::{Access, EventKind, FaultEvent};
use lazypage_core::region::RegionDescriptor;
use lazypage_core::{kdebug, ktrace};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use userfaultfd::{Event, FaultKind, IoctlFlags, ReadWrite, Uffd, UffdBuilder};

use std::os::fd::BorrowedFd;
use std::os::unix::io::AsRawFd;

use crate::eventfd_shutdown::ShutdownSignal;
use crate::mmap_region::MmapRegion;

pub struct UserfaultChannel {
    uffd: Uffd,
    registered: Option<RegionDescriptor>,
    shutdown: Option<ShutdownSignal>,
}

impl UserfaultChannel {
    /// Create the userfaultfd and complete the UFFDIO_API handshake.
    pub fn open() -> Result<Self> {
        let uffd = UffdBuilder::new()
            .close_on_exec(true)
            .non_blocking(true)
            .create()
            .map_err(|e| PagerError::ChannelCreate(uffd_errno(&e)))?;
        kdebug!("userfaultfd open on fd {}", uffd.as_raw_fd());
        Ok(Self { uffd, registered: None, shutdown: None })
    }

    /// Bind `region` to this channel for missing-page faults.
    ///
    /// From here on the first touch of every page in the region produces
    /// one event on this channel and blocks until it is resolved.
    pub fn register(&mut self, region: &MmapRegion) -> Result<()> {
        if self.registered.is_some() {
            return Err(PagerError::AlreadyRegistered);
        }
        let ioctls = self
            .uffd
            .register(region.base() as *mut libc::c_void, region.len())
            .map_err(|e| PagerError::Register(uffd_errno(&e)))?;
        if !ioctls.contains(IoctlFlags::COPY) {
            return Err(PagerError::Register(libc::ENOTSUP));
        }
        let desc = region.descriptor();
        kdebug!("registered {} for missing-page faults", desc);
        self.registered = Some(desc);
        Ok(())
    }

    /// Multiplex `signal` with the fault descriptor in `wait()`.
    pub fn attach_shutdown(&mut self, signal: ShutdownSignal) {
        self.shutdown = Some(signal);
    }

    pub fn registered(&self) -> Option<RegionDescriptor> {
        self.registered
    }
}

impl FaultChannel for UserfaultChannel {
    fn wait(&mut self) -> Result<Readiness> {
        loop {
            // Safety: both descriptors are owned by self and outlive `fds`.
            let uffd_fd = unsafe { BorrowedFd::borrow_raw(self.uffd.as_raw_fd()) };
            let mut fds = vec![PollFd::new(uffd_fd, PollFlags::POLLIN)];
            if let Some(sig) = &self.shutdown {
                let sig_fd = unsafe { BorrowedFd::borrow_raw(sig.raw_fd()) };
                fds.push(PollFd::new(sig_fd, PollFlags::POLLIN));
            }

            let nready = match poll(&mut fds, PollTimeout::NONE) {
                Ok(n) => n,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(PagerError::ChannelRead(format!("poll: {}", e))),
            };

            let revents = fds[0].revents().unwrap_or(PollFlags::empty());
            ktrace!(
                "poll() returns: nready = {}; POLLIN = {}; POLLERR = {}",
                nready,
                revents.contains(PollFlags::POLLIN),
                revents.contains(PollFlags::POLLERR)
            );

            if revents.contains(PollFlags::POLLIN) {
                return Ok(Readiness::Event);
            }
            if revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL) {
                return Err(PagerError::ChannelUnreadable);
            }
            let stop = fds
                .get(1)
                .and_then(|fd| fd.revents())
                .map_or(false, |r| r.contains(PollFlags::POLLIN));
            if stop {
                return Ok(Readiness::Shutdown);
            }
        }
    }

    fn read_event(&mut self) -> Result<Option<FaultEvent>> {
        match self.uffd.read_event() {
            Ok(Some(event)) => Ok(Some(decode_event(event))),
            Ok(None) => Ok(None),
            Err(userfaultfd::Error::ReadEof) => Err(PagerError::ChannelEof),
            Err(e) => Err(PagerError::ChannelRead(e.to_string())),
        }
    }

    unsafe fn copy_in(&mut self, src: &[u8], dst: usize) -> Result<usize> {
        self.uffd
            .copy(src.as_ptr() as *const libc::c_void, dst as *mut libc::c_void, src.len(), true)
            .map_err(|e| PagerError::Copy { addr: dst, errno: uffd_errno(&e) })
    }
}

fn decode_event(event: Event) -> FaultEvent {
    match event {
        Event::Pagefault { kind, rw, addr, .. } => decode_pagefault(kind, rw, addr as usize),
        Event::Fork { .. } => other(EventKind::Fork, 0),
        Event::Remap { from, .. } => other(EventKind::Remap, from as usize),
        Event::Remove { start, .. } => other(EventKind::Remove, start as usize),
        Event::Unmap { start, .. } => other(EventKind::Unmap, start as usize),
        #[allow(unreachable_patterns)]
        _ => other(EventKind::OtherFault, 0),
    }
}

fn decode_pagefault(kind: FaultKind, rw: ReadWrite, addr: usize) -> FaultEvent {
    let access = match rw {
        ReadWrite::Read => Access::Read,
        ReadWrite::Write => Access::Write,
    };
    #[allow(unreachable_patterns)]
    let kind = match kind {
        FaultKind::Missing => EventKind::MissingPage,
        FaultKind::WriteProtected => EventKind::WriteProtected,
        _ => EventKind::OtherFault,
    };
    FaultEvent { kind, addr, access }
}

#[inline]
fn other(kind: EventKind, addr: usize) -> FaultEvent {
    FaultEvent { kind, addr, access: Access::Read }
}

fn uffd_errno(e: &userfaultfd::Error) -> i32 {
    match e {
        userfaultfd::Error::SystemError(errno) => *errno as i32,
        userfaultfd::Error::CopyFailed(errno) => *errno as i32,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmap_region::system_page_size;

    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// userfaultfd(2) is often blocked in containers; those runs skip.
    fn open_or_skip() -> Option<UserfaultChannel> {
        match UserfaultChannel::open() {
            Ok(ch) => Some(ch),
            Err(e) => {
                eprintln!("skipping: {}", e);
                None
            }
        }
    }

    #[test]
    fn test_decode_pagefault_kinds() {
        let ev = decode_pagefault(FaultKind::Missing, ReadWrite::Read, 0x7f00_0000_1234);
        assert_eq!(ev.kind, EventKind::MissingPage);
        assert_eq!(ev.access, Access::Read);
        assert_eq!(ev.addr, 0x7f00_0000_1234);
        assert_eq!(ev.flags(), 0);

        let ev = decode_pagefault(FaultKind::WriteProtected, ReadWrite::Write, 0x1000);
        assert_eq!(ev.kind, EventKind::WriteProtected);
        assert_eq!(ev.access, Access::Write);
        assert_eq!(ev.flags(), lazypage_core::event::FLAG_WRITE | lazypage_core::event::FLAG_WP);
    }

    #[test]
    fn test_register_twice_is_rejected() {
        let Some(mut ch) = open_or_skip() else { return };
        let ps = system_page_size();
        let region = MmapRegion::reserve(2 * ps, ps).unwrap();
        ch.register(&region).unwrap();
        assert_eq!(ch.registered(), Some(region.descriptor()));

        assert!(matches!(ch.register(&region), Err(PagerError::AlreadyRegistered)));

        let other = MmapRegion::reserve(ps, ps).unwrap();
        assert!(matches!(ch.register(&other), Err(PagerError::AlreadyRegistered)));
    }

    #[test]
    fn test_read_event_without_fault_is_spurious() {
        let Some(mut ch) = open_or_skip() else { return };
        assert!(ch.read_event().unwrap().is_none());
    }

    #[test]
    fn test_shutdown_wakes_wait() {
        let Some(mut ch) = open_or_skip() else { return };
        let sig = ShutdownSignal::create().unwrap();
        ch.attach_shutdown(sig.clone());
        sig.trigger().unwrap();
        assert_eq!(ch.wait().unwrap(), Readiness::Shutdown);
    }

    #[test]
    fn test_service_one_fault_by_hand() {
        let Some(mut ch) = open_or_skip() else { return };
        let ps = system_page_size();
        let region = Arc::new(MmapRegion::reserve(2 * ps, ps).unwrap());
        ch.register(&region).unwrap();

        let seen = Arc::new(AtomicU8::new(0));
        let toucher = {
            let region = Arc::clone(&region);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                // Faults; blocks until the copy-in below.
                let b = region.read_byte(ps + 100).unwrap();
                seen.store(b, Ordering::SeqCst);
            })
        };

        let event = loop {
            assert_eq!(ch.wait().unwrap(), Readiness::Event);
            if let Some(ev) = ch.read_event().unwrap() {
                break ev;
            }
        };
        assert_eq!(event.kind, EventKind::MissingPage);
        assert_eq!(event.access, Access::Read);
        let base = event.page_base(ps);
        assert_eq!(base, region.base() as usize + ps);

        let mut page = crate::page_buffer::PageBuffer::new(ps).unwrap();
        page.as_mut_slice().fill(b'Q');
        let copied = unsafe { ch.copy_in(page.as_slice(), base).unwrap() };
        assert_eq!(copied, ps);

        toucher.join().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), b'Q');
    }
}
