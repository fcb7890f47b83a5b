//! `ShutdownSignal`: wakes a fault channel's wait for a clean stop.
//!
//! Wraps an eventfd. The channel polls it next to the userfaultfd; once
//! `trigger()` has been called it stays readable (nobody drains it), so
//! every later wait sees the request too. Clones share the descriptor.

use lazypage_core::error::{last_errno, PagerError, Result};

use std::os::unix::io::RawFd;
use std::sync::Arc;

struct EventFd {
    fd: RawFd,
}

impl Drop for EventFd {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
            self.fd = -1;
        }
    }
}

#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<EventFd>,
}

impl ShutdownSignal {
    /// Create a new eventfd (`EFD_NONBLOCK | EFD_CLOEXEC`).
    pub fn create() -> Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(PagerError::ChannelCreate(last_errno()));
        }
        Ok(Self { inner: Arc::new(EventFd { fd }) })
    }

    /// Raw descriptor for polling.
    pub fn raw_fd(&self) -> RawFd {
        self.inner.fd
    }

    /// Request shutdown. Never blocks.
    pub fn trigger(&self) -> Result<()> {
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.inner.fd,
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = last_errno();
            // Counter saturated: a wakeup is already pending.
            if errno == libc::EAGAIN {
                return Ok(());
            }
            return Err(PagerError::ChannelRead(format!("eventfd write: errno {}", errno)));
        }
        Ok(())
    }

    /// Whether `trigger()` has been called, without consuming it.
    pub fn is_triggered(&self) -> bool {
        let mut pfd = libc::pollfd { fd: self.inner.fd, events: libc::POLLIN, revents: 0 };
        let n = unsafe { libc::poll(&mut pfd, 1, 0) };
        n > 0 && (pfd.revents & libc::POLLIN) != 0
    }
}
