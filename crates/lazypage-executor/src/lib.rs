//! # lazypage-executor: the fault dispatch loop
//!
//! The dispatcher runs on a dedicated thread and executes this loop:
//!
//! ```text
//! loop {
//!     1. Wait (no timeout) until the channel is readable
//!          → shutdown requested and nothing pending? return stats
//!     2. Read exactly one fault record (none? spurious wakeup, go to 1)
//!     3. Reject anything that is not a missing-page fault
//!     4. Round the faulting address down to its page
//!     5. Let the policy fill the scratch page
//!     6. Copy the scratch page in (one page, no retry)
//!     7. Bump the fault counter
//! }
//! ```
//!
//! Every error ends the loop. The binaries turn that into process exit.
//!
//! The scratch page and the fault counter are private to one
//! `FaultDispatcher`; nothing outside the dispatch thread can reach them.

use lazypage_core::channel::{FaultChannel, Readiness};
use lazypage_core::error::{PagerError, Result};
use lazypage_core::event::{Access, EventKind, FaultEvent};
use lazypage_core::policy::PagePolicy;
use lazypage_core::{kdebug, kerror, kinfo, ktrace};
use lazypage_module::page_buffer::PageBuffer;

use std::thread::{self, JoinHandle};

/// Counters reported when a dispatcher stops cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub faults_serviced: u64,
    pub read_faults: u64,
    pub write_faults: u64,
    pub spurious_wakeups: u64,
}

/// One channel, one policy, one scratch page, one counter.
pub struct FaultDispatcher<C, P>
where
    C: FaultChannel,
    P: PagePolicy,
{
    channel: C,
    policy: P,
    page: PageBuffer,
    page_size: usize,
    stats: DispatchStats,
}

impl<C, P> FaultDispatcher<C, P>
where
    C: FaultChannel,
    P: PagePolicy,
{
    /// Allocate the scratch page and prime the policy with it.
    pub fn new(channel: C, mut policy: P, page_size: usize) -> Result<Self> {
        if !page_size.is_power_of_two() {
            return Err(PagerError::Usage(format!("page size {} is not a power of two", page_size)));
        }
        let mut page = PageBuffer::new(page_size)?;
        policy.prime(page.as_mut_slice());
        Ok(Self { channel, policy, page, page_size, stats: DispatchStats::default() })
    }

    /// Faults serviced so far by this instance.
    #[inline]
    pub fn faults_serviced(&self) -> u64 {
        self.stats.faults_serviced
    }

    #[inline]
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Run until the channel fails or shutdown is requested.
    pub fn run(&mut self) -> Result<DispatchStats> {
        kdebug!("fault handler running, policy = {}", self.policy.name());
        loop {
            // ── Step 1: Idle ──
            match self.channel.wait()? {
                Readiness::Shutdown => {
                    kdebug!("fault handler stopping after {} faults", self.stats.faults_serviced);
                    return Ok(self.stats);
                }
                Readiness::Event => {}
            }

            // ── Step 2: Read one record ──
            let Some(event) = self.channel.read_event()? else {
                self.stats.spurious_wakeups += 1;
                ktrace!("spurious wakeup");
                continue;
            };

            // ── Steps 3-7: Servicing ──
            self.service(&event)?;
        }
    }

    /// Resolve one fault: validate, fill, copy in, count.
    pub fn service(&mut self, event: &FaultEvent) -> Result<()> {
        if event.kind != EventKind::MissingPage {
            return Err(PagerError::UnexpectedEvent(event.kind.name()));
        }
        kdebug!("{}", event);

        let dst = event.page_base(self.page_size);
        let serviced = self.stats.faults_serviced;
        self.policy.fill(self.page.as_mut_slice(), event, serviced);

        // Safety: the kernel only reports addresses inside the registered
        // range, and dst is page aligned, so one page fits.
        let copied = unsafe { self.channel.copy_in(self.page.as_slice(), dst)? };
        kdebug!("(uffdio_copy.copy returned {})", copied);

        self.stats.faults_serviced += 1;
        match event.access {
            Access::Read => self.stats.read_faults += 1,
            Access::Write => self.stats.write_faults += 1,
        }
        Ok(())
    }
}

/// Handle to a running fault handler thread.
pub struct DispatcherHandle {
    handle: JoinHandle<Option<DispatchStats>>,
}

impl DispatcherHandle {
    /// Wait for the thread. `None` if it ended in error.
    pub fn join(self) -> Option<DispatchStats> {
        self.handle.join().ok().flatten()
    }
}

/// Move `dispatcher` onto its own `fault-handler` thread.
///
/// If the loop fails, `on_fatal` runs on that thread with the error.
pub fn spawn_dispatcher<C, P, F>(dispatcher: FaultDispatcher<C, P>, on_fatal: F) -> Result<DispatcherHandle>
where
    C: FaultChannel + 'static,
    P: PagePolicy + 'static,
    F: FnOnce(PagerError) + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("fault-handler".to_string())
        .spawn(move || {
            let mut dispatcher = dispatcher;
            match dispatcher.run() {
                Ok(stats) => Some(stats),
                Err(e) => {
                    on_fatal(e);
                    None
                }
            }
        })
        .map_err(|e| PagerError::Spawn(e.raw_os_error().unwrap_or(0)))?;
    kinfo!("fault handler thread started");
    Ok(DispatcherHandle { handle })
}

/// `on_fatal` hook for binaries: report and end the whole process.
pub fn exit_on_fatal(err: PagerError) {
    kerror!("{}", err);
    std::process::exit(err.exit_code());
}
