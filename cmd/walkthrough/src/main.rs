//! Scripted demand paging walkthrough
//!
//! Runs a fixed sequence of touches over a fresh region and prints the byte
//! seen at every 1 KiB step, so each fault (and each absence of one) shows
//! up in the output.
//!
//! Usage:
//!     ./target/release/walkthrough <pages>
//!
//! Steps:
//!     #1 read            every page faults, rotating fill
//!     #2 read again      no faults, same bytes
//!     #3 release + read  every page faults again, next fill byte
//!     #4 read again      no faults
//!     #5 release + '@'   write faults; the store lands on the fresh page
//!     #6 read            '@' everywhere written
//!     #7 '^'             pages are backed, no faults
//!     #8 read            '^'

use lazypage_core::config::PagerConfig;
use lazypage_core::constants::WALK_STRIDE;
use lazypage_core::error::{PagerError, Result};
use lazypage_core::policy::PolicyKind;
use lazypage_core::region::{region_len, PageSelector};
use lazypage_core::{kerror, kinfo, kprintln};

use lazypage_executor::{exit_on_fatal, spawn_dispatcher, FaultDispatcher};
use lazypage_module::content_policy::ContentPolicy;
use lazypage_module::mmap_region::{system_page_size, MmapRegion};
use lazypage_module::uffd_channel::UserfaultChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Read,
    ReleaseThenRead,
    ReleaseThenWrite(u8),
    Write(u8),
}

const STEPS: [Action; 8] = [
    Action::Read,
    Action::Read,
    Action::ReleaseThenRead,
    Action::Read,
    Action::ReleaseThenWrite(b'@'),
    Action::Read,
    Action::Write(b'^'),
    Action::Read,
];

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        kerror!("{}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(args: &[String]) -> Result<()> {
    let pages = match args {
        [_, n] => n.parse::<usize>().ok().filter(|&n| n > 0),
        _ => None,
    }
    .ok_or_else(|| PagerError::Usage("walkthrough <pages>".to_string()))?;

    let config = PagerConfig::from_env().default_policy(PolicyKind::Rotating);
    let page_size = system_page_size();
    let region = MmapRegion::reserve(region_len(pages, page_size)?, page_size)?;
    kinfo!("Address returned by mmap() = {:#x}", region.base() as usize);

    let mut channel = UserfaultChannel::open()?;
    channel.register(&region)?;
    let dispatcher = FaultDispatcher::new(channel, ContentPolicy::from_config(&config), page_size)?;
    let _handler = spawn_dispatcher(dispatcher, exit_on_fatal)?;

    for (i, &action) in STEPS.iter().enumerate() {
        if i > 0 {
            println!("-----------------------------------------------------");
        }
        step(&region, i + 1, action)?;
    }
    kprintln!("walkthrough complete");
    Ok(())
}

/// Print one line per stride: what the step did and the byte now there.
fn step(region: &MmapRegion, n: usize, action: Action) -> Result<()> {
    if matches!(action, Action::ReleaseThenRead | Action::ReleaseThenWrite(_)) {
        region.advise_not_needed(PageSelector::All)?;
    }
    let verb = match action {
        Action::Read | Action::ReleaseThenRead => "Read",
        Action::ReleaseThenWrite(_) | Action::Write(_) => "write",
    };
    for offset in (0..region.len()).step_by(WALK_STRIDE) {
        if let Action::ReleaseThenWrite(b) | Action::Write(b) = action {
            let len = WALK_STRIDE.min(region.len() - offset);
            region.fill(offset, len, b)?;
        }
        let c = region.read_byte(offset)?;
        println!(
            "#{}. {} address {:#x} in main(): {}",
            n,
            verb,
            region.base() as usize + offset,
            c as char
        );
    }
    Ok(())
}
