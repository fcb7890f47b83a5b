//! lazypage: user-space demand paging driver
//!
//! Reserves a region with no backing, registers it with userfaultfd and
//! lets a fault-handler thread supply every page on first touch.
//!
//! Usage:
//!     cargo build --release -p lazypage
//!     ./target/release/lazypage <pages>      # single process, console
//!     ./target/release/lazypage originator   # prompt for pages, serve descriptor, console
//!     ./target/release/lazypage peer         # fetch descriptor, map, touch every page
//!
//! `server` and `client` are accepted for `originator` and `peer`.
//!
//! The descriptor goes over TCP as a framed record by default (`LZPG`
//! magic, big-endian length, address and size). The bare 16-byte
//! host-order `{address, length}` record of the older C demo needs
//! `LAZYPAGE_WIRE=raw` on this side; without it the two will not talk.
//!
//! Environment: see `PagerConfig::from_env` (LAZYPAGE_POLICY, LAZYPAGE_PORT,
//! LAZYPAGE_WIRE, LAZYPAGE_LOG_LEVEL=debug for per-fault lines, ...).

mod console;

use lazypage_core::config::PagerConfig;
use lazypage_core::error::{PagerError, Result};
use lazypage_core::policy::PolicyKind;
use lazypage_core::region::{region_len, Placement};
use lazypage_core::{kerror, kinfo};

use lazypage_executor::{exit_on_fatal, spawn_dispatcher, DispatcherHandle, FaultDispatcher};
use lazypage_module::content_policy::ContentPolicy;
use lazypage_module::handshake::{Originator, Peer};
use lazypage_module::mmap_region::{system_page_size, MmapRegion};
use lazypage_module::uffd_channel::UserfaultChannel;

use console::{render_preview, Console};

use std::io::{self, BufRead, Write};

const USAGE: &str = "lazypage <pages> | originator | peer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Single(usize),
    Originator,
    Peer,
}

impl Mode {
    fn parse(args: &[String]) -> Result<Self> {
        let [_, arg] = args else {
            return Err(PagerError::Usage(USAGE.to_string()));
        };
        match arg.as_str() {
            "originator" | "server" => Ok(Mode::Originator),
            "peer" | "client" => Ok(Mode::Peer),
            n => parse_pages(n).map(Mode::Single).map_err(|_| PagerError::Usage(USAGE.to_string())),
        }
    }
}

fn parse_pages(s: &str) -> Result<usize> {
    match s.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(PagerError::Usage(format!("'{}' is not a positive page count", s.trim()))),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        kerror!("{}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(args: &[String]) -> Result<()> {
    let mode = Mode::parse(args)?;
    let config = PagerConfig::from_env();
    match mode {
        Mode::Single(pages) => run_single(pages, config.default_policy(PolicyKind::Rotating)),
        Mode::Originator => run_originator(config.default_policy(PolicyKind::Static)),
        Mode::Peer => run_peer(config.default_policy(PolicyKind::Static)),
    }
}

/// Open a channel on `region` and move a dispatcher for it onto its own thread.
fn start_fault_handler(region: &MmapRegion, config: &PagerConfig) -> Result<DispatcherHandle> {
    let mut channel = UserfaultChannel::open()?;
    channel.register(region)?;
    let policy = ContentPolicy::from_config(config);
    kinfo!("Memory registered, policy = {}", policy.kind());
    let dispatcher = FaultDispatcher::new(channel, policy, region.page_size())?;
    spawn_dispatcher(dispatcher, exit_on_fatal)
}

fn run_single(pages: usize, config: PagerConfig) -> Result<()> {
    let page_size = system_page_size();
    let region = MmapRegion::reserve(region_len(pages, page_size)?, page_size)?;
    kinfo!("Address returned by mmap() = {:#x}", region.base() as usize);
    let _handler = start_fault_handler(&region, &config)?;

    let stdin = io::stdin();
    Console::new(&region, config.preview_bytes).run(stdin.lock(), io::stdout().lock())
}

fn run_originator(config: PagerConfig) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    prompt("Enter number of pages")?;
    let mut line = String::new();
    if input.read_line(&mut line).map_err(PagerError::Console)? == 0 {
        return Err(PagerError::Usage("no page count given".to_string()));
    }
    let pages = parse_pages(&line)?;
    kinfo!("Number of pages are: {}", pages);

    let originator = Originator::bind(config.port, config.wire)?;
    let page_size = system_page_size();
    let region = MmapRegion::reserve(region_len(pages, page_size)?, page_size)?;
    kinfo!("Address returned by mmap() = {:#x}", region.base() as usize);
    let _handler = start_fault_handler(&region, &config)?;

    kinfo!("Waiting for peer on port {} ({} records)", config.port, config.wire);
    originator.send_descriptor(&region.descriptor())?;

    Console::new(&region, config.preview_bytes).run(&mut input, io::stdout().lock())
}

fn run_peer(config: PagerConfig) -> Result<()> {
    let mut peer = Peer::connect(&config.peer_host, config.port, config.connect_retry, config.wire)?;
    let desc = peer.receive_descriptor()?;

    let page_size = system_page_size();
    let region = MmapRegion::reserve_from(&desc, page_size, config.strict_placement)?;
    match region.placement() {
        Placement::Relocated { requested, actual } => {
            kinfo!("Address shared by mmap() = {:#x} (requested {:#x})", actual, requested)
        }
        _ => kinfo!("Address shared by mmap() = {:#x}", region.base() as usize),
    }
    let _handler = start_fault_handler(&region, &config)?;

    let mut out = io::stdout().lock();
    let mut buf = vec![0u8; page_size];
    for i in 0..region.pages() {
        region.read_page(i, &mut buf)?;
        let uniform = buf.iter().all(|&b| b == buf[0]);
        writeln!(
            out,
            "[*] Page {}: first byte {:#04x}, uniform = {}, preview = \"{}\"",
            i,
            buf[0],
            uniform,
            render_preview(&buf, config.preview_bytes)
        )
        .map_err(PagerError::Console)?;
    }
    Ok(())
}

fn prompt(line: &str) -> Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", line).and_then(|_| out.flush()).map_err(PagerError::Console)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(Mode::parse(&args(&["lazypage", "4"])).unwrap(), Mode::Single(4));
        assert_eq!(Mode::parse(&args(&["lazypage", "server"])).unwrap(), Mode::Originator);
        assert_eq!(Mode::parse(&args(&["lazypage", "originator"])).unwrap(), Mode::Originator);
        assert_eq!(Mode::parse(&args(&["lazypage", "client"])).unwrap(), Mode::Peer);
        assert_eq!(Mode::parse(&args(&["lazypage", "peer"])).unwrap(), Mode::Peer);
    }

    #[test]
    fn test_mode_parse_rejects_bad_invocations() {
        let cases: [&[&str]; 5] = [
            &["lazypage"],
            &["lazypage", "0"],
            &["lazypage", "-3"],
            &["lazypage", "x"],
            &["lazypage", "1", "2"],
        ];
        for bad in cases {
            assert!(matches!(Mode::parse(&args(bad)), Err(PagerError::Usage(_))), "{:?}", bad);
        }
    }

    #[test]
    fn test_parse_pages_trims_newline() {
        assert_eq!(parse_pages("3\n").unwrap(), 3);
        assert!(parse_pages("\n").is_err());
    }
}
