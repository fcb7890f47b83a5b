//! # lazypage-core
//!
//! Core types and traits for lazypage, a user-space demand pager built on
//! Linux `userfaultfd`.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! The Linux implementations live in `lazypage-module`, the dispatch loop
//! in `lazypage-executor`.
//!
//! ## Modules
//!
//! - `region` - Region descriptor, page arithmetic, page selection
//! - `event` - Decoded fault events
//! - `channel` - Fault-notification channel trait
//! - `policy` - Page content policy trait and policy selection
//! - `wire` - Region descriptor wire codec (framed and raw)
//! - `config` - Runtime configuration with env overrides
//! - `error` - Error types
//! - `kprint` - leveled stderr macros tagged with the thread name
//! - `env` - Environment variable utilities

pub mod region;
pub mod event;
pub mod channel;
pub mod policy;
pub mod wire;
pub mod config;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use region::{page_align_down, region_len, PageSelector, Placement, RegionDescriptor};
pub use event::{Access, EventKind, FaultEvent};
pub use channel::{FaultChannel, Readiness};
pub use policy::{PagePolicy, PolicyKind};
pub use wire::{read_descriptor, write_descriptor, WireError, WireFormat};
pub use config::PagerConfig;
pub use error::{NetOp, PagerError, Result};
pub use env::{env_get, env_get_bool, env_get_str};

/// Protocol and demo constants
pub mod constants {
    /// TCP port the originator listens on
    pub const DEFAULT_PORT: u16 = 8081;

    /// Address the peer connects to
    pub const DEFAULT_PEER_HOST: &str = "127.0.0.1";

    /// Delay between peer connection attempts (ms)
    pub const CONNECT_RETRY_MS: u64 = 2000;

    /// First byte of the rotating fill
    pub const FILL_BASE: u8 = b'A';

    /// Number of distinct bytes the rotating fill cycles through
    pub const FILL_CYCLE: u64 = 20;

    /// Bytes of a page shown by the console when dumping it
    pub const PREVIEW_BYTES: usize = 64;

    /// Stride used by the walkthrough when touching a region
    pub const WALK_STRIDE: usize = 1024;
}
