//! # lazypage-module: Default implementations
//!
//! This crate provides the default implementation for every lazypage
//! trait and the OS-facing pieces the traits sit on.
//!
//! ## Default stack
//!
//! | Concern              | Default Impl        | Backed by                       |
//! |----------------------|---------------------|---------------------------------|
//! | Region reservation   | MmapRegion          | mmap / madvise                  |
//! | Scratch page         | PageBuffer          | one-page anonymous mmap         |
//! | FaultChannel         | UserfaultChannel    | userfaultfd (MISSING mode)      |
//! | Shutdown source      | ShutdownSignal      | eventfd                         |
//! | PagePolicy           | ContentPolicy       | RotatingFill / StaticBuffer     |
//! | Handshake            | Originator / Peer   | TCP                             |

pub mod mmap_region;
pub mod page_buffer;
pub mod rotating_fill;
pub mod static_buffer;
pub mod content_policy;
pub mod handshake;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod uffd_channel;
        pub mod eventfd_shutdown;

        pub use uffd_channel::UserfaultChannel;
        pub use eventfd_shutdown::ShutdownSignal;
    }
}

pub use mmap_region::{system_page_size, MmapRegion};
pub use page_buffer::PageBuffer;
pub use rotating_fill::RotatingFill;
pub use static_buffer::StaticBuffer;
pub use content_policy::ContentPolicy;
pub use handshake::{Originator, Peer};
