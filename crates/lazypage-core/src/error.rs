//! Error types for lazypage.
//!
//! Every error is fatal to the process that hits it. The variants exist so
//! the diagnostic says which stage failed.

use std::fmt;
use std::io;

use crate::wire::WireError;

/// Result type for lazypage operations
pub type Result<T> = std::result::Result<T, PagerError>;

/// Network stage that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetOp {
    Bind,
    Accept,
    Connect,
    Send,
    Receive,
}

impl fmt::Display for NetOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetOp::Bind => "bind",
            NetOp::Accept => "accept",
            NetOp::Connect => "connect",
            NetOp::Send => "send",
            NetOp::Receive => "receive",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum PagerError {
    /// Bad arguments or console input shape.
    Usage(String),

    /// mmap of the region or scratch page failed.
    Reserve(i32),
    /// madvise failed.
    Advise(i32),
    /// Peer could not map at the requested address and strict placement is on.
    PlacementRefused { requested: u64, actual: u64 },

    /// userfaultfd(2) or UFFDIO_API failed.
    ChannelCreate(i32),
    /// UFFDIO_REGISTER failed.
    Register(i32),
    /// A region is already bound to this channel.
    AlreadyRegistered,
    /// Fault handler thread could not be spawned.
    Spawn(i32),

    /// The channel reported end-of-stream.
    ChannelEof,
    /// poll reported an error or hangup without readable data.
    ChannelUnreadable,
    /// poll or read on the channel failed.
    ChannelRead(String),
    /// An event other than a missing-page fault arrived.
    UnexpectedEvent(&'static str),

    /// UFFDIO_COPY failed.
    Copy { addr: usize, errno: i32 },

    /// Socket operation failed.
    Net { op: NetOp, source: io::Error },
    /// Descriptor record could not be decoded.
    Wire(WireError),

    /// Console stdin/stdout failed.
    Console(io::Error),
}

impl PagerError {
    pub fn net(op: NetOp, source: io::Error) -> Self {
        PagerError::Net { op, source }
    }

    /// Process exit code for this error. All fatal causes share one code.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl fmt::Display for PagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(msg) => write!(f, "usage: {}", msg),
            Self::Reserve(e) => write!(f, "mmap failed: errno {}", e),
            Self::Advise(e) => write!(f, "madvise failed: errno {}", e),
            Self::PlacementRefused { requested, actual } => write!(
                f,
                "requested address {:#x} not available (kernel chose {:#x})",
                requested, actual
            ),
            Self::ChannelCreate(e) => write!(f, "userfaultfd setup failed: errno {}", e),
            Self::Register(e) => write!(f, "ioctl-UFFDIO_REGISTER failed: errno {}", e),
            Self::AlreadyRegistered => write!(f, "a region is already registered on this channel"),
            Self::Spawn(e) => write!(f, "failed to spawn fault handler: errno {}", e),
            Self::ChannelEof => write!(f, "EOF on userfaultfd"),
            Self::ChannelUnreadable => write!(f, "userfaultfd reported an error condition"),
            Self::ChannelRead(msg) => write!(f, "read on userfaultfd failed: {}", msg),
            Self::UnexpectedEvent(kind) => write!(f, "unexpected event on userfaultfd: {}", kind),
            Self::Copy { addr, errno } => {
                write!(f, "ioctl-UFFDIO_COPY at {:#x} failed: errno {}", addr, errno)
            }
            Self::Net { op, source } => write!(f, "{} failed: {}", op, source),
            Self::Wire(e) => write!(f, "bad descriptor record: {}", e),
            Self::Console(e) => write!(f, "console I/O failed: {}", e),
        }
    }
}

impl std::error::Error for PagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Net { source, .. } => Some(source),
            Self::Wire(e) => Some(e),
            Self::Console(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WireError> for PagerError {
    fn from(e: WireError) -> Self {
        PagerError::Wire(e)
    }
}

/// errno of the last failed libc call on this thread
#[inline]
pub fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = PagerError::Copy { addr: 0x7f00_0000_1000, errno: 17 };
        assert_eq!(
            format!("{}", e),
            "ioctl-UFFDIO_COPY at 0x7f0000001000 failed: errno 17"
        );

        let e = PagerError::net(NetOp::Connect, io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(format!("{}", e).starts_with("connect failed"));
    }

    #[test]
    fn test_wire_conversion() {
        let err: PagerError = WireError::BadMagic.into();
        assert!(matches!(err, PagerError::Wire(WireError::BadMagic)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_single_exit_code() {
        assert_eq!(PagerError::ChannelEof.exit_code(), 1);
        assert_eq!(PagerError::Usage("x".into()).exit_code(), 1);
    }
}
