//! Region descriptor wire codec.
//!
//! Two record layouts:
//!
//! ```text
//! Framed (default, 24 bytes):
//!   +--------+------------+--------------+--------------+
//!   | "LZPG" | len: u32BE | addr: u64 BE | size: u64 BE |
//!   +--------+------------+--------------+--------------+
//!
//! Raw (16 bytes, host layout, no framing):
//!   +------------------+------------------+
//!   | addr: u64 native | size: u64 native |
//!   +------------------+------------------+
//! ```
//!
//! Raw is only meaningful between two processes on the same architecture.

use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use crate::error::{NetOp, PagerError, Result};
use crate::region::RegionDescriptor;

pub const FRAME_MAGIC: [u8; 4] = *b"LZPG";
pub const FRAME_HEADER_LEN: usize = 8;
pub const PAYLOAD_LEN: usize = 16;
pub const RAW_RECORD_LEN: usize = PAYLOAD_LEN;
pub const FRAMED_RECORD_LEN: usize = FRAME_HEADER_LEN + PAYLOAD_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Framed,
    Raw,
}

impl WireFormat {
    /// Size of one full record on the wire
    pub fn record_len(&self) -> usize {
        match self {
            WireFormat::Framed => FRAMED_RECORD_LEN,
            WireFormat::Raw => RAW_RECORD_LEN,
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WireFormat::Framed => "framed",
            WireFormat::Raw => "raw",
        })
    }
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "framed" => Ok(WireFormat::Framed),
            "raw" => Ok(WireFormat::Raw),
            other => Err(format!("unknown wire format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Stream ended before a whole record arrived.
    Truncated { got: usize, expected: usize },
    /// Framed record did not start with the magic.
    BadMagic,
    /// Framed record announced a payload of the wrong size.
    BadLength(u32),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Truncated { got, expected } => {
                write!(f, "truncated record ({} of {} bytes)", got, expected)
            }
            WireError::BadMagic => write!(f, "bad frame magic"),
            WireError::BadLength(n) => {
                write!(f, "payload length {} (expected {})", n, PAYLOAD_LEN)
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Encode one record.
pub fn encode(desc: &RegionDescriptor, format: WireFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(format.record_len());
    match format {
        WireFormat::Framed => {
            out.extend_from_slice(&FRAME_MAGIC);
            out.extend_from_slice(&(PAYLOAD_LEN as u32).to_be_bytes());
            out.extend_from_slice(&desc.addr.to_be_bytes());
            out.extend_from_slice(&desc.len.to_be_bytes());
        }
        WireFormat::Raw => {
            out.extend_from_slice(&desc.addr.to_ne_bytes());
            out.extend_from_slice(&desc.len.to_ne_bytes());
        }
    }
    out
}

/// Decode one complete record.
pub fn decode(buf: &[u8], format: WireFormat) -> std::result::Result<RegionDescriptor, WireError> {
    let expected = format.record_len();
    if buf.len() < expected {
        return Err(WireError::Truncated { got: buf.len(), expected });
    }
    match format {
        WireFormat::Framed => {
            if buf[..4] != FRAME_MAGIC {
                return Err(WireError::BadMagic);
            }
            let len = u32::from_be_bytes(field(buf, 4));
            if len as usize != PAYLOAD_LEN {
                return Err(WireError::BadLength(len));
            }
            Ok(RegionDescriptor {
                addr: u64::from_be_bytes(field(buf, 8)),
                len: u64::from_be_bytes(field(buf, 16)),
            })
        }
        WireFormat::Raw => Ok(RegionDescriptor {
            addr: u64::from_ne_bytes(field(buf, 0)),
            len: u64::from_ne_bytes(field(buf, 8)),
        }),
    }
}

#[inline]
fn field<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

/// Send one record. A single write, no acknowledgement.
pub fn write_descriptor<W: Write>(w: &mut W, desc: &RegionDescriptor, format: WireFormat) -> Result<()> {
    let record = encode(desc, format);
    w.write_all(&record).map_err(|e| PagerError::net(NetOp::Send, e))?;
    w.flush().map_err(|e| PagerError::net(NetOp::Send, e))
}

/// Block until exactly one record has been received.
pub fn read_descriptor<R: Read>(r: &mut R, format: WireFormat) -> Result<RegionDescriptor> {
    let expected = format.record_len();
    let mut buf = vec![0u8; expected];
    let mut got = 0;
    while got < expected {
        match r.read(&mut buf[got..]) {
            Ok(0) => return Err(WireError::Truncated { got, expected }.into()),
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PagerError::net(NetOp::Receive, e)),
        }
    }
    Ok(decode(&buf, format)?)
}
