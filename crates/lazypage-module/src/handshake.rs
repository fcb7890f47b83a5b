//! Cross-process handshake over TCP.
//!
//! ```text
//!   originator                         peer
//!   ----------                         ----
//!   bind :PORT
//!   reserve + register
//!   accept  <------------------------  connect (retry every N ms)
//!   send one descriptor record ----->  receive one record
//!                                      reserve at requested addr
//!                                      register, own dispatcher
//! ```
//!
//! Only the descriptor crosses the wire. Each side serves its own faults
//! with its own policy, so the peer never sees the originator's bytes.

use lazypage_core::error::{NetOp, PagerError, Result};
use lazypage_core::region::RegionDescriptor;
use lazypage_core::wire::{read_descriptor, write_descriptor, WireFormat};
use lazypage_core::{kdebug, kinfo};

use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

/// Listening side. Serves exactly one descriptor to one peer.
pub struct Originator {
    listener: TcpListener,
    format: WireFormat,
}

impl Originator {
    /// Listen on all interfaces. Port 0 picks a free port.
    pub fn bind(port: u16, format: WireFormat) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).map_err(|e| PagerError::net(NetOp::Bind, e))?;
        kdebug!("listening on {:?}, {} records", listener.local_addr().ok(), format);
        Ok(Self { listener, format })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(|e| PagerError::net(NetOp::Bind, e))
    }

    /// Accept one connection and send `desc` on it. Consumes the listener.
    pub fn send_descriptor(self, desc: &RegionDescriptor) -> Result<SocketAddr> {
        let (mut stream, peer) = self.listener.accept().map_err(|e| PagerError::net(NetOp::Accept, e))?;
        write_descriptor(&mut stream, desc, self.format)?;
        kinfo!("Address and length sent to {}: {:#x}, {}", peer, desc.addr, desc.len);
        Ok(peer)
    }
}

/// Connecting side.
pub struct Peer {
    stream: TcpStream,
    format: WireFormat,
}

impl Peer {
    /// Connect to `host:port`, retrying forever every `retry`.
    pub fn connect(host: &str, port: u16, retry: Duration, format: WireFormat) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| PagerError::net(NetOp::Connect, e))?
            .next()
            .ok_or_else(|| {
                PagerError::net(
                    NetOp::Connect,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("no address for {}", host)),
                )
            })?;

        let stream = loop {
            match TcpStream::connect(addr) {
                Ok(s) => break s,
                Err(e) => {
                    kinfo!("Connecting to originator at {} ({})", addr, e);
                    thread::sleep(retry);
                }
            }
        };
        kinfo!("Connection established with {} ({} records)", addr, format);
        Ok(Self { stream, format })
    }

    /// Block until one descriptor record has arrived.
    pub fn receive_descriptor(&mut self) -> Result<RegionDescriptor> {
        let desc = read_descriptor(&mut self.stream, self.format)?;
        kinfo!("Address received: {:#x}, length received: {}", desc.addr, desc.len);
        Ok(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(format: WireFormat, desc: RegionDescriptor) -> RegionDescriptor {
        let originator = Originator::bind(0, format).unwrap();
        let port = originator.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let mut peer = Peer::connect("127.0.0.1", port, Duration::from_millis(10), format).unwrap();
            peer.receive_descriptor().unwrap()
        });

        originator.send_descriptor(&desc).unwrap();
        peer.join().unwrap()
    }

    #[test]
    fn test_descriptor_arrives_bit_for_bit() {
        let desc = RegionDescriptor { addr: 0x7f55_1234_5000, len: 4 * 4096 };
        assert_eq!(exchange(WireFormat::Framed, desc), desc);
        assert_eq!(exchange(WireFormat::Raw, desc), desc);
    }

    #[test]
    fn test_peer_retries_until_listener_appears() {
        // Reserve a free port number, then release it before the peer starts.
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let mut peer =
                Peer::connect("127.0.0.1", port, Duration::from_millis(20), WireFormat::Framed).unwrap();
            peer.receive_descriptor().unwrap()
        });

        thread::sleep(Duration::from_millis(100));
        let originator = Originator::bind(port, WireFormat::Framed).unwrap();
        let desc = RegionDescriptor { addr: 0x1000, len: 0x2000 };
        originator.send_descriptor(&desc).unwrap();
        assert_eq!(peer.join().unwrap(), desc);
    }

    #[test]
    fn test_originator_hangup_is_truncation() {
        let originator = Originator::bind(0, WireFormat::Framed).unwrap();
        let port = originator.local_addr().unwrap().port();
        let closer = thread::spawn(move || {
            let (stream, _) = originator.listener.accept().unwrap();
            drop(stream);
        });

        let mut peer = Peer::connect("127.0.0.1", port, Duration::from_millis(10), WireFormat::Framed).unwrap();
        let err = peer.receive_descriptor().unwrap_err();
        assert!(matches!(err, PagerError::Wire(_)));
        closer.join().unwrap();
    }

    #[test]
    fn test_bind_conflict_is_bind_error() {
        let first = Originator::bind(0, WireFormat::Raw).unwrap();
        let port = first.local_addr().unwrap().port();
        // std sets SO_REUSEADDR but not SO_REUSEPORT; a live listener still conflicts.
        let err = Originator::bind(port, WireFormat::Raw).err().unwrap();
        assert!(matches!(err, PagerError::Net { op: NetOp::Bind, .. }));
    }
}
