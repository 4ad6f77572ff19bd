// SPDX-License-Identifier: GPL-3.0-or-later

//! Command-and-Control (C&C) transport: synchronous, single-outstanding
//! request/response RPC over one UDP socket.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{Error, Result};
use crate::frame::{build_cnc_request, parse_cnc_reply, CNC_FRAME_LEN};

/// Default C&C reply window.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Standard HPSDR C&C port.
pub const CNC_PORT: u16 = 1025;

/// One C&C session against a single device. Not thread-safe: at most one
/// command may be outstanding per transport instance, and this type has
/// no internal locking to enforce that — callers serialize.
pub struct CncTransport {
    socket: UdpSocket,
    target: SocketAddrV4,
    timeout: Duration,
}

impl CncTransport {
    /// Bind an ephemeral `SO_REUSEADDR` socket and target `device:1025`.
    pub fn connect(device: Ipv4Addr) -> Result<Self> {
        Self::connect_with_timeout(device, DEFAULT_TIMEOUT)
    }

    pub fn connect_with_timeout(device: Ipv4Addr, timeout: Duration) -> Result<Self> {
        Self::connect_to_target(SocketAddrV4::new(device, CNC_PORT), timeout)
    }

    /// Bind an ephemeral `SO_REUSEADDR` socket and target an arbitrary
    /// `SocketAddrV4`, bypassing the standard C&C port 1025. Exposed
    /// publicly since tests stand in a fake device on an ephemeral port
    /// rather than the real well-known one.
    pub fn connect_to_target(target: SocketAddrV4, timeout: Duration) -> Result<Self> {
        let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(Error::TransportSocket)?;
        sock.set_reuse_address(true).map_err(Error::TransportSocket)?;
        let bind_addr: std::net::SocketAddr =
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into();
        sock.bind(&bind_addr.into()).map_err(Error::TransportSocket)?;
        sock.set_read_timeout(Some(timeout))
            .map_err(Error::TransportSocket)?;

        let socket: UdpSocket = sock.into();

        Ok(Self {
            socket,
            target,
            timeout,
        })
    }

    /// Send one request and wait up to the reply window for a 60-byte
    /// response beginning `EF FE`. Returns the big-endian response word at
    /// bytes `0x17..0x1A`.
    pub fn request(&self, addr: u8, c1: u8, c2: u8, c3: u8, c4: u8) -> Result<u32> {
        let req = build_cnc_request(addr, c1, c2, c3, c4);
        self.socket
            .send_to(&req, self.target)
            .map_err(Error::TransportSocket)?;

        let mut buf = [0u8; CNC_FRAME_LEN];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    if from.ip() != std::net::IpAddr::V4(*self.target.ip()) {
                        tracing::debug!(from = %from, "ignoring C&C reply from unexpected source");
                        continue;
                    }
                    match parse_cnc_reply(&buf[..n]) {
                        Ok(word) => return Ok(word),
                        Err(_) => {
                            tracing::debug!("dropped malformed C&C reply");
                            continue;
                        }
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    return Err(Error::NoReply);
                }
                Err(e) => return Err(Error::TransportSocket(e)),
            }
        }
    }

    /// Reboot is fire-and-forget: send the framed request and return
    /// without waiting, since the device cannot answer while rebooting.
    pub fn send_reboot(&self, addr: u8, c1: u8, c2: u8, c3: u8, c4: u8) -> Result<()> {
        let req = build_cnc_request(addr, c1, c2, c3, c4);
        self.socket
            .send_to(&req, self.target)
            .map_err(Error::TransportSocket)?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
