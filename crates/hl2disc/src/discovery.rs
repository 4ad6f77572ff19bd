// SPDX-License-Identifier: GPL-3.0-or-later

//! Discovery Engine: drives one discovery session across the three
//! transport modes and aggregates unique responders into a [`DeviceTable`].

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::classify::{classify, Device};
use crate::error::{Error, Result};
use crate::frame::{
    build_discovery_query, build_discovery_query_tcp, parse_discovery_reply,
    DISCOVERY_REPLY_MIN_LEN,
};
use crate::iface::{self, Candidate};
use crate::table::DeviceTable;

/// Discovery UDP port.
pub const DEFAULT_DISCOVERY_PORT: u16 = 1024;
/// Receive window for local (broadcast/unicast) probes.
pub const DEFAULT_RECEIVE_WINDOW: Duration = Duration::from_secs(2);
/// Receive window used for remote/routed unicast probes.
pub const REMOTE_RECEIVE_WINDOW: Duration = Duration::from_secs(5);
/// TCP connect ceiling.
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
/// Retry count for the loopback/broadcast send mitigation.
const SEND_RETRIES: u32 = 3;
const SEND_RETRY_GAP: Duration = Duration::from_millis(30);

/// One raw (unclassified) reply observed during a discovery pass.
struct RawReply {
    bytes: Vec<u8>,
    from: SocketAddr,
}

/// Tunable knobs the caller may override.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryOptions {
    pub port: u16,
    pub receive_window: Duration,
    pub allow_loopback: bool,
    /// Receive window for the routed unicast transports (UDP and TCP).
    pub remote_receive_window: Duration,
    /// Non-blocking TCP connect ceiling for the unicast TCP transport.
    pub tcp_connect_ceiling: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_DISCOVERY_PORT,
            receive_window: DEFAULT_RECEIVE_WINDOW,
            allow_loopback: false,
            remote_receive_window: REMOTE_RECEIVE_WINDOW,
            tcp_connect_ceiling: TCP_CONNECT_TIMEOUT,
        }
    }
}

/// Run a broadcast UDP discovery pass (discflag=1) across every interface
/// the enumerator yields.
pub fn discover_broadcast(options: &DiscoveryOptions) -> Result<DeviceTable> {
    let candidates = iface::enumerate(options.allow_loopback)?;
    let mut table = DeviceTable::new();

    for candidate in &candidates {
        if iface::is_denied_name(&candidate.name) {
            tracing::debug!(interface = %candidate.name, "skipping denylisted interface");
            continue;
        }
        match probe_interface(candidate, options) {
            Ok(replies) => {
                for reply in replies {
                    insert_reply(&mut table, reply, candidate, false, false);
                }
            }
            Err(e) => {
                tracing::warn!(interface = %candidate.name, error = %e, "broadcast probe failed, skipping interface");
            }
        }
    }

    Ok(table)
}

/// Run a unicast UDP discovery pass (discflag=2) against `target`.
pub fn discover_unicast_udp(target: &str, options: &DiscoveryOptions) -> Result<DeviceTable> {
    let addr = resolve_target(target, options.port)?;
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(Error::TransportSocket)?;
    socket
        .set_read_timeout(Some(options.remote_receive_window))
        .map_err(Error::TransportSocket)?;

    let query = build_discovery_query();
    socket.send_to(&query, addr).map_err(Error::TransportSocket)?;

    let replies = read_until_timeout(&socket, options.remote_receive_window, options.port)?;

    let mut table = DeviceTable::new();
    let routed_candidate = Candidate {
        name: String::new(),
        address: Ipv4Addr::UNSPECIFIED,
        netmask: Ipv4Addr::UNSPECIFIED,
        broadcast: Ipv4Addr::UNSPECIFIED,
    };
    for reply in replies {
        insert_reply(&mut table, reply, &routed_candidate, false, true);
    }
    Ok(table)
}

/// Run a unicast TCP discovery pass (discflag=3) against `target`.
pub fn discover_unicast_tcp(target: &str, options: &DiscoveryOptions) -> Result<DeviceTable> {
    let addr = resolve_target(target, options.port)?;
    let mut table = DeviceTable::new();

    let mut stream = connect_with_ceiling(addr, options.tcp_connect_ceiling)?;
    stream
        .set_read_timeout(Some(options.remote_receive_window))
        .map_err(Error::TransportSocket)?;

    let query = build_discovery_query_tcp();
    use std::io::{Read, Write};
    stream.write_all(&query).map_err(Error::TransportSocket)?;

    let mut buf = vec![0u8; 1032];
    match stream.read(&mut buf) {
        Ok(n) if n >= DISCOVERY_REPLY_MIN_LEN => {
            let routed_candidate = Candidate {
                name: String::new(),
                address: Ipv4Addr::UNSPECIFIED,
                netmask: Ipv4Addr::UNSPECIFIED,
                broadcast: Ipv4Addr::UNSPECIFIED,
            };
            let reply = RawReply {
                bytes: buf[..n].to_vec(),
                from: SocketAddr::V4(addr),
            };
            insert_reply(&mut table, reply, &routed_candidate, true, true);
        }
        Ok(_) => tracing::debug!("TCP discovery reply too short, dropped"),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
            tracing::debug!("TCP discovery reply window elapsed with no reply");
        }
        Err(e) => return Err(Error::TransportSocket(e)),
    }

    Ok(table)
}

fn resolve_target(target: &str, port: u16) -> Result<SocketAddrV4> {
    if let Ok(ip) = target.parse::<Ipv4Addr>() {
        return Ok(SocketAddrV4::new(ip, port));
    }
    let mut addrs = (target, port)
        .to_socket_addrs()
        .map_err(Error::TransportSocket)?;
    addrs
        .find_map(|a| match a {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| Error::InvalidArgument(format!("no IPv4 address for {target}")))
}

/// Non-blocking connect with a bounded readiness-polling ceiling. `socket2`
/// carries the non-blocking connect through a raw `Socket`; the returned
/// stream is restored to blocking mode before being handed back.
fn connect_with_ceiling(addr: SocketAddrV4, ceiling: Duration) -> Result<TcpStream> {
    let sock = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(Error::TransportSocket)?;
    sock.set_nonblocking(true).map_err(Error::TransportSocket)?;

    // A non-blocking connect() almost always returns immediately with
    // EINPROGRESS; that's expected and not a failure. Whether it was
    // EINPROGRESS, WouldBlock, or something else is resolved below by
    // polling SO_ERROR, the portable way to learn a pending connect's
    // outcome without depending on a single errno's cross-platform value.
    let remote = SockAddr::from(SocketAddr::V4(addr));
    if let Err(e) = sock.connect(&remote) {
        if e.kind() != io::ErrorKind::WouldBlock {
            tracing::debug!(error = %e, "non-blocking connect returned, polling SO_ERROR for outcome");
        }
    }

    // Busy-poll take_error() since std's Socket lacks a portable
    // select/poll wrapper for "connect finished" readiness.
    let deadline = Instant::now() + ceiling;
    loop {
        match sock.take_error() {
            Ok(None) => break,
            Ok(Some(e)) => return Err(Error::TransportSocket(e)),
            Err(e) => return Err(Error::TransportSocket(e)),
        }
        if Instant::now() >= deadline {
            return Err(Error::TransportSocket(io::Error::new(
                io::ErrorKind::TimedOut,
                "TCP connect exceeded 3s ceiling",
            )));
        }
        thread::sleep(Duration::from_millis(10));
    }

    sock.set_nonblocking(false).map_err(Error::TransportSocket)?;
    Ok(sock.into())
}

fn probe_interface(candidate: &Candidate, options: &DiscoveryOptions) -> Result<Vec<RawReply>> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(Error::TransportSocket)?;
    socket.set_broadcast(true).map_err(Error::TransportSocket)?;
    socket.set_reuse_address(true).map_err(Error::TransportSocket)?;
    let bind_addr = SocketAddr::V4(SocketAddrV4::new(candidate.address, 0));
    socket.bind(&bind_addr.into()).map_err(Error::TransportSocket)?;
    socket
        .set_read_timeout(Some(options.receive_window))
        .map_err(Error::TransportSocket)?;

    let socket: UdpSocket = socket.into();
    let dest = SocketAddrV4::new(candidate.broadcast, options.port);
    let query = build_discovery_query();

    for attempt in 0..SEND_RETRIES {
        match socket.send_to(&query, dest) {
            Ok(_) => break,
            Err(e) if attempt + 1 < SEND_RETRIES => {
                tracing::debug!(interface = %candidate.name, attempt, error = %e, "broadcast send failed, retrying");
                thread::sleep(SEND_RETRY_GAP);
            }
            Err(e) => return Err(Error::TransportSocket(e)),
        }
    }

    read_until_timeout(&socket, options.receive_window, options.port)
}

/// Single producer (background reader) / single consumer (this function,
/// after the spawned thread has run its course) pattern: the reader drains
/// the socket until its receive-timeout elapses, then the join point below
/// hands the collected replies back. No shared mutable state crosses the
/// thread boundary except the channel itself.
fn read_until_timeout(
    socket: &UdpSocket,
    window: Duration,
    expected_port: u16,
) -> Result<Vec<RawReply>> {
    let socket = socket.try_clone().map_err(Error::TransportSocket)?;
    let (tx, rx) = mpsc::channel::<RawReply>();
    let deadline = Instant::now() + window;

    let handle = thread::spawn(move || {
        let mut buf = [0u8; 1500];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if socket.set_read_timeout(Some(remaining)).is_err() {
                break;
            }
            match socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    if from.port() != expected_port {
                        continue;
                    }
                    if n < DISCOVERY_REPLY_MIN_LEN {
                        continue;
                    }
                    let _ = tx.send(RawReply {
                        bytes: buf[..n].to_vec(),
                        from,
                    });
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(_) => break,
            }
        }
    });

    handle.join().expect("discovery reader thread panicked");
    Ok(rx.try_iter().collect())
}

fn insert_reply(
    table: &mut DeviceTable,
    raw: RawReply,
    candidate: &Candidate,
    use_tcp: bool,
    use_routing: bool,
) {
    let parsed = match parse_discovery_reply(&raw.bytes) {
        Ok(reply) => reply,
        Err(_) => return,
    };
    let remote_addr = match raw.from.ip() {
        std::net::IpAddr::V4(v4) => v4,
        std::net::IpAddr::V6(_) => return,
    };
    let device: Device = classify(
        &parsed,
        remote_addr,
        raw.from.port(),
        &candidate.name,
        candidate.address,
        candidate.netmask,
        use_tcp,
        use_routing,
    );
    table.insert(device);
}
