// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end scenarios against real loopback UDP sockets standing in for
//! an HL2 (no mocking framework).

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use hl2disc::cnc::CncTransport;
use hl2disc::config::TuningConfig;
use hl2disc::eeprom::EepromService;
use hl2disc::error::Error;
use hl2disc::frame::{parse_cnc_reply, CNC_FRAME_LEN};

/// A tiny in-process stand-in for an HL2's EEPROM registers, driven over a
/// real loopback UDP socket using the exact C&C wire format. The
/// fixed-IP-round-trip and verify-timeout tests below both need a responder
/// that actually tracks register state across several C&C exchanges, not
/// just a single canned reply.
struct FakeHl2 {
    registers: Mutex<HashMap<u8, u8>>,
    refuse_register: Option<u8>,
}

impl FakeHl2 {
    fn new() -> Self {
        Self {
            registers: Mutex::new(HashMap::new()),
            refuse_register: None,
        }
    }

    fn refusing_writes_to(register: u8) -> Self {
        Self {
            registers: Mutex::new(HashMap::new()),
            refuse_register: Some(register),
        }
    }

    /// Spawn the responder thread, returning its bound port and a stop flag.
    fn spawn(self: Arc<Self>) -> (u16, Arc<AtomicBool>) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
        let port = socket.local_addr().unwrap().port();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();

        thread::spawn(move || {
            let mut buf = [0u8; CNC_FRAME_LEN];
            while !stop_clone.load(Ordering::Relaxed) {
                let (n, from) = match socket.recv_from(&mut buf) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                if n != CNC_FRAME_LEN {
                    continue;
                }
                let c1 = buf[5];
                let c2 = buf[6];
                let c3 = buf[7];
                let c4 = buf[8];
                if c2 != 0xAC {
                    continue;
                }
                let register = c3 >> 4;

                if c1 == 0x06 {
                    // write-one-byte
                    if self.refuse_register != Some(register) {
                        self.registers.lock().unwrap().insert(register, c4);
                    }
                    // Writes are posted: no reply expected by the real
                    // protocol, so none is sent here either.
                } else if c1 == 0x07 {
                    // read-one-byte
                    let value = *self.registers.lock().unwrap().get(&register).unwrap_or(&0);
                    let mut reply = [0u8; CNC_FRAME_LEN];
                    reply[0] = 0xEF;
                    reply[1] = 0xFE;
                    reply[0x19] = value;
                    let _ = socket.send_to(&reply, from);
                }
            }
        });

        (port, stop)
    }
}

#[test]
fn set_fixed_ip_round_trip() {
    let fake = Arc::new(FakeHl2::new());
    let (port, stop) = fake.spawn();

    let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);
    let transport = connect_to(target);
    let config = TuningConfig::default();
    let service = EepromService::new(&transport, &config);

    let report = service
        .set_fixed_ip(Ipv4Addr::new(192, 168, 33, 77))
        .expect("set_fixed_ip should succeed against the fake responder");

    assert_eq!(report.stored_ip, Ipv4Addr::new(192, 168, 33, 77));
    assert_eq!(report.flags & 0x80, 0x80);

    stop.store(true, Ordering::Relaxed);
}

#[test]
fn reject_dot_zero_host_sends_no_frames() {
    let fake = Arc::new(FakeHl2::new());
    let (port, stop) = fake.spawn();
    let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);
    let transport = connect_to(target);
    let config = TuningConfig::default();
    let service = EepromService::new(&transport, &config);

    let err = service
        .set_fixed_ip(Ipv4Addr::new(10, 0, 0, 0))
        .unwrap_err();
    assert!(matches!(err, Error::ReservedHostOctet { octet: 0, .. }));

    // No register should have been touched since the rejection happens
    // before any C&C frame is sent.
    assert!(fake.registers.lock().unwrap().is_empty());

    stop.store(true, Ordering::Relaxed);
}

#[test]
fn verify_timeout_names_register_and_values() {
    let fake = Arc::new(FakeHl2::refusing_writes_to(0x0A));
    let (port, stop) = fake.spawn();
    let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);
    let transport = connect_to(target);
    let config = TuningConfig::default();
    let service = EepromService::new(&transport, &config);

    let err = service
        .set_fixed_ip(Ipv4Addr::new(192, 168, 33, 77))
        .unwrap_err();

    match err {
        Error::VerifyTimeout { register, expected, .. } => {
            assert_eq!(register, 0x0A);
            assert_eq!(expected, 33);
        }
        other => panic!("expected VerifyTimeout, got {other:?}"),
    }

    stop.store(true, Ordering::Relaxed);
}

#[test]
fn reboot_is_one_unacknowledged_frame() {
    let responder = UdpSocket::bind("127.0.0.1:0").unwrap();
    responder.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let port = responder.local_addr().unwrap().port();
    let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);

    let transport = connect_to(target);
    let config = TuningConfig::default();
    let service = EepromService::new(&transport, &config);
    service.reboot().expect("reboot send must not fail");

    let mut buf = [0u8; CNC_FRAME_LEN + 16];
    let (n, _from) = responder
        .recv_from(&mut buf)
        .expect("exactly one reboot frame should arrive on the wire");
    assert_eq!(n, CNC_FRAME_LEN);

    let mut expected = [0u8; CNC_FRAME_LEN];
    expected[0..9].copy_from_slice(&[0xEF, 0xFE, 0x05, 0x7F, 0x74, 0x00, 0x00, 0x00, 0x01]);
    assert_eq!(&buf[..n], &expected[..]);
}

#[test]
fn cnc_reply_parses_back_a_written_register_value() {
    let fake = Arc::new(FakeHl2::new());
    let (port, stop) = fake.spawn();
    let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);
    let transport = connect_to(target);

    transport.request(0x3D, 0x06, 0xAC, 0x06 << 4, 0x42).unwrap();
    let word = transport.request(0x3D, 0x07, 0xAC, (0x06 << 4) | 0x0C, 0x00).unwrap();
    assert_eq!((word >> 8) & 0xFF, 0x42);

    stop.store(true, Ordering::Relaxed);

    // parse_cnc_reply is exercised indirectly above through CncTransport;
    // assert it rejects garbage directly too.
    assert!(parse_cnc_reply(&[0u8; 3]).is_err());
}

fn connect_to(target: SocketAddrV4) -> CncTransport {
    CncTransport::connect_to_target(target, Duration::from_secs(1))
        .expect("connect to fake HL2 responder")
}
