// SPDX-License-Identifier: GPL-3.0-or-later

//! HPSDR/METIS wire framing.
//!
//! Every exchange in this subsystem is a fixed-length UDP (or, for the TCP
//! discovery dialect, TCP) payload with a 3-byte preamble. This module only
//! builds and parses those byte layouts; it performs no I/O, so it can be
//! exhaustively unit tested without a socket.

use crate::error::{Error, Result};

/// `0xEF 0xFE` is the preamble shared by every frame kind.
const PREAMBLE: [u8; 2] = [0xEF, 0xFE];

/// Length of a UDP discovery query.
pub const DISCOVERY_QUERY_LEN: usize = 63;
/// Length of the TCP discovery query (zero-padded past the shared preamble).
pub const DISCOVERY_QUERY_TCP_LEN: usize = 1032;
/// Length of every C&C request/reply frame.
pub const CNC_FRAME_LEN: usize = 60;
/// Minimum length of a discovery reply this codec will accept.
pub const DISCOVERY_REPLY_MIN_LEN: usize = 17;

/// I2C proxy address used for EEPROM reads/writes over C&C.
pub const I2C_PROXY_ADDR: u8 = 0xAC;
/// HL2 C&C target address for the EEPROM I2C gateway.
pub const HL2_EEPROM_ADDR: u8 = 0x3D;
/// HL2 C&C target address for remote reboot.
pub const HL2_REBOOT_ADDR: u8 = 0x3A;

/// Build the 63-byte UDP discovery query frame.
///
/// `EF FE 02 00...00`.
pub fn build_discovery_query() -> [u8; DISCOVERY_QUERY_LEN] {
    let mut buf = [0u8; DISCOVERY_QUERY_LEN];
    buf[0] = PREAMBLE[0];
    buf[1] = PREAMBLE[1];
    buf[2] = 0x02;
    buf
}

/// Build the 1032-byte TCP discovery query frame. Same preamble as the UDP
/// variant, zero-padded to the TCP dialect's length.
pub fn build_discovery_query_tcp() -> Vec<u8> {
    let mut buf = vec![0u8; DISCOVERY_QUERY_TCP_LEN];
    buf[0] = PREAMBLE[0];
    buf[1] = PREAMBLE[1];
    buf[2] = 0x02;
    buf
}

/// Build a 60-byte C&C request frame: `EF FE 05 7F (addr<<1) c1 c2 c3 c4 00..00`.
pub fn build_cnc_request(addr: u8, c1: u8, c2: u8, c3: u8, c4: u8) -> [u8; CNC_FRAME_LEN] {
    let mut buf = [0u8; CNC_FRAME_LEN];
    buf[0] = PREAMBLE[0];
    buf[1] = PREAMBLE[1];
    buf[2] = 0x05;
    buf[3] = 0x7F;
    buf[4] = addr << 1;
    buf[5] = c1;
    buf[6] = c2;
    buf[7] = c3;
    buf[8] = c4;
    buf
}

/// Status byte encoded in a discovery reply's preamble (offset 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// Device is idle and can be claimed (`0x02`).
    Available,
    /// Device is already streaming to another host (`0x03`).
    Sending,
}

/// A discovery reply, parsed but not yet classified into a family-specific
/// [`crate::classify::Device`]. Fields beyond what the reply's length
/// supplies are zeroed, never fabricated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReply {
    pub status: ReplyStatus,
    pub mac: [u8; 6],
    pub major_version: u8,
    pub board_id: u8,
    /// HL2 EEPROM flags byte (register 0x06), present when the reply
    /// carries at least 17 bytes; zero otherwise.
    pub flags: u8,
    /// HL2 EEPROM reserved byte (register 0x07).
    pub reserved: u8,
    /// HL2 stored fixed IP, registers 0x08..0x0B, network order W.X.Y.Z.
    pub stored_ip: [u8; 4],
    /// EEPROM-overridden low MAC bytes (registers 0x0C/0x0D), present only
    /// when flag `0x40` is set and the reply is long enough to carry them.
    pub mac_low: Option<[u8; 2]>,
    /// HL2 gateware minor version (byte 21), zero if the reply is shorter.
    pub minor_version: u8,
}

/// Parse a discovery reply. Rejects frames that are too short, don't start
/// with the shared preamble, or carry a status byte outside `{0x02, 0x03}`.
/// These are the only structural checks the codec performs; dropping such
/// replies is the caller's job (the Discovery Engine does so silently).
pub fn parse_discovery_reply(buf: &[u8]) -> Result<DiscoveryReply> {
    if buf.len() < DISCOVERY_REPLY_MIN_LEN {
        return Err(Error::ProtocolViolation(format!(
            "reply too short: {} bytes (need at least {})",
            buf.len(),
            DISCOVERY_REPLY_MIN_LEN
        )));
    }
    if buf[0] != PREAMBLE[0] || buf[1] != PREAMBLE[1] {
        return Err(Error::ProtocolViolation(format!(
            "bad preamble: {:#04x} {:#04x}",
            buf[0], buf[1]
        )));
    }
    let status = match buf[2] {
        0x02 => ReplyStatus::Available,
        0x03 => ReplyStatus::Sending,
        other => {
            return Err(Error::ProtocolViolation(format!(
                "bad status byte: {:#04x}",
                other
            )))
        }
    };

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&buf[3..9]);
    let major_version = buf[9];
    let board_id = buf[10];

    let flags = buf.get(11).copied().unwrap_or(0);
    let reserved = buf.get(12).copied().unwrap_or(0);
    let mut stored_ip = [0u8; 4];
    if buf.len() >= 17 {
        stored_ip.copy_from_slice(&buf[13..17]);
    }
    let mac_low = if flags & 0x40 != 0 && buf.len() >= 19 {
        Some([buf[17], buf[18]])
    } else {
        None
    };
    let minor_version = buf.get(21).copied().unwrap_or(0);

    Ok(DiscoveryReply {
        status,
        mac,
        major_version,
        board_id,
        flags,
        reserved,
        stored_ip,
        mac_low,
        minor_version,
    })
}

/// Parse a 60-byte C&C reply, returning the big-endian 32-bit response word
/// at bytes `0x17..0x1A`. Rejects anything not exactly 60 bytes or not
/// starting with the shared preamble.
pub fn parse_cnc_reply(buf: &[u8]) -> Result<u32> {
    if buf.len() != CNC_FRAME_LEN {
        return Err(Error::ProtocolViolation(format!(
            "C&C reply wrong length: {} bytes (need {})",
            buf.len(),
            CNC_FRAME_LEN
        )));
    }
    if buf[0] != PREAMBLE[0] || buf[1] != PREAMBLE[1] {
        return Err(Error::ProtocolViolation(format!(
            "bad preamble: {:#04x} {:#04x}",
            buf[0], buf[1]
        )));
    }
    Ok(u32::from_be_bytes([buf[0x17], buf[0x18], buf[0x19], buf[0x1A]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_query_is_63_bytes_with_preamble() {
        let q = build_discovery_query();
        assert_eq!(q.len(), DISCOVERY_QUERY_LEN);
        assert_eq!(&q[0..3], &[0xEF, 0xFE, 0x02]);
        assert!(q[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn discovery_query_tcp_is_1032_bytes() {
        let q = build_discovery_query_tcp();
        assert_eq!(q.len(), DISCOVERY_QUERY_TCP_LEN);
        assert_eq!(&q[0..3], &[0xEF, 0xFE, 0x02]);
    }

    #[test]
    fn cnc_request_matches_reboot_wire_bytes() {
        // Reboot frame to 0x3A with {0,0,0,1}.
        let req = build_cnc_request(HL2_REBOOT_ADDR, 0x00, 0x00, 0x00, 0x01);
        assert_eq!(req.len(), CNC_FRAME_LEN);
        let mut expected = [0u8; CNC_FRAME_LEN];
        expected[0..9].copy_from_slice(&[0xEF, 0xFE, 0x05, 0x7F, 0x74, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(req, expected);
    }

    #[test]
    fn cnc_request_shifts_address_left_by_one() {
        let req = build_cnc_request(0x3D, 0x07, I2C_PROXY_ADDR, 0xAC, 0x00);
        assert_eq!(req[4], 0x3D << 1);
    }

    #[test]
    fn parse_discovery_reply_rejects_short_frame() {
        let buf = [0xEF, 0xFE, 0x02, 0, 0];
        assert!(parse_discovery_reply(&buf).is_err());
    }

    #[test]
    fn parse_discovery_reply_rejects_bad_preamble() {
        let mut buf = [0u8; 17];
        buf[0] = 0x00;
        buf[1] = 0xFE;
        buf[2] = 0x02;
        assert!(parse_discovery_reply(&buf).is_err());
    }

    #[test]
    fn parse_discovery_reply_rejects_bad_status() {
        let mut buf = [0u8; 17];
        buf[0] = 0xEF;
        buf[1] = 0xFE;
        buf[2] = 0x04;
        assert!(parse_discovery_reply(&buf).is_err());
    }

    #[test]
    fn parse_discovery_reply_reads_hl2_fields() {
        // Canonical HL2 reply: gateware 7.3, board-ID HermesLite.
        let mut buf = [0u8; 22];
        buf[0] = 0xEF;
        buf[1] = 0xFE;
        buf[2] = 0x02;
        buf[3..9].copy_from_slice(&[0x00, 0x1C, 0xC0, 0xA2, 0x13, 0x37]);
        buf[9] = 7; // gateware major
        buf[10] = 0x05; // board id = HermesLite
        buf[11] = 0x80; // flags
        buf[12] = 0x00; // reserved
        buf[13..17].copy_from_slice(&[192, 168, 33, 50]);
        buf[21] = 3; // minor

        let reply = parse_discovery_reply(&buf).unwrap();
        assert_eq!(reply.status, ReplyStatus::Available);
        assert_eq!(reply.mac, [0x00, 0x1C, 0xC0, 0xA2, 0x13, 0x37]);
        assert_eq!(reply.major_version, 7);
        assert_eq!(reply.board_id, 0x05);
        assert_eq!(reply.flags, 0x80);
        assert_eq!(reply.stored_ip, [192, 168, 33, 50]);
        assert_eq!(reply.minor_version, 3);
        assert_eq!(reply.mac_low, None);
    }

    #[test]
    fn parse_discovery_reply_reads_eeprom_mac_override_when_flagged() {
        let mut buf = [0u8; 22];
        buf[0] = 0xEF;
        buf[1] = 0xFE;
        buf[2] = 0x02;
        buf[10] = 0x05;
        buf[11] = 0x40; // EEPROM MAC override flag
        buf[17] = 0xAA;
        buf[18] = 0xBB;
        let reply = parse_discovery_reply(&buf).unwrap();
        assert_eq!(reply.mac_low, Some([0xAA, 0xBB]));
    }

    #[test]
    fn parse_cnc_reply_reads_be32_response_word() {
        let mut buf = [0u8; CNC_FRAME_LEN];
        buf[0] = 0xEF;
        buf[1] = 0xFE;
        buf[0x17] = 0x00;
        buf[0x18] = 0x00;
        buf[0x19] = 0x80;
        buf[0x1A] = 0x12;
        let v = parse_cnc_reply(&buf).unwrap();
        assert_eq!(v, 0x8012);
    }

    #[test]
    fn parse_cnc_reply_rejects_wrong_length() {
        let buf = [0xEFu8, 0xFE, 0x05];
        assert!(parse_cnc_reply(&buf).is_err());
    }
}
