// SPDX-License-Identifier: GPL-3.0-or-later

//! Device classification: turn a parsed [`crate::frame::DiscoveryReply`]
//! plus its network provenance into a typed [`Device`] record.

use std::fmt;
use std::net::Ipv4Addr;

use crate::frame::{DiscoveryReply, ReplyStatus};

/// Transport-family tag. Only the network families are in core
/// scope; local-USB and SoapySDR-backed devices are conceptual siblings
/// handled elsewhere in the full application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Legacy HPSDR protocol 1 wire family.
    Original,
    /// HPSDR protocol 2 (METIS) wire family — the only one this subsystem's
    /// discovery transports (broadcast/unicast UDP, unicast TCP) speak.
    New,
}

/// Device family, decoded from the discovery reply's board-ID byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFamily {
    Metis,
    Hermes,
    Griffin,
    Angelia,
    Orion,
    Orion2,
    HermesLiteV1,
    HermesLiteV2,
    Stemlab,
    StemlabZ20,
    Saturn,
    Unknown,
}

impl DeviceFamily {
    /// Human-readable name, as shown to the operator.
    pub fn display_name(self) -> &'static str {
        match self {
            DeviceFamily::Metis => "Metis",
            DeviceFamily::Hermes => "Hermes",
            DeviceFamily::Griffin => "Griffin",
            DeviceFamily::Angelia => "Angelia",
            DeviceFamily::Orion => "Orion",
            DeviceFamily::Orion2 => "Orion2",
            DeviceFamily::HermesLiteV1 => "Hermes-Lite V1",
            DeviceFamily::HermesLiteV2 => "Hermes-Lite V2",
            DeviceFamily::Stemlab => "STEMlab",
            DeviceFamily::StemlabZ20 => "STEMlab-Z20",
            DeviceFamily::Saturn => "Saturn",
            DeviceFamily::Unknown => "Unknown",
        }
    }

    /// Family-default frequency range in Hz (min, max).
    pub fn frequency_range_hz(self) -> (u32, u32) {
        match self {
            DeviceFamily::HermesLiteV1 | DeviceFamily::HermesLiteV2 => (0, 38_400_000),
            _ => (0, 61_440_000),
        }
    }

    /// Decode a board-ID byte (discovery reply offset 10) into a family.
    /// Hermes-Lite's v1/v2 split is NOT decided here — it needs the
    /// major/minor version bytes too, see [`classify`].
    fn from_board_id(board_id: u8) -> DeviceFamily {
        match board_id {
            0x00 => DeviceFamily::Metis,
            0x01 => DeviceFamily::Hermes,
            0x02 => DeviceFamily::Griffin,
            0x03 => DeviceFamily::Angelia,
            0x04 => DeviceFamily::Orion,
            0x05 => DeviceFamily::HermesLiteV1, // placeholder, refined below
            0x06 => DeviceFamily::Orion2,
            0x07 => DeviceFamily::Stemlab,
            0x08 => DeviceFamily::StemlabZ20,
            0x0A => DeviceFamily::Saturn,
            _ => DeviceFamily::Unknown,
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Whether a discovered device can presently be claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Idle, can be connected to.
    Available,
    /// Already streaming to another host.
    Sending,
    /// Responded but this host cannot use it (reserved for future
    /// capability checks; the core discovery/EEPROM subsystem never
    /// produces this today).
    Incompatible,
}

/// Network attachment of a discovered device: where it answered from, and
/// through which local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAttachment {
    /// Remote IPv4 address the reply arrived from.
    pub remote_addr: Ipv4Addr,
    /// Remote UDP port the reply arrived from (expected to be 1024).
    pub remote_port: u16,
    /// Local interface's own IPv4 address.
    pub interface_addr: Ipv4Addr,
    /// Local interface's netmask.
    pub interface_netmask: Ipv4Addr,
    /// Local interface name (e.g. `eth0`), empty for routed/TCP discovery
    /// where no single local interface applies.
    pub interface_name: String,
    /// Set when this record arrived via unicast TCP discovery.
    pub use_tcp: bool,
    /// Set when this record was added by a unicast probe that may be
    /// outside the link-local broadcast domain (routed), as opposed to a
    /// reply on the same broadcast domain this process probed.
    pub use_routing: bool,
}

/// HL2-only EEPROM-derived fields carried in the discovery reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hl2EepromInfo {
    /// Register 0x06: flags byte (0x80/0x40/0x20, see [`crate::eeprom`]).
    pub flags: u8,
    /// Register 0x07: reserved, preserved verbatim across writes.
    pub reserved: u8,
    /// Registers 0x08..0x0B: stored fixed IP.
    pub stored_ip: Ipv4Addr,
    /// EEPROM-overridden low MAC bytes, present only when flag `0x40` is
    /// set. Read-only in this subsystem.
    pub mac_low: Option<[u8; 2]>,
}

/// A single discovered radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub protocol: Protocol,
    pub mac: [u8; 6],
    /// `major*10 + minor` for HL2; otherwise the raw gateware major byte.
    pub software_version: u16,
    pub family: DeviceFamily,
    pub name: String,
    pub frequency_min_hz: u32,
    pub frequency_max_hz: u32,
    pub status: DeviceStatus,
    pub network: NetworkAttachment,
    /// Present only for Hermes-Lite 2 replies.
    pub hl2: Option<Hl2EepromInfo>,
}

impl Device {
    /// MAC as the conventional colon-separated hex string.
    pub fn mac_string(&self) -> String {
        let m = self.mac;
        format!(
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Classify a parsed discovery reply into a typed [`Device`] record.
///
/// `iface_name`/`iface_addr`/`iface_netmask` describe the local interface
/// the reply arrived on; pass empty/unspecified values for routed (TCP or
/// unicast-UDP) discovery where no single local interface is meaningful.
#[allow(clippy::too_many_arguments)]
pub fn classify(
    reply: &DiscoveryReply,
    remote_addr: Ipv4Addr,
    remote_port: u16,
    iface_name: &str,
    iface_addr: Ipv4Addr,
    iface_netmask: Ipv4Addr,
    use_tcp: bool,
    use_routing: bool,
) -> Device {
    let mut family = DeviceFamily::from_board_id(reply.board_id);
    let software_version: u16;

    if family == DeviceFamily::HermesLiteV1 {
        // HL2 disambiguation: only the board-ID match for
        // Hermes-Lite is unconditional; whether it's v1 or v2 depends on
        // the encoded gateware version.
        let sw = u16::from(reply.major_version) * 10 + u16::from(reply.minor_version);
        family = if sw < 400 {
            DeviceFamily::HermesLiteV1
        } else {
            DeviceFamily::HermesLiteV2
        };
        software_version = sw;
    } else {
        software_version = u16::from(reply.major_version);
    }

    let (frequency_min_hz, frequency_max_hz) = family.frequency_range_hz();

    let status = match reply.status {
        ReplyStatus::Available => DeviceStatus::Available,
        ReplyStatus::Sending => DeviceStatus::Sending,
    };

    let hl2 = matches!(family, DeviceFamily::HermesLiteV1 | DeviceFamily::HermesLiteV2).then(
        || Hl2EepromInfo {
            flags: reply.flags,
            reserved: reply.reserved,
            stored_ip: Ipv4Addr::new(
                reply.stored_ip[0],
                reply.stored_ip[1],
                reply.stored_ip[2],
                reply.stored_ip[3],
            ),
            mac_low: reply.mac_low,
        },
    );

    Device {
        protocol: Protocol::New,
        mac: reply.mac,
        software_version,
        family,
        name: family.display_name().to_string(),
        frequency_min_hz,
        frequency_max_hz,
        status,
        network: NetworkAttachment {
            remote_addr,
            remote_port,
            interface_addr: iface_addr,
            interface_netmask: iface_netmask,
            interface_name: iface_name.to_string(),
            use_tcp,
            use_routing,
        },
        hl2,
    }
}
