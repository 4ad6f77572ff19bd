// SPDX-License-Identifier: GPL-3.0-or-later

//! Error types for the discovery and EEPROM-provisioning subsystem.

use std::net::Ipv4Addr;
use thiserror::Error;

/// Result alias used throughout `hl2disc`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while discovering radios or driving the C&C/EEPROM
/// protocols against one.
#[derive(Debug, Error)]
pub enum Error {
    /// CLI/API argument was malformed or violated a documented constraint
    /// (e.g. a forbidden host octet, or more than one operation mode).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A discovery pass completed without a single accepted reply.
    #[error("discovery failed: no devices responded")]
    DiscoveryEmpty,

    /// A socket-level operation (create/bind/setsockopt/send/connect) failed.
    #[error("transport socket error: {0}")]
    TransportSocket(#[source] std::io::Error),

    /// A C&C request was sent but no valid reply arrived within the reply
    /// window.
    #[error("no reply from device within timeout")]
    NoReply,

    /// A read-verify-retry loop exhausted its attempts without observing
    /// the expected value.
    #[error("verify timeout at register 0x{register:02X} (is=0x{observed:02X}, need=0x{expected:02X})")]
    VerifyTimeout {
        register: u8,
        observed: u8,
        expected: u8,
    },

    /// A write-one-byte step failed outright (distinct from a verify
    /// timeout, which implies the write was at least sent).
    #[error("write error at register 0x{register:02X}")]
    WriteFailed { register: u8 },

    /// A read-one-byte step failed outright.
    #[error("read error at register 0x{register:02X}")]
    ReadFailed { register: u8 },

    /// `--set` was given a fixed-IP address whose host octet is reserved.
    #[error("host octet .{octet} of {addr} is reserved (.0 and .255 forbidden)")]
    ReservedHostOctet { addr: Ipv4Addr, octet: u8 },

    /// Underlying I/O failure not otherwise classified above.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A discovery-reply or C&C-reply frame was well-formed at the socket
    /// level but failed preamble/length/status checks. The codec drops
    /// these silently in normal operation; this variant exists so tests can
    /// assert on codec rejection directly.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl Error {
    /// Maps a terminal outcome to the stable process exit code from
    /// the CLI surface: 0 success is handled by the caller,
    /// this only covers error paths.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) | Error::ReservedHostOctet { .. } => 2,
            Error::DiscoveryEmpty => 3,
            Error::ReadFailed { .. } => 4,
            Error::WriteFailed { .. } => 5,
            Error::VerifyTimeout { .. } => 6,
            Error::TransportSocket(_) | Error::NoReply | Error::Io(_) | Error::ProtocolViolation(_) => 4,
        }
    }
}
