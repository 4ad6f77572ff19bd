// SPDX-License-Identifier: GPL-3.0-or-later

//! Hermes-Lite 2 EEPROM provisioning: the three C&C primitives and the
//! five composed operations built from them.

use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;

use crate::cnc::CncTransport;
use crate::config::TuningConfig;
use crate::error::{Error, Result};
use crate::frame::{HL2_EEPROM_ADDR, HL2_REBOOT_ADDR, I2C_PROXY_ADDR};

/// Flag bit: use the stored fixed IP instead of DHCP.
pub const FLAG_USE_FIXED_IP: u8 = 0x80;
/// Flag bit: use the EEPROM-stored MAC low bytes instead of the burned-in ones.
pub const FLAG_USE_STORED_MAC_LOW: u8 = 0x40;
/// Flag bit: favor DHCP over the fixed IP when both are viable.
pub const FLAG_FAVOR_DHCP: u8 = 0x20;

const FLAGS_REGISTER: u8 = 0x06;
const IP_REGISTERS: [u8; 4] = [0x08, 0x09, 0x0A, 0x0B];
const ACCEPT_ANY: u8 = 0xFF;

/// Reject a `.0` or `.255` host octet. Exposed so callers can validate an
/// address before doing any network I/O, not just inside `set_fixed_ip`.
pub fn validate_fixed_ip_host_octet(addr: Ipv4Addr) -> Result<()> {
    let host = addr.octets()[3];
    if host == 0 || host == 255 {
        return Err(Error::ReservedHostOctet { addr, octet: host });
    }
    Ok(())
}

/// Drives the three EEPROM primitives and the composed operations over a
/// [`CncTransport`] already connected to the target device. The
/// read-verify-retry attempt count and spacing are taken from the
/// [`TuningConfig`] handed to [`EepromService::new`] rather than hardcoded,
/// so a `--config` override actually changes retry behavior.
pub struct EepromService<'a> {
    transport: &'a CncTransport,
    verify_attempts: u32,
    verify_spacing: Duration,
}

/// Outcome of a composed EEPROM operation: the flags/IP state as read back
/// from the device after the operation completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub flags: u8,
    pub stored_ip: Ipv4Addr,
}

impl<'a> EepromService<'a> {
    pub fn new(transport: &'a CncTransport, config: &TuningConfig) -> Self {
        Self {
            transport,
            verify_attempts: config.eeprom_verify_attempts,
            verify_spacing: config.eeprom_verify_spacing(),
        }
    }

    /// Read-one-byte: `{C1=0x07, C2=0xAC, C3=(r<<4)|0x0C, C4=0x00}`.
    pub fn read_byte(&self, register: u8) -> Result<u8> {
        let c3 = (register << 4) | 0x0C;
        let response = self
            .transport
            .request(HL2_EEPROM_ADDR, 0x07, I2C_PROXY_ADDR, c3, 0x00)
            .map_err(|_| Error::ReadFailed { register })?;
        Ok(((response >> 8) & 0xFF) as u8)
    }

    /// Write-one-byte: `{C1=0x06, C2=0xAC, C3=(r<<4), C4=v}`.
    /// Treated as posted; no reply value is interpreted.
    pub fn write_byte(&self, register: u8, value: u8) -> Result<()> {
        let c3 = register << 4;
        self.transport
            .request(HL2_EEPROM_ADDR, 0x06, I2C_PROXY_ADDR, c3, value)
            .map(|_| ())
            .map_err(|_| Error::WriteFailed { register })
    }

    /// Read-verify-retry: up to `verify_attempts` attempts, `verify_spacing`
    /// apart, `expected == 0xFF` accepts any successfully-read value.
    pub fn verify(&self, register: u8, expected: u8) -> Result<u8> {
        let mut last = 0u8;
        for attempt in 0..self.verify_attempts {
            match self.read_byte(register) {
                Ok(observed) => {
                    last = observed;
                    if expected == ACCEPT_ANY || observed == expected {
                        return Ok(observed);
                    }
                }
                Err(_) => {
                    // A failed read during verify is still a failed attempt,
                    // not an abort; the loop retries like any mismatch.
                }
            }
            if attempt + 1 < self.verify_attempts {
                thread::sleep(self.verify_spacing);
            }
        }
        Err(Error::VerifyTimeout {
            register,
            observed: last,
            expected,
        })
    }

    fn write_and_verify(&self, register: u8, value: u8) -> Result<u8> {
        self.write_byte(register, value)?;
        self.verify(register, value)
    }

    fn read_back_ip(&self) -> Result<Ipv4Addr> {
        let mut octets = [0u8; 4];
        for (i, reg) in IP_REGISTERS.iter().enumerate() {
            octets[i] = self.verify(*reg, ACCEPT_ANY)?;
        }
        Ok(Ipv4Addr::from(octets))
    }

    /// Set fixed IP to `addr`. Rejects a `.0` or `.255` host octet up
    /// front; reads current flags; writes registers 0x08..0x0B in order,
    /// each verified before the next; then sets flag `0x80` and verifies
    /// the flags byte.
    pub fn set_fixed_ip(&self, addr: Ipv4Addr) -> Result<ProvisionReport> {
        validate_fixed_ip_host_octet(addr)?;
        let octets = addr.octets();

        let current_flags = self.read_byte(FLAGS_REGISTER)?;

        for (reg, value) in IP_REGISTERS.iter().zip(octets.iter()) {
            self.write_and_verify(*reg, *value)?;
        }

        let new_flags = current_flags | FLAG_USE_FIXED_IP;
        self.write_and_verify(FLAGS_REGISTER, new_flags)?;

        let stored_ip = self.read_back_ip()?;
        tracing::info!(%addr, flags = format_args!("{:#04x}", new_flags), "fixed IP set; reboot or power-cycle the radio to apply");

        Ok(ProvisionReport {
            flags: new_flags,
            stored_ip,
        })
    }

    /// Clear fixed IP: drop flags `0x80` and `0x20`, zero the IP registers.
    pub fn clear_fixed_ip(&self) -> Result<ProvisionReport> {
        let current_flags = self.read_byte(FLAGS_REGISTER)?;
        let new_flags = current_flags & !(FLAG_USE_FIXED_IP | FLAG_FAVOR_DHCP);
        self.write_and_verify(FLAGS_REGISTER, new_flags)?;

        for reg in IP_REGISTERS {
            self.write_and_verify(reg, 0)?;
        }

        let stored_ip = self.read_back_ip()?;
        tracing::info!(flags = format_args!("{:#04x}", new_flags), "fixed IP cleared");

        Ok(ProvisionReport {
            flags: new_flags,
            stored_ip,
        })
    }

    /// Set the DHCP-preferred flag (`0x20`), preserving the rest.
    pub fn set_dhcp_preferred(&self) -> Result<u8> {
        let current_flags = self.read_byte(FLAGS_REGISTER)?;
        let new_flags = current_flags | FLAG_FAVOR_DHCP;
        self.write_and_verify(FLAGS_REGISTER, new_flags)
    }

    /// Clear the DHCP-preferred flag (`0x20`), preserving the rest.
    pub fn clear_dhcp_preferred(&self) -> Result<u8> {
        let current_flags = self.read_byte(FLAGS_REGISTER)?;
        let new_flags = current_flags & !FLAG_FAVOR_DHCP;
        self.write_and_verify(FLAGS_REGISTER, new_flags)
    }

    /// Reboot: fire-and-forget C&C frame to target `0x3A`, `{0,0,0,1}`.
    pub fn reboot(&self) -> Result<()> {
        self.transport
            .send_reboot(HL2_REBOOT_ADDR, 0x00, 0x00, 0x00, 0x01)
    }
}
