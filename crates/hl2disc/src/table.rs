// SPDX-License-Identifier: GPL-3.0-or-later

//! Device table: the result of one discovery session.
//!
//! Indexed by discovery order, capped at a fixed capacity, and deduplicated
//! by MAC address. Mirrors the capacity-bound table pattern this workspace
//! already uses for gossip dedup, minus the TTL expiry (a discovery session
//! is short-lived and thrown away whole, never pruned in place).

use crate::classify::Device;

/// Devices beyond this count in a single session are dropped, not queued.
/// "Capacity in the low hundreds" per the discovery model this subsystem
/// implements; chosen comfortably above any real HPSDR network segment.
pub const DEFAULT_CAPACITY: usize = 256;

/// The set of devices found during one discovery pass.
pub struct DeviceTable {
    capacity: usize,
    devices: Vec<Device>,
    overflowed: bool,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            devices: Vec::new(),
            overflowed: false,
        }
    }

    /// Insert a classified device, honoring the dedup-by-MAC invariant: a
    /// hit updates the existing record's network attachment in place and
    /// discards the rest of the new reply; a miss appends, unless the
    /// table is already at capacity, in which case the reply is dropped
    /// and the overflow flag is set.
    pub fn insert(&mut self, device: Device) {
        if let Some(existing) = self.devices.iter_mut().find(|d| d.mac == device.mac) {
            existing.network = device.network;
            existing.status = device.status;
            return;
        }
        if self.devices.len() >= self.capacity {
            self.overflowed = true;
            tracing::warn!(capacity = self.capacity, "device table full, dropping reply");
            return;
        }
        self.devices.push(device);
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn into_vec(self) -> Vec<Device> {
        self.devices
    }

    /// Find a device by its reported network address, the lookup
    /// `hl2ctl --ip` uses to resolve an operation target without a fresh
    /// discovery pass.
    pub fn find_by_addr(&self, addr: std::net::Ipv4Addr) -> Option<&Device> {
        self.devices.iter().find(|d| d.network.remote_addr == addr)
    }
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new()
    }
}
