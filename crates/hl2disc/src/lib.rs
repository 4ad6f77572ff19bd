// SPDX-License-Identifier: GPL-3.0-or-later

//! HPSDR/METIS device discovery and Hermes-Lite 2 EEPROM provisioning.
//!
//! Dependency order, leaves first: [`frame`] (wire codec), [`iface`]
//! (local interface enumeration), [`discovery`] (drives [`frame`] and
//! [`iface`] into a [`table::DeviceTable`]), [`classify`] (raw reply to
//! typed [`classify::Device`]), [`cnc`] (the C&C RPC layer), [`eeprom`]
//! (composed provisioning operations on top of [`cnc`]). [`config`] and
//! [`state`] are cross-cutting: tuning knobs and the two persisted text
//! files recording the last-known target, respectively.

pub mod classify;
pub mod cnc;
pub mod config;
pub mod discovery;
pub mod eeprom;
pub mod error;
pub mod frame;
pub mod iface;
pub mod state;
pub mod table;

pub use classify::{Device, DeviceFamily, DeviceStatus};
pub use cnc::CncTransport;
pub use config::TuningConfig;
pub use error::{Error, Result};
pub use table::DeviceTable;
