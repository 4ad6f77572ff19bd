// SPDX-License-Identifier: GPL-3.0-or-later

//! Tuning configuration: timing knobs given stable defaults and an
//! optional JSON override file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Runtime tuning for discovery/EEPROM timing. Every field has a default
/// matching the protocol's documented values; the JSON file is optional and
/// only needs to mention the fields it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Read-verify-retry attempt count.
    #[serde(default = "default_verify_attempts")]
    pub eeprom_verify_attempts: u32,

    /// Sleep between read-verify-retry attempts, in milliseconds.
    #[serde(default = "default_verify_spacing_ms")]
    pub eeprom_verify_spacing_ms: u64,

    /// Local (broadcast/unicast) discovery receive window, in milliseconds.
    #[serde(default = "default_discovery_window_ms")]
    pub discovery_window_ms: u64,

    /// Routed (remote unicast) discovery receive window, in milliseconds.
    #[serde(default = "default_discovery_window_routed_ms")]
    pub discovery_window_routed_ms: u64,

    /// C&C reply timeout, in milliseconds.
    #[serde(default = "default_cnc_timeout_ms")]
    pub cnc_timeout_ms: u64,

    /// TCP connect ceiling, in milliseconds.
    #[serde(default = "default_tcp_connect_ms")]
    pub tcp_connect_ms: u64,
}

fn default_verify_attempts() -> u32 {
    12
}

fn default_verify_spacing_ms() -> u64 {
    150
}

fn default_discovery_window_ms() -> u64 {
    2_000
}

fn default_discovery_window_routed_ms() -> u64 {
    5_000
}

fn default_cnc_timeout_ms() -> u64 {
    1_000
}

fn default_tcp_connect_ms() -> u64 {
    3_000
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            eeprom_verify_attempts: default_verify_attempts(),
            eeprom_verify_spacing_ms: default_verify_spacing_ms(),
            discovery_window_ms: default_discovery_window_ms(),
            discovery_window_routed_ms: default_discovery_window_routed_ms(),
            cnc_timeout_ms: default_cnc_timeout_ms(),
            tcp_connect_ms: default_tcp_connect_ms(),
        }
    }
}

impl TuningConfig {
    /// Load from a JSON file. A missing file is not an error here; callers
    /// that want "absent file = defaults" should check existence first and
    /// call [`TuningConfig::default`] instead (see `hl2ctl`'s `--config`
    /// handling).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::InvalidArgument(format!("invalid config {}: {e}", path.display())))
    }

    pub fn eeprom_verify_spacing(&self) -> Duration {
        Duration::from_millis(self.eeprom_verify_spacing_ms)
    }

    pub fn discovery_window(&self) -> Duration {
        Duration::from_millis(self.discovery_window_ms)
    }

    pub fn discovery_window_routed(&self) -> Duration {
        Duration::from_millis(self.discovery_window_routed_ms)
    }

    pub fn cnc_timeout(&self) -> Duration {
        Duration::from_millis(self.cnc_timeout_ms)
    }

    pub fn tcp_connect_ceiling(&self) -> Duration {
        Duration::from_millis(self.tcp_connect_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = TuningConfig::default();
        assert_eq!(cfg.eeprom_verify_attempts, 12);
        assert_eq!(cfg.eeprom_verify_spacing_ms, 150);
        assert_eq!(cfg.discovery_window_ms, 2_000);
        assert_eq!(cfg.discovery_window_routed_ms, 5_000);
        assert_eq!(cfg.cnc_timeout_ms, 1_000);
        assert_eq!(cfg.tcp_connect_ms, 3_000);
    }

    #[test]
    fn partial_json_fills_missing_fields_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.json");
        std::fs::write(&path, r#"{"eeprom_verify_attempts": 5}"#).unwrap();
        let cfg = TuningConfig::from_file(&path).unwrap();
        assert_eq!(cfg.eeprom_verify_attempts, 5);
        assert_eq!(cfg.cnc_timeout_ms, 1_000);
    }

    #[test]
    fn malformed_json_is_an_invalid_argument_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.json");
        std::fs::write(&path, "not json").unwrap();
        let err = TuningConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
