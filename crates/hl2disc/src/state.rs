// SPDX-License-Identifier: GPL-3.0-or-later

//! Persisted state: the two single-line text files carrying the
//! last-used target and discovery port across invocations.
//!
//! Grounded directly on the original application's own persistence: it
//! `fopen`s `ip.addr`/`radio.port` in the current directory, writes one
//! line, and treats a missing or malformed file as "no saved value" rather
//! than an error. This module keeps that exact behavior.

const IP_ADDR_FILE: &str = "ip.addr";
const RADIO_PORT_FILE: &str = "radio.port";

/// Read the saved target hostname/IP, if any. A missing file, an empty
/// file, or any I/O error is treated as "nothing saved" rather than
/// propagated.
pub fn load_ip_addr() -> Option<String> {
    let content = std::fs::read_to_string(IP_ADDR_FILE).ok()?;
    let line = content.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Persist the target hostname/IP for the next invocation.
pub fn save_ip_addr(target: &str) -> std::io::Result<()> {
    std::fs::write(IP_ADDR_FILE, format!("{target}\n"))
}

/// Remove the saved target, mirroring the original's `unlink("ip.addr")`
/// when the operator clears the field.
pub fn clear_ip_addr() {
    let _ = std::fs::remove_file(IP_ADDR_FILE);
}

/// Read the saved discovery port, if any and within `1..=65535`.
pub fn load_radio_port() -> Option<u16> {
    let content = std::fs::read_to_string(RADIO_PORT_FILE).ok()?;
    let line = content.lines().next()?.trim();
    let port: i64 = line.parse().ok()?;
    if (1..=65535).contains(&port) {
        Some(port as u16)
    } else {
        None
    }
}

/// Persist the discovery port for the next invocation.
pub fn save_radio_port(port: u16) -> std::io::Result<()> {
    std::fs::write(RADIO_PORT_FILE, format!("{port}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // These tests touch real files in the current directory (matching the
    // original's behavior exactly), so they're serialized to avoid racing
    // each other across threads within this process.
    static GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn round_trips_ip_addr() {
        let _g = GUARD.lock().unwrap();
        clear_ip_addr();
        assert_eq!(load_ip_addr(), None);
        save_ip_addr("192.168.1.50").unwrap();
        assert_eq!(load_ip_addr(), Some("192.168.1.50".to_string()));
        clear_ip_addr();
        assert_eq!(load_ip_addr(), None);
    }

    #[test]
    fn round_trips_radio_port() {
        let _g = GUARD.lock().unwrap();
        save_radio_port(1025).unwrap();
        assert_eq!(load_radio_port(), Some(1025));
        let _ = std::fs::remove_file(RADIO_PORT_FILE);
    }

    #[test]
    fn out_of_range_port_is_treated_as_absent() {
        let _g = GUARD.lock().unwrap();
        std::fs::write(RADIO_PORT_FILE, "70000\n").unwrap();
        assert_eq!(load_radio_port(), None);
        let _ = std::fs::remove_file(RADIO_PORT_FILE);
    }

    #[test]
    fn malformed_port_file_is_treated_as_absent() {
        let _g = GUARD.lock().unwrap();
        std::fs::write(RADIO_PORT_FILE, "not-a-number\n").unwrap();
        assert_eq!(load_radio_port(), None);
        let _ = std::fs::remove_file(RADIO_PORT_FILE);
    }
}
