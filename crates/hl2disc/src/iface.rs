// SPDX-License-Identifier: GPL-3.0-or-later

//! Local interface enumeration for broadcast-probe discovery.
//!
//! Wraps [`if_addrs`] (the portable interface-listing crate this workspace
//! already reaches for elsewhere) with the inclusion policy this subsystem
//! needs: up/running, non-loopback (with a documented escape hatch),
//! nonzero non-broadcast-storm broadcast address, and session-scoped
//! duplicate suppression.

use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Interface name prefixes that are almost never useful as discovery
/// interfaces. Advisory only: failing to recognize a prefix here is not
/// a correctness bug, just a noisier probe list.
const DENY_PREFIXES: &[&str] = &["docker", "veth", "br-", "virbr", "lo:", "tun", "tap"];

/// One candidate local interface for a broadcast discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub broadcast: Ipv4Addr,
}

/// List interfaces eligible for broadcast discovery.
///
/// `allow_loopback` permits the loopback interface through rule 2's
/// exception, for platforms/tests where a same-host HPSDR emulator only
/// answers on `lo`.
pub fn enumerate(allow_loopback: bool) -> crate::error::Result<Vec<Candidate>> {
    // `get_if_addrs` only reports interfaces that currently carry an
    // assigned address, which in practice already excludes down
    // interfaces; there's no separate up/running flag to check.
    let ifaces = if_addrs::get_if_addrs().map_err(crate::error::Error::Io)?;

    let mut seen_broadcast: HashSet<Ipv4Addr> = HashSet::new();
    let mut out = Vec::new();

    for iface in ifaces {
        if !allow_loopback && iface.is_loopback() {
            continue;
        }

        let if_addrs::IfAddr::V4(v4) = &iface.addr else {
            continue;
        };

        let Some(broadcast) = v4.broadcast else {
            continue;
        };
        // Rule 3: reject the unspecified address outright. Reject the
        // all-networks address too, except on loopback where some
        // platforms report it in lieu of a real subnet broadcast.
        if broadcast.is_unspecified() {
            continue;
        }
        if broadcast == Ipv4Addr::new(255, 255, 255, 255) && !iface.is_loopback() {
            continue;
        }

        if !seen_broadcast.insert(broadcast) {
            continue;
        }

        out.push(Candidate {
            name: iface.name.clone(),
            address: v4.ip,
            netmask: v4.netmask,
            broadcast,
        });
    }

    Ok(out)
}

/// Whether an interface name matches the advisory deny-list. Exposed
/// separately from [`enumerate`] so callers can choose to log a skip
/// instead of silently filtering, but `enumerate` does not apply it itself
/// since the policy is explicitly non-authoritative.
pub fn is_denied_name(name: &str) -> bool {
    DENY_PREFIXES.iter().any(|p| name.starts_with(p))
}
