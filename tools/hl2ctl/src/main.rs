// SPDX-License-Identifier: GPL-3.0-or-later

//! `hl2ctl` — parses the CLI surface, resolves a target radio, drives one
//! EEPROM provisioning operation, and maps the outcome to a stable exit
//! code.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use hl2disc::cnc::CncTransport;
use hl2disc::discovery::{self, DiscoveryOptions};
use hl2disc::eeprom::{validate_fixed_ip_host_octet, EepromService};
use hl2disc::error::{Error, Result};
use hl2disc::state;
use hl2disc::TuningConfig;

/// Discover and provision Hermes-Lite 2 / HPSDR radios over the network.
#[derive(Parser, Debug)]
#[command(name = "hl2ctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target radio IPv4 address; if omitted, one broadcast discovery pass
    /// locates the first responder.
    #[arg(long)]
    ip: Option<Ipv4Addr>,

    /// Set fixed IP to A.B.C.D (rejects host octet 0 or 255).
    #[arg(long, value_name = "A.B.C.D")]
    set: Option<Ipv4Addr>,

    /// Clear fixed-IP flag, zero fixed-IP bytes, clear DHCP-preferred.
    #[arg(long)]
    clear: bool,

    /// Set the DHCP-preferred flag.
    #[arg(long = "dhcp-first")]
    dhcp_first: bool,

    /// Clear the DHCP-preferred flag.
    #[arg(long = "clear-dhcp-first")]
    clear_dhcp_first: bool,

    /// Issue a remote reboot.
    #[arg(long)]
    reboot: bool,

    /// Discovery UDP port (persisted to `radio.port`).
    #[arg(long)]
    port: Option<u16>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Optional JSON tuning file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the discovery receive window for this run only.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

enum Operation {
    SetFixedIp(Ipv4Addr),
    ClearFixedIp,
    DhcpFirst,
    ClearDhcpFirst,
    Reboot,
}

fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(&args) {
        Ok(message) => {
            println!("{message}");
            std::process::exit(0);
        }
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(args: &Args) -> Result<String> {
    let operation = select_operation(args)?;
    let config = load_config(args.config.as_deref())?;
    let port = args.port.or_else(state::load_radio_port).unwrap_or(1024);

    let target = resolve_target(args, port, &config)?;

    if let Some(ip) = args.ip {
        let _ = state::save_ip_addr(&ip.to_string());
    }
    if let Some(p) = args.port {
        let _ = state::save_radio_port(p);
    }

    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.cnc_timeout());
    let transport = CncTransport::connect_with_timeout(target, timeout)?;
    let service = EepromService::new(&transport, &config);

    match operation {
        Operation::SetFixedIp(addr) => {
            let report = service.set_fixed_ip(addr)?;
            Ok(format!(
                "fixed IP set to {} (flags={:#04x}); reboot or power-cycle the radio to apply",
                report.stored_ip, report.flags
            ))
        }
        Operation::ClearFixedIp => {
            let report = service.clear_fixed_ip()?;
            Ok(format!(
                "fixed IP cleared (flags={:#04x}, stored={})",
                report.flags, report.stored_ip
            ))
        }
        Operation::DhcpFirst => {
            let flags = service.set_dhcp_preferred()?;
            Ok(format!("DHCP-preferred flag set (flags={flags:#04x})"))
        }
        Operation::ClearDhcpFirst => {
            let flags = service.clear_dhcp_preferred()?;
            Ok(format!("DHCP-preferred flag cleared (flags={flags:#04x})"))
        }
        Operation::Reboot => {
            service.reboot()?;
            Ok("reboot command sent".to_string())
        }
    }
}

fn select_operation(args: &Args) -> Result<Operation> {
    let mut selected = Vec::new();
    if let Some(addr) = args.set {
        validate_fixed_ip_host_octet(addr)?;
        selected.push(Operation::SetFixedIp(addr));
    }
    if args.clear {
        selected.push(Operation::ClearFixedIp);
    }
    if args.dhcp_first {
        selected.push(Operation::DhcpFirst);
    }
    if args.clear_dhcp_first {
        selected.push(Operation::ClearDhcpFirst);
    }
    if args.reboot {
        selected.push(Operation::Reboot);
    }

    match selected.len() {
        0 => Err(Error::InvalidArgument(
            "no operation selected: use one of --set, --clear, --dhcp-first, --clear-dhcp-first, --reboot".to_string(),
        )),
        1 => Ok(selected.into_iter().next().unwrap()),
        _ => Err(Error::InvalidArgument(
            "multiple operations selected; exactly one is allowed".to_string(),
        )),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<TuningConfig> {
    match path {
        Some(p) if p.exists() => TuningConfig::from_file(p),
        _ => Ok(TuningConfig::default()),
    }
}

fn resolve_target(args: &Args, port: u16, config: &TuningConfig) -> Result<Ipv4Addr> {
    if let Some(ip) = args.ip {
        return Ok(ip);
    }
    if let Some(saved) = state::load_ip_addr() {
        if let Ok(ip) = saved.parse::<Ipv4Addr>() {
            info!(%ip, "using previously saved target");
            return Ok(ip);
        }
    }

    info!("no target given, running a broadcast discovery pass");
    let options = DiscoveryOptions {
        port,
        receive_window: config.discovery_window(),
        allow_loopback: false,
        remote_receive_window: config.discovery_window_routed(),
        tcp_connect_ceiling: config.tcp_connect_ceiling(),
    };
    let table = discovery::discover_broadcast(&options)?;
    if table.is_empty() {
        return Err(Error::DiscoveryEmpty);
    }
    let device = table.iter().next().expect("table checked non-empty above");
    Ok(device.network.remote_addr)
}
