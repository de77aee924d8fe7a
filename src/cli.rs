use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::{ScanSettings, DEFAULT_WORKERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One `PROTO: port app` line per entry.
    Text,
    /// Full report as pretty JSON.
    Json,
}

/// proto-scan: concurrent TCP/UDP port scanner that fingerprints
/// HTTP, SMTP, IMAP, POP3, SNTP and DNS services.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "proto-scan",
    version,
    about = "Concurrent TCP/UDP port scanner with application-protocol fingerprinting.",
    long_about = None
)]
pub struct Cli {
    /// IP address or hostname to scan.
    pub target: String,

    /// Scan TCP ports.
    #[arg(short = 't', long)]
    pub tcp: bool,

    /// Scan UDP ports.
    #[arg(short = 'u', long)]
    pub udp: bool,

    /// Inclusive port range.
    #[arg(
        short = 'p',
        long,
        num_args = 2,
        value_names = ["LOW", "HIGH"],
        required = true,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub ports: Vec<u16>,

    /// Max concurrent probe tasks.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// TCP connect/receive timeout in milliseconds.
    #[arg(long = "tcp-timeout-ms", default_value_t = 500)]
    pub tcp_timeout_ms: u64,

    /// UDP receive timeout in milliseconds.
    #[arg(long = "udp-timeout-ms", default_value_t = 3000)]
    pub udp_timeout_ms: u64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Debug logging on stderr (RUST_LOG takes precedence).
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// `(low, high)` when exactly two ports were given.
    pub fn port_range(&self) -> Option<(u16, u16)> {
        match self.ports.as_slice() {
            &[low, high] => Some((low, high)),
            _ => None,
        }
    }

    pub fn settings(&self) -> ScanSettings {
        ScanSettings::default()
            .with_workers(self.workers)
            .with_tcp_timeout(Duration::from_millis(self.tcp_timeout_ms))
            .with_udp_timeout(Duration::from_millis(self.udp_timeout_ms))
    }
}
