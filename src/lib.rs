//! Library crate for proto-scan: probe packets, reply classification, per-port
//! probers and the scan coordinator.
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod prober;
pub mod probes;
pub mod resolve;
pub mod scanner;
pub mod types;

pub use config::ScanSettings;
pub use error::ScanError;
pub use scanner::Scanner;
pub use types::{AppProtocol, ProbeResult, ResultTable, ScanReport, ScanRequest, Transport};
