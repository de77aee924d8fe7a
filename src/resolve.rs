use std::net::{IpAddr, Ipv4Addr};

use tokio::net::lookup_host;
use tracing::debug;

use crate::error::{Result, ScanError};

/// Resolve `host` to a single IPv4 address. IPv4 literals skip the resolver.
pub async fn resolve_ipv4(host: &str) -> Result<Ipv4Addr> {
    let host = host.trim();
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }

    let addrs = lookup_host((host, 0)).await.map_err(|source| ScanError::Resolve {
        host: host.to_string(),
        source,
    })?;
    let ip = addrs
        .filter_map(|a| match a.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| ScanError::NoIpv4(host.to_string()))?;
    debug!(host, %ip, "resolved target");
    Ok(ip)
}
