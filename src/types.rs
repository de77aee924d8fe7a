use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::error::{Result, ScanError};

/// Transport a port was probed over.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Transport {
    Tcp,
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
        })
    }
}

/// Application protocol recognised in a reply. `None` means a reply was seen
/// but could not be classified.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppProtocol {
    #[default]
    None,
    Http,
    Smtp,
    Imap,
    Pop3,
    Sntp,
    Dns,
}

impl AppProtocol {
    pub fn is_classified(self) -> bool {
        self != AppProtocol::None
    }

    /// Label used in text output; empty for an unclassified reply.
    pub fn label(self) -> &'static str {
        match self {
            AppProtocol::None => "",
            AppProtocol::Http => "HTTP",
            AppProtocol::Smtp => "SMTP",
            AppProtocol::Imap => "IMAP",
            AppProtocol::Pop3 => "POP3",
            AppProtocol::Sntp => "SNTP",
            AppProtocol::Dns => "DNS",
        }
    }
}

impl fmt::Display for AppProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of probing one port over one transport.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub port: u16,
    pub transport: Transport,
    pub protocol: AppProtocol,
    /// Printable preview of a TCP reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(skip)]
    pub reply: Vec<u8>,
}

impl ProbeResult {
    pub fn new(port: u16, transport: Transport, protocol: AppProtocol, reply: Vec<u8>) -> Self {
        let banner = match transport {
            Transport::Tcp => banner_preview(&reply),
            Transport::Udp => None,
        };
        Self {
            port,
            transport,
            protocol,
            banner,
            reply,
        }
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.transport, self.port, self.protocol)
    }
}

const BANNER_MAX: usize = 60;

fn banner_preview(reply: &[u8]) -> Option<String> {
    if reply.is_empty() {
        return None;
    }
    let s = String::from_utf8_lossy(reply)
        .replace('\n', "\\n")
        .replace('\r', "\\r");
    Some(s.chars().take(BANNER_MAX).collect())
}

/// Immutable input of a scan run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub target: Ipv4Addr,
    pub tcp: bool,
    pub udp: bool,
    pub low: u16,
    pub high: u16,
}

impl ScanRequest {
    /// Validate the inclusive range `[low, high]`. Port 0 is never valid.
    pub fn new(target: Ipv4Addr, tcp: bool, udp: bool, low: u16, high: u16) -> Result<Self> {
        if low == 0 || low > high {
            return Err(ScanError::InvalidRange { low, high });
        }
        Ok(Self {
            target,
            tcp,
            udp,
            low,
            high,
        })
    }

    pub fn ports(&self) -> std::ops::RangeInclusive<u16> {
        self.low..=self.high
    }

    pub fn transports(&self) -> Vec<Transport> {
        let mut out = Vec::with_capacity(2);
        if self.tcp {
            out.push(Transport::Tcp);
        }
        if self.udp {
            out.push(Transport::Udp);
        }
        out
    }

    /// Number of probe tasks the coordinator will dispatch.
    pub fn task_count(&self) -> u64 {
        let ports = u64::from(self.high - self.low) + 1;
        ports * self.transports().len() as u64
    }
}

/// At most one result per port, kept in insertion order.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ResultTable {
    entries: Vec<ProbeResult>,
    #[serde(skip)]
    index: HashMap<u16, usize>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate for its port.
    ///
    /// - no entry yet: insert
    /// - existing entry unclassified, candidate classified: replace in place
    /// - otherwise: drop the candidate
    ///
    /// Returns whether the table changed.
    pub fn offer(&mut self, result: ProbeResult) -> bool {
        match self.index.get(&result.port) {
            None => {
                self.index.insert(result.port, self.entries.len());
                self.entries.push(result);
                true
            }
            Some(&i) => {
                let existing = &mut self.entries[i];
                if !existing.protocol.is_classified() && result.protocol.is_classified() {
                    *existing = result;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn get(&self, port: u16) -> Option<&ProbeResult> {
        self.index.get(&port).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[ProbeResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aggregated outcome of one run.
#[derive(Serialize, Debug, Clone)]
pub struct ScanReport {
    pub target: String,
    pub probes_dispatched: u64,
    pub started_at: String,
    pub finished_at: String,
    pub udp: ResultTable,
    pub tcp: ResultTable,
}

impl ScanReport {
    /// `(transport, port, protocol)` rows, UDP table first, each in drain order.
    pub fn rows(&self) -> Vec<(Transport, u16, AppProtocol)> {
        self.udp
            .entries()
            .iter()
            .chain(self.tcp.entries())
            .map(|r| (r.transport, r.port, r.protocol))
            .collect()
    }

    /// Text rendering, one `"<TRANSPORT>: <port> <protocol>"` line per row.
    pub fn lines(&self) -> Vec<String> {
        self.udp
            .entries()
            .iter()
            .chain(self.tcp.entries())
            .map(ToString::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn udp(port: u16, protocol: AppProtocol) -> ProbeResult {
        ProbeResult::new(port, Transport::Udp, protocol, vec![1])
    }

    #[test]
    fn unclassified_upgrades_regardless_of_order() {
        let mut a = ResultTable::new();
        a.offer(udp(123, AppProtocol::None));
        a.offer(udp(123, AppProtocol::Sntp));

        let mut b = ResultTable::new();
        b.offer(udp(123, AppProtocol::Sntp));
        b.offer(udp(123, AppProtocol::None));

        assert_eq!(a.get(123).map(|r| r.protocol), Some(AppProtocol::Sntp));
        assert_eq!(b.get(123).map(|r| r.protocol), Some(AppProtocol::Sntp));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn first_classification_is_sticky() {
        let mut t = ResultTable::new();
        assert!(t.offer(udp(53, AppProtocol::Dns)));
        assert!(!t.offer(udp(53, AppProtocol::Sntp)));
        assert_eq!(t.get(53).map(|r| r.protocol), Some(AppProtocol::Dns));
    }

    #[test]
    fn upgrade_keeps_position() {
        let mut t = ResultTable::new();
        t.offer(udp(10, AppProtocol::None));
        t.offer(udp(20, AppProtocol::Dns));
        t.offer(udp(10, AppProtocol::Sntp));
        let ports: Vec<_> = t.entries().iter().map(|r| (r.port, r.protocol)).collect();
        assert_eq!(ports, vec![(10, AppProtocol::Sntp), (20, AppProtocol::Dns)]);
    }

    #[test]
    fn display_keeps_trailing_space_for_unclassified() {
        let r = ProbeResult::new(8080, Transport::Tcp, AppProtocol::None, b"??".to_vec());
        assert_eq!(r.to_string(), "TCP: 8080 ");
        let r = ProbeResult::new(80, Transport::Tcp, AppProtocol::Http, b"HTTP/1.1".to_vec());
        assert_eq!(r.to_string(), "TCP: 80 HTTP");
    }

    #[test]
    fn banner_preview_escapes_and_truncates() {
        let reply = format!("220 mail\r\n{}", "x".repeat(100));
        let r = ProbeResult::new(25, Transport::Tcp, AppProtocol::None, reply.into_bytes());
        let banner = r.banner.unwrap();
        assert!(banner.starts_with("220 mail\\r\\n"));
        assert_eq!(banner.chars().count(), 60);
        assert!(udp(53, AppProtocol::Dns).banner.is_none());
    }

    #[test]
    fn request_rejects_bad_ranges() {
        let ip = Ipv4Addr::LOCALHOST;
        assert!(ScanRequest::new(ip, true, false, 90, 80).is_err());
        assert!(ScanRequest::new(ip, true, false, 0, 80).is_err());
        let req = ScanRequest::new(ip, true, true, 80, 89).unwrap();
        assert_eq!(req.task_count(), 20);
        assert_eq!(req.transports(), vec![Transport::Tcp, Transport::Udp]);
    }
}
