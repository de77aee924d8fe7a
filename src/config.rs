use std::time::Duration;

/// Number of probe tasks allowed to run at once.
pub const DEFAULT_WORKERS: usize = 10;
/// TCP connect and receive timeout.
pub const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_millis(500);
/// UDP receive timeout. UDP services don't refuse, so wait longer.
pub const DEFAULT_UDP_TIMEOUT: Duration = Duration::from_secs(3);

const TCP_RECV_BUF: usize = 1024;
const UDP_RECV_BUF: usize = 2048;

/// Tunables for a scan run. `Default` gives 10 workers, 500 ms TCP and 3 s UDP timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub workers: usize,
    pub tcp_timeout: Duration,
    pub udp_timeout: Duration,
    pub tcp_recv_buf: usize,
    pub udp_recv_buf: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            tcp_timeout: DEFAULT_TCP_TIMEOUT,
            udp_timeout: DEFAULT_UDP_TIMEOUT,
            tcp_recv_buf: TCP_RECV_BUF,
            udp_recv_buf: UDP_RECV_BUF,
        }
    }
}

impl ScanSettings {
    /// Set the worker count. Zero is clamped to one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_tcp_timeout(mut self, timeout: Duration) -> Self {
        self.tcp_timeout = timeout;
        self
    }

    pub fn with_udp_timeout(mut self, timeout: Duration) -> Self {
        self.udp_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let s = ScanSettings::default();
        assert_eq!(s.workers, 10);
        assert_eq!(s.tcp_timeout, Duration::from_millis(500));
        assert_eq!(s.udp_timeout, Duration::from_secs(3));
        assert_eq!(s.tcp_recv_buf, 1024);
        assert_eq!(s.udp_recv_buf, 2048);
    }

    #[test]
    fn zero_workers_clamped() {
        let s = ScanSettings::default().with_workers(0);
        assert_eq!(s.workers, 1);
    }
}
