use thiserror::Error;

/// Fatal errors of a scan run. Per-probe socket failures never surface here;
/// they only mean "no result" for that port.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("host {0} has no IPv4 address")]
    NoIpv4(String),
    #[error("invalid port range {low}-{high}")]
    InvalidRange { low: u16, high: u16 },
    #[error("scan interrupted")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn messages() {
        let e = ScanError::InvalidRange { low: 90, high: 80 };
        assert_eq!(e.to_string(), "invalid port range 90-80");
        assert_eq!(ScanError::NoIpv4("h".into()).to_string(), "host h has no IPv4 address");
        assert_eq!(ScanError::Interrupted.to_string(), "scan interrupted");
    }

    #[test]
    fn resolve_keeps_io_source() {
        let e = ScanError::Resolve {
            host: "h".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such host"),
        };
        assert_eq!(e.to_string(), "failed to resolve host h: no such host");
        assert!(e.source().is_some());
    }
}
