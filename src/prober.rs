use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::trace;

use crate::classify::{classify_tcp, classify_udp};
use crate::config::ScanSettings;
use crate::probes::{build_http_probe, UdpProbe};
use crate::types::{ProbeResult, Transport};

/// Probe one TCP port.
///
/// Connects, waits for a banner, and if the service stays silent sends the
/// HTTP probe and waits once more. Refused connections, timeouts on both
/// reads and socket errors all yield `None`.
pub async fn probe_tcp(target: IpAddr, port: u16, settings: &ScanSettings) -> Option<ProbeResult> {
    let addr = SocketAddr::new(target, port);
    let wait = settings.tcp_timeout;

    let mut stream = match timeout(wait, TcpStream::connect(addr)).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            trace!(%addr, error = %e, "tcp connect failed");
            return None;
        }
        Err(_) => {
            trace!(%addr, "tcp connect timed out");
            return None;
        }
    };

    let mut buf = vec![0u8; settings.tcp_recv_buf];
    let banner = timeout(wait, stream.read(&mut buf)).await;
    let n = match banner {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            trace!(%addr, error = %e, "tcp banner read failed");
            return None;
        }
        Err(_) => {
            trace!(%addr, "no banner, sending http probe");
            match timeout(wait, stream.write_all(&build_http_probe())).await {
                Ok(Ok(())) => {}
                _ => return None,
            }
            match timeout(wait, stream.read(&mut buf)).await {
                Ok(Ok(n)) => n,
                _ => {
                    trace!(%addr, "no reply to http probe");
                    return None;
                }
            }
        }
    };

    if n == 0 {
        return None;
    }
    buf.truncate(n);
    let protocol = classify_tcp(&buf);
    trace!(%addr, bytes = n, %protocol, "tcp reply classified");
    Some(ProbeResult::new(port, Transport::Tcp, protocol, buf))
}

/// Probe one UDP port with every [`UdpProbe`] in turn over a single socket.
///
/// Each non-empty reply becomes its own candidate, so up to two results may
/// come back for one port. A timeout or socket error skips to the next probe.
pub async fn probe_udp(target: IpAddr, port: u16, settings: &ScanSettings) -> Vec<ProbeResult> {
    let addr = SocketAddr::new(target, port);
    let wait = settings.udp_timeout;
    let mut out = Vec::new();

    let local: SocketAddr = match target {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = match UdpSocket::bind(local).await {
        Ok(s) => s,
        Err(e) => {
            trace!(%addr, error = %e, "udp bind failed");
            return out;
        }
    };

    let mut buf = vec![0u8; settings.udp_recv_buf];
    for probe in UdpProbe::ALL {
        let packet = probe.build();
        match timeout(wait, socket.send_to(&packet, addr)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                trace!(%addr, ?probe, error = %e, "udp send failed");
                continue;
            }
            Err(_) => continue,
        }

        match timeout(wait, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, from))) if n > 0 => {
                let reply = buf[..n].to_vec();
                let protocol = classify_udp(probe, &packet, &reply);
                trace!(%addr, %from, ?probe, bytes = n, %protocol, "udp reply classified");
                out.push(ProbeResult::new(port, Transport::Udp, protocol, reply));
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => trace!(%addr, ?probe, error = %e, "udp recv failed"),
            Err(_) => trace!(%addr, ?probe, "udp recv timed out"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppProtocol;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn fast() -> ScanSettings {
        ScanSettings::default()
            .with_tcp_timeout(Duration::from_millis(200))
            .with_udp_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn tcp_banner_is_classified() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.unwrap();
            let _ = s.write_all(b"+OK POP3 ready\r\n").await;
            tokio::time::sleep(Duration::from_millis(300)).await;
        });

        let r = probe_tcp(IpAddr::V4(Ipv4Addr::LOCALHOST), port, &fast())
            .await
            .unwrap();
        assert_eq!(r.protocol, AppProtocol::Pop3);
        assert_eq!(r.transport, Transport::Tcp);
        assert_eq!(r.banner.as_deref(), Some("+OK POP3 ready\\r\\n"));
    }

    #[tokio::test]
    async fn silent_tcp_service_gets_http_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.unwrap();
            let mut req = [0u8; 64];
            let n = s.read(&mut req).await.unwrap();
            assert_eq!(&req[..n], b"GET / HTTP/1.1\n\n");
            let _ = s.write_all(b"HTTP/1.1 404 Not Found\r\n\r\n").await;
        });

        let r = probe_tcp(IpAddr::V4(Ipv4Addr::LOCALHOST), port, &fast())
            .await
            .unwrap();
        assert_eq!(r.protocol, AppProtocol::Http);
    }

    #[tokio::test]
    async fn closed_tcp_port_yields_nothing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(probe_tcp(IpAddr::V4(Ipv4Addr::LOCALHOST), port, &fast())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn udp_time_reply_is_sntp() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                let Ok((n, from)) = server.recv_from(&mut buf).await else {
                    return;
                };
                // only answer the time probe
                if n == 48 {
                    let _ = server.send_to(&[0x1c; 48], from).await;
                }
            }
        });

        let results = probe_udp(IpAddr::V4(Ipv4Addr::LOCALHOST), port, &fast()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].protocol, AppProtocol::Sntp);
        assert!(results[0].banner.is_none());
    }
}
