//! Reply classification. Pure functions over bytes so they can be tested
//! without sockets.

use crate::probes::{NameHeader, UdpProbe};
use crate::types::AppProtocol;

/// Substrings checked against a TCP reply, first match wins.
const TCP_SIGNATURES: &[(&str, AppProtocol)] = &[
    ("HTTP/1.1", AppProtocol::Http),
    ("smtp", AppProtocol::Smtp),
    ("IMAP", AppProtocol::Imap),
    ("OK", AppProtocol::Pop3),
];

/// Classify a TCP banner or response. Non UTF-8 data is unclassified.
pub fn classify_tcp(reply: &[u8]) -> AppProtocol {
    let Ok(text) = std::str::from_utf8(reply) else {
        return AppProtocol::None;
    };
    TCP_SIGNATURES
        .iter()
        .find(|(needle, _)| text.contains(*needle))
        .map(|&(_, proto)| proto)
        .unwrap_or(AppProtocol::None)
}

/// Classify the reply to a UDP probe. `sent` is the probe that was sent.
pub fn classify_udp(probe: UdpProbe, sent: &[u8], reply: &[u8]) -> AppProtocol {
    let valid = match probe {
        // No clock reference to check against: the right size is enough.
        UdpProbe::Time => reply.len() == probe.reply_len(),
        UdpProbe::NameQuery => reply.len() >= probe.reply_len() && name_reply_matches(sent, reply),
    };
    if valid {
        probe.protocol()
    } else {
        AppProtocol::None
    }
}

fn name_reply_matches(sent: &[u8], reply: &[u8]) -> bool {
    match (NameHeader::decode(sent), NameHeader::decode(reply)) {
        (Some(ours), Some(theirs)) => ours.id == theirs.id,
        _ => false,
    }
}
