//! Fixed-layout probe payloads.
//!
//! The UDP payloads are fingerprinting probes, not conformant clients: they
//! only need to look enough like a real query to make a server answer.

use time::OffsetDateTime;

use crate::types::AppProtocol;

/// Request line sent to TCP services that don't greet on connect.
pub const HTTP_PROBE: &[u8] = b"GET / HTTP/1.1\n\n";

/// Size of the time probe, and of the reply it expects.
pub const TIME_PROBE_LEN: usize = 48;

// LI=0, VN=3, mode=4
const TIME_FIRST_BYTE: u8 = (0 << 6) | (3 << 3) | 4;
const TIME_STRATUM: u8 = 1;
const TIME_POLL: i8 = 0;
const TIME_PRECISION: i8 = -20;

/// Size of the name-query header (id, flags, four counts).
pub const NAME_HEADER_LEN: usize = 12;
pub const NAME_QUERY_ID: u16 = 20;
// Standard query, recursion desired.
const NAME_QUERY_FLAGS: u16 = 0x0100;
const NAME_QUERY_NAME: &str = "a.ru";
const QTYPE_A: u16 = 1;
const QCLASS_IN: u16 = 1;

/// The two UDP probe kinds, in the order they are sent to a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UdpProbe {
    NameQuery,
    Time,
}

impl UdpProbe {
    pub const ALL: [UdpProbe; 2] = [UdpProbe::NameQuery, UdpProbe::Time];

    pub fn build(self) -> Vec<u8> {
        match self {
            UdpProbe::NameQuery => build_name_query_probe(),
            UdpProbe::Time => build_time_probe(),
        }
    }

    /// Protocol a reply is credited to when it validates.
    pub fn protocol(self) -> AppProtocol {
        match self {
            UdpProbe::NameQuery => AppProtocol::Dns,
            UdpProbe::Time => AppProtocol::Sntp,
        }
    }

    /// Bytes of the reply the classifier decodes. A time reply must be exactly
    /// this long; a name-query reply only needs its header.
    pub fn reply_len(self) -> usize {
        match self {
            UdpProbe::NameQuery => NAME_HEADER_LEN,
            UdpProbe::Time => TIME_PROBE_LEN,
        }
    }
}

/// Time probe stamped with the current wall clock.
pub fn build_time_probe() -> Vec<u8> {
    let now = OffsetDateTime::now_utc();
    let ts = now.unix_timestamp() as f64 + f64::from(now.nanosecond()) / 1e9;
    build_time_probe_at(ts)
}

/// Time probe with all four timestamp fields set to `ts` (Unix seconds).
pub fn build_time_probe_at(ts: f64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TIME_PROBE_LEN);
    buf.push(TIME_FIRST_BYTE);
    buf.push(TIME_STRATUM);
    buf.extend_from_slice(&TIME_POLL.to_be_bytes());
    buf.extend_from_slice(&TIME_PRECISION.to_be_bytes());
    // root delay, root dispersion, reference id
    buf.extend_from_slice(&[0u8; 12]);

    let (secs, frac) = timestamp_words(ts);
    for _ in 0..4 {
        buf.extend_from_slice(&secs.to_be_bytes());
        buf.extend_from_slice(&frac.to_be_bytes());
    }
    debug_assert_eq!(buf.len(), TIME_PROBE_LEN);
    buf
}

/// Split the decimal rendering of `ts` at the point: whole seconds and the
/// fraction digits read as an integer. The second word is an echo value,
/// not a fixed-point fraction of a second.
pub fn timestamp_words(ts: f64) -> (u32, u32) {
    let text = ts.to_string();
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "0"));
    let secs = whole.parse::<u64>().unwrap_or(0) as u32;
    // nine digits always fit in a u32
    let digits = &frac[..frac.len().min(9)];
    let frac = digits.parse::<u32>().unwrap_or(0);
    (secs, frac)
}

/// Header shared by the name-query probe and its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameHeader {
    pub id: u16,
    pub flags: u16,
    pub questions: u16,
    pub answers: u16,
    pub authority: u16,
    pub additional: u16,
}

impl NameHeader {
    /// Decode the first twelve bytes of `buf`; `None` when it is shorter.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let head = buf.get(..NAME_HEADER_LEN)?;
        let word = |i: usize| u16::from_be_bytes([head[i], head[i + 1]]);
        Some(Self {
            id: word(0),
            flags: word(2),
            questions: word(4),
            answers: word(6),
            authority: word(8),
            additional: word(10),
        })
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        for w in [
            self.id,
            self.flags,
            self.questions,
            self.answers,
            self.authority,
            self.additional,
        ] {
            buf.extend_from_slice(&w.to_be_bytes());
        }
    }
}

/// One-question A/IN query for `a.ru`, labels in natural order.
pub fn build_name_query_probe() -> Vec<u8> {
    let header = NameHeader {
        id: NAME_QUERY_ID,
        flags: NAME_QUERY_FLAGS,
        questions: 1,
        answers: 0,
        authority: 0,
        additional: 0,
    };
    let mut buf = Vec::with_capacity(NAME_HEADER_LEN + NAME_QUERY_NAME.len() + 6);
    header.encode_into(&mut buf);
    for label in NAME_QUERY_NAME.split('.') {
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
    buf.extend_from_slice(&QTYPE_A.to_be_bytes());
    buf.extend_from_slice(&QCLASS_IN.to_be_bytes());
    buf
}

pub fn build_http_probe() -> Vec<u8> {
    HTTP_PROBE.to_vec()
}
