//! Transport selection: which kind of channel to probe.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Pipe,
    Fifo,
    Socket,
    SocketPair,
}

impl TransportKind {
    pub fn is_socket(&self) -> bool {
        matches!(self, TransportKind::Socket | TransportKind::SocketPair)
    }

    /// Whether the read side only sees end-of-channel once the write side is
    /// closed.
    pub fn closes_writer_after_probe(&self) -> bool {
        matches!(self, TransportKind::Pipe | TransportKind::Fifo)
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pipe" => Ok(TransportKind::Pipe),
            "fifo" => Ok(TransportKind::Fifo),
            "socket" => Ok(TransportKind::Socket),
            "socketpair" => Ok(TransportKind::SocketPair),
            _ => Err(format!(
                "unknown IPC type '{s}', expected one of fifo, pipe, socket, socketpair"
            )),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Pipe => "pipe",
            TransportKind::Fifo => "fifo",
            TransportKind::Socket => "socket",
            TransportKind::SocketPair => "socketpair",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketDomain {
    Local,
    Inet,
    Inet6,
}

impl SocketDomain {
    pub fn pf_name(&self) -> &'static str {
        match self {
            SocketDomain::Local => "PF_LOCAL",
            SocketDomain::Inet => "PF_INET",
            SocketDomain::Inet6 => "PF_INET6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketKind {
    Dgram,
    Stream,
}

/// Socket domain and type, written `[inet-|inet6-](dgram|stream)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SocketFlavor {
    pub domain: SocketDomain,
    pub kind: SocketKind,
}

impl Default for SocketFlavor {
    fn default() -> Self {
        Self {
            domain: SocketDomain::Local,
            kind: SocketKind::Dgram,
        }
    }
}

impl FromStr for SocketFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let (domain, rest) = if let Some(rest) = lower.strip_prefix("inet6-") {
            (SocketDomain::Inet6, rest)
        } else if let Some(rest) = lower.strip_prefix("inet-") {
            (SocketDomain::Inet, rest)
        } else {
            (SocketDomain::Local, lower.as_str())
        };
        let kind = match rest {
            "dgram" => SocketKind::Dgram,
            "stream" => SocketKind::Stream,
            _ => {
                return Err(format!(
                    "invalid socket type '{s}', use one of [inet[6]-](dgram|stream)"
                ))
            }
        };
        Ok(Self { domain, kind })
    }
}

impl fmt::Display for SocketFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.kind {
            SocketKind::Dgram => "dgram",
            SocketKind::Stream => "stream",
        })
    }
}

/// Everything needed to decide how to build a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelSpec {
    pub kind: TransportKind,
    /// Only meaningful for socket transports.
    pub flavor: SocketFlavor,
}

impl ChannelSpec {
    pub fn new(kind: TransportKind, flavor: SocketFlavor) -> Self {
        Self { kind, flavor }
    }

    pub fn is_stream_socket(&self) -> bool {
        self.kind == TransportKind::Socket && self.flavor.kind == SocketKind::Stream
    }

    /// Human description used in report headers, e.g. "PF_INET stream socket".
    pub fn describe(&self) -> String {
        match self.kind {
            TransportKind::Pipe | TransportKind::Fifo => self.kind.to_string(),
            TransportKind::SocketPair => format!("socketpair {}", self.flavor),
            TransportKind::Socket => {
                format!("{} {} socket", self.flavor.domain.pf_name(), self.flavor)
            }
        }
    }
}
