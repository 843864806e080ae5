//! Platform capabilities.
//!
//! Every question the collaborators need answered about the host OS goes
//! through `Platform`, decided once at compile time. The probe engine never
//! looks at any of this.

use serde::Serialize;

use crate::transport::{ChannelSpec, SocketDomain, SocketKind, TransportKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    FreeBsd,
    NetBsd,
    MacOs,
    OtherUnix,
}

/// Which queue of an endpoint to ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    /// Bytes waiting to be read.
    Read,
    /// Bytes written but not yet consumed by the peer.
    Write,
    /// Room left in the send buffer.
    Space,
}

/// Control call that reports a queue depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueControl {
    Fionread,
    /// BSD write queue.
    Fionwrite,
    /// BSD free send space.
    Fionspace,
    Siocoutq,
}

impl QueueControl {
    pub fn name(&self) -> &'static str {
        match self {
            QueueControl::Fionread => "FIONREAD",
            QueueControl::Fionwrite => "FIONWRITE",
            QueueControl::Fionspace => "FIONSPACE",
            QueueControl::Siocoutq => "SIOCOUTQ",
        }
    }
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "freebsd") {
            Platform::FreeBsd
        } else if cfg!(target_os = "netbsd") {
            Platform::NetBsd
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::OtherUnix
        }
    }

    /// Can a pipe be asked to grow or shrink (F_SETPIPE_SZ)?
    pub fn supports_pipe_capacity_hint(&self) -> bool {
        matches!(self, Platform::Linux)
    }

    /// Can the current pipe capacity be read back (F_GETPIPE_SZ)?
    pub fn reports_pipe_capacity(&self) -> bool {
        matches!(self, Platform::Linux)
    }

    /// The control call answering `queue` for this transport, if any.
    ///
    /// Linux and FreeBSD answer these only for sockets.
    pub fn queue_control(&self, kind: TransportKind, queue: Queue) -> Option<QueueControl> {
        if matches!(self, Platform::Linux | Platform::FreeBsd) && !kind.is_socket() {
            return None;
        }
        let bsd = matches!(self, Platform::FreeBsd | Platform::NetBsd);
        match queue {
            Queue::Read => Some(QueueControl::Fionread),
            Queue::Write if bsd => Some(QueueControl::Fionwrite),
            Queue::Write if *self == Platform::Linux => Some(QueueControl::Siocoutq),
            Queue::Space if bsd => Some(QueueControl::Fionspace),
            Queue::Write | Queue::Space => None,
        }
    }

    /// The kernel tunable most closely related to `spec`'s buffer, if any.
    ///
    /// These are not the same quantity as the probed size, only related.
    pub fn tunable(&self, spec: &ChannelSpec) -> Option<&'static str> {
        if *self == Platform::OtherUnix {
            return None;
        }
        let linux = *self == Platform::Linux;
        match spec.kind {
            TransportKind::Pipe | TransportKind::Fifo => None,
            TransportKind::SocketPair => Some(if linux {
                "net.unix.max_dgram_qlen"
            } else {
                "net.local.dgram.recvspace"
            }),
            TransportKind::Socket => match (spec.flavor.domain, spec.flavor.kind) {
                (SocketDomain::Local, SocketKind::Dgram) if linux => Some("net.unix.max_dgram_qlen"),
                (SocketDomain::Local, SocketKind::Dgram) => Some("net.local.dgram.recvspace"),
                (SocketDomain::Local, SocketKind::Stream) if !linux => {
                    Some("net.local.stream.recvspace")
                }
                (SocketDomain::Inet, SocketKind::Dgram) if !linux => Some("net.inet.udp.recvspace"),
                (SocketDomain::Inet, SocketKind::Stream) if !linux => Some("net.inet.tcp.recvspace"),
                (SocketDomain::Inet6, SocketKind::Dgram) if *self == Platform::NetBsd => {
                    Some("net.inet6.udp6.recvspace")
                }
                (SocketDomain::Inet6, SocketKind::Stream) if *self == Platform::NetBsd => {
                    Some("net.inet6.tcp6.recvspace")
                }
                _ => None,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::FreeBsd => "freebsd",
            Platform::NetBsd => "netbsd",
            Platform::MacOs => "macos",
            Platform::OtherUnix => "unix",
        }
    }
}
