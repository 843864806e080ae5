//! Channel provisioning for the four transports.
//!
//! Every endpoint handed out is already non-blocking, with capacity hints
//! applied. Stream sockets need a second process and are returned as a
//! `StreamRendezvous` instead of a ready channel.

use std::fs::{File, OpenOptions};
use std::net::{SocketAddrV4, SocketAddrV6};
use std::os::unix::fs::OpenOptionsExt;

use anyhow::{Context, Result};
use nix::sys::stat::Mode;
use socket2::{Domain, SockAddr, Socket, Type};

use ipcbuf_core::IpcbufConfig;

use crate::cleanup::PathGuard;
use crate::endpoint::Endpoint;
use crate::hints::{apply_pipe_capacity, apply_socket_hints, CapacityHints};
use crate::peer::StreamRendezvous;
use crate::platform::Platform;
use crate::transport::{ChannelSpec, SocketDomain, SocketKind, TransportKind};

/// A provisioned channel: a write side for the probe and a read side for the
/// drain. The write side can be closed early so the reader sees end of data.
pub struct Channel {
    spec: ChannelSpec,
    writer: Option<Endpoint>,
    reader: Endpoint,
    _cleanup: Option<PathGuard>,
}

impl Channel {
    fn new(spec: ChannelSpec, writer: Endpoint, reader: Endpoint, cleanup: Option<PathGuard>) -> Self {
        Self {
            spec,
            writer: Some(writer),
            reader,
            _cleanup: cleanup,
        }
    }

    pub fn spec(&self) -> ChannelSpec {
        self.spec
    }

    pub fn writer(&self) -> Option<&Endpoint> {
        self.writer.as_ref()
    }

    pub fn writer_mut(&mut self) -> Result<&mut Endpoint> {
        self.writer.as_mut().context("write side already closed")
    }

    pub fn reader(&self) -> &Endpoint {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut Endpoint {
        &mut self.reader
    }

    /// Close the write side if this transport needs that before draining.
    pub fn finish_writing(&mut self) {
        if self.spec.kind.closes_writer_after_probe() {
            self.writer = None;
        }
    }
}

pub enum Provisioned {
    Ready(Channel),
    Stream(StreamRendezvous),
}

pub struct Provisioner<'a> {
    config: &'a IpcbufConfig,
    hints: CapacityHints,
    platform: Platform,
}

impl<'a> Provisioner<'a> {
    pub fn new(config: &'a IpcbufConfig, hints: CapacityHints, platform: Platform) -> Self {
        Self {
            config,
            hints,
            platform,
        }
    }

    pub fn provision(&self, spec: ChannelSpec) -> Result<Provisioned> {
        tracing::info!(transport = %spec.describe(), "provisioning channel");
        match spec.kind {
            TransportKind::Pipe => self.pipe(spec).map(Provisioned::Ready),
            TransportKind::Fifo => self.fifo(spec).map(Provisioned::Ready),
            TransportKind::SocketPair => self.socket_pair(spec).map(Provisioned::Ready),
            TransportKind::Socket if spec.flavor.kind == SocketKind::Stream => {
                let addr = self.address(spec.flavor.domain)?;
                let cleanup = self.local_cleanup(spec.flavor.domain);
                StreamRendezvous::bind(spec, self.platform, self.hints, addr, cleanup)
                    .map(Provisioned::Stream)
            }
            TransportKind::Socket => self.datagram_socket(spec).map(Provisioned::Ready),
        }
    }

    fn pipe(&self, spec: ChannelSpec) -> Result<Channel> {
        let (r, w) = nix::unistd::pipe().context("pipe")?;
        let writer = Endpoint::from_file(spec.kind, self.platform, File::from(w));
        let reader = Endpoint::from_file(spec.kind, self.platform, File::from(r));

        if let Some(size) = self.hints.pipe_capacity {
            apply_pipe_capacity(self.platform, &writer, size)?;
        }
        writer.set_nonblocking()?;
        reader.set_nonblocking()?;
        Ok(Channel::new(spec, writer, reader, None))
    }

    fn fifo(&self, spec: ChannelSpec) -> Result<Channel> {
        let path = &self.config.paths.fifo;
        nix::unistd::mkfifo(path.as_path(), Mode::from_bits_truncate(0o644))
            .with_context(|| format!("mkfifo {}", path.display()))?;
        let cleanup = PathGuard::new(path);

        // The read side must exist before a non-blocking open for writing succeeds.
        let r = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .context("open")?;
        let w = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .context("open")?;

        let writer = Endpoint::from_file(spec.kind, self.platform, w);
        let reader = Endpoint::from_file(spec.kind, self.platform, r);
        writer.set_nonblocking()?;
        reader.set_nonblocking()?;
        Ok(Channel::new(spec, writer, reader, Some(cleanup)))
    }

    fn socket_pair(&self, spec: ChannelSpec) -> Result<Channel> {
        let (r, w) = Socket::pair(Domain::UNIX, socket_type(spec.flavor.kind), None)
            .context("socketpair")?;
        apply_socket_hints(&self.hints, Some(&r), Some(&w))?;

        let writer = Endpoint::from_socket(spec.kind, self.platform, w);
        let reader = Endpoint::from_socket(spec.kind, self.platform, r);
        writer.set_nonblocking()?;
        reader.set_nonblocking()?;
        Ok(Channel::new(spec, writer, reader, None))
    }

    /// A datagram socket bound to the configured address and connected to
    /// itself. Both ends of the channel are the same socket.
    fn datagram_socket(&self, spec: ChannelSpec) -> Result<Channel> {
        let addr = self.address(spec.flavor.domain)?;
        let socket = Socket::new(socket_domain(spec.flavor.domain), Type::DGRAM, None)
            .context("socket")?;
        socket.bind(&addr).context("bind")?;
        let cleanup = self.local_cleanup(spec.flavor.domain);
        socket.connect(&addr).context("connect")?;
        apply_socket_hints(&self.hints, Some(&socket), Some(&socket))?;

        let reader = socket.try_clone().context("dup")?;
        let writer = Endpoint::from_socket(spec.kind, self.platform, socket);
        let reader = Endpoint::from_socket(spec.kind, self.platform, reader);
        writer.set_nonblocking()?;
        Ok(Channel::new(spec, writer, reader, cleanup))
    }

    fn address(&self, domain: SocketDomain) -> Result<SockAddr> {
        let net = &self.config.network;
        Ok(match domain {
            SocketDomain::Local => {
                SockAddr::unix(&self.config.paths.socket).context("socket path")?
            }
            SocketDomain::Inet => SocketAddrV4::new(net.inet_addr, net.port).into(),
            SocketDomain::Inet6 => SocketAddrV6::new(net.inet6_addr, net.port, 0, 0).into(),
        })
    }

    fn local_cleanup(&self, domain: SocketDomain) -> Option<PathGuard> {
        (domain == SocketDomain::Local).then(|| PathGuard::new(&self.config.paths.socket))
    }
}

pub(crate) fn socket_domain(domain: SocketDomain) -> Domain {
    match domain {
        SocketDomain::Local => Domain::UNIX,
        SocketDomain::Inet => Domain::IPV4,
        SocketDomain::Inet6 => Domain::IPV6,
    }
}

fn socket_type(kind: SocketKind) -> Type {
    match kind {
        SocketKind::Dgram => Type::DGRAM,
        SocketKind::Stream => Type::STREAM,
    }
}
