//! Stream socket rendezvous.
//!
//! A stream socket cannot be probed from a single descriptor pair the way a
//! datagram socket can: the write side only exists once a peer connects. The
//! listener is bound and listening before the process forks, so the child
//! (connector) can connect immediately and start probing while the parent
//! (acceptor) accepts, waits for the child, then drains.

use std::io::{self, Write};
use std::os::fd::AsRawFd;

use anyhow::{bail, Context, Result};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use socket2::{SockAddr, Socket, Type};

use crate::cleanup::PathGuard;
use crate::endpoint::Endpoint;
use crate::hints::{apply_recv_buffer, apply_send_buffer, CapacityHints};
use crate::platform::Platform;
use crate::provision::socket_domain;
use crate::transport::{ChannelSpec, SocketDomain};

/// How long the acceptor sleeps in poll() between checks on the child.
const ACCEPT_POLL_MS: libc::c_int = 100;

pub struct StreamRendezvous {
    spec: ChannelSpec,
    platform: Platform,
    hints: CapacityHints,
    listener: Socket,
    addr: SockAddr,
    _cleanup: Option<PathGuard>,
}

impl StreamRendezvous {
    pub(crate) fn bind(
        spec: ChannelSpec,
        platform: Platform,
        hints: CapacityHints,
        addr: SockAddr,
        cleanup: Option<PathGuard>,
    ) -> Result<Self> {
        let listener =
            Socket::new(socket_domain(spec.flavor.domain), Type::STREAM, None).context("socket")?;
        if spec.flavor.domain != SocketDomain::Local {
            listener
                .set_reuse_address(true)
                .context("setsockopt(SO_REUSEADDR)")?;
        }
        // Accepted sockets inherit the listener's receive buffer.
        if let Some(size) = hints.recv_buffer {
            apply_recv_buffer(&listener, size)?;
        }
        listener.bind(&addr).context("bind")?;
        listener.listen(1).context("listen")?;

        tracing::debug!(transport = %spec.describe(), "listening");
        Ok(Self {
            spec,
            platform,
            hints,
            listener,
            addr,
            _cleanup: cleanup,
        })
    }

    pub fn spec(&self) -> ChannelSpec {
        self.spec
    }

    /// Open a connection to the listener. The returned endpoint is the
    /// probe's write side.
    pub fn connect(&self) -> Result<Endpoint> {
        let socket = Socket::new(self.addr.domain(), Type::STREAM, None).context("socket")?;
        if let Some(size) = self.hints.send_buffer {
            apply_send_buffer(&socket, size)?;
        }
        socket.connect(&self.addr).context("connect")?;

        let endpoint = Endpoint::from_socket(self.spec.kind, self.platform, socket);
        endpoint.set_nonblocking()?;
        Ok(endpoint)
    }

    /// Accept one pending connection, blocking until it arrives.
    pub fn accept(&self) -> Result<Endpoint> {
        let (socket, _) = self.listener.accept().context("accept")?;
        self.endpoint_for(socket)
    }

    /// Fork into the two roles. Buffered stdout is flushed first so the
    /// child does not repeat it.
    pub fn split(self) -> Result<Role> {
        io::stdout().flush().context("flush stdout")?;

        // SAFETY: the process is single-threaded at this point; the child
        // only touches descriptors it owns and returns into ordinary code.
        match unsafe { fork() }.context("fork")? {
            ForkResult::Child => {
                tracing::debug!("connector started");
                let writer = self.connect()?;
                Ok(Role::Connector(writer))
            }
            ForkResult::Parent { child } => {
                tracing::debug!(child = child.as_raw(), "acceptor waiting for connector");
                Ok(Role::Acceptor(Acceptor {
                    rendezvous: self,
                    child,
                }))
            }
        }
    }

    fn endpoint_for(&self, socket: Socket) -> Result<Endpoint> {
        let endpoint = Endpoint::from_socket(self.spec.kind, self.platform, socket);
        endpoint.set_nonblocking()?;
        Ok(endpoint)
    }
}

pub enum Role {
    /// The child: owns the write side and runs the probe.
    Connector(Endpoint),
    /// The parent: accepts, waits for the child, then drains.
    Acceptor(Acceptor),
}

pub struct Acceptor {
    rendezvous: StreamRendezvous,
    child: Pid,
}

impl Acceptor {
    pub fn spec(&self) -> ChannelSpec {
        self.rendezvous.spec
    }

    /// Accept the connector's connection and wait for the connector to exit.
    ///
    /// The connector's exit status is checked: a connector that failed makes
    /// this an error, including one that never connected.
    pub fn accept_and_wait(self) -> Result<Endpoint> {
        let reader = self.accept_while_alive()?;
        let status = waitpid(self.child, None).context("waitpid")?;
        check_exit(status)?;
        Ok(reader)
    }

    fn accept_while_alive(&self) -> Result<Endpoint> {
        let listener = &self.rendezvous.listener;
        listener
            .set_nonblocking(true)
            .context("fcntl set flags")?;

        loop {
            match listener.accept() {
                Ok((socket, _)) => return self.rendezvous.endpoint_for(socket),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e).context("accept"),
            }

            let status = waitpid(self.child, Some(WaitPidFlag::WNOHANG)).context("waitpid")?;
            if status != WaitStatus::StillAlive {
                // The child may have connected and exited between the two calls.
                return match listener.accept() {
                    Ok((socket, _)) => {
                        check_exit(status)?;
                        self.rendezvous.endpoint_for(socket)
                    }
                    Err(_) => {
                        check_exit(status)?;
                        bail!("connector exited without connecting")
                    }
                };
            }

            wait_readable(listener, ACCEPT_POLL_MS)?;
        }
    }
}

fn check_exit(status: WaitStatus) -> Result<()> {
    match status {
        WaitStatus::Exited(_, 0) => Ok(()),
        WaitStatus::Exited(pid, code) => bail!("connector {pid} exited with status {code}"),
        WaitStatus::Signaled(pid, signal, _) => bail!("connector {pid} killed by {signal}"),
        other => bail!("unexpected connector status: {other:?}"),
    }
}

fn wait_readable(socket: &Socket, timeout_ms: libc::c_int) -> Result<()> {
    let mut fds = [libc::pollfd {
        fd: socket.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    }];

    // SAFETY: `fds` is a valid array of pollfd for the length passed.
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err).context("poll");
        }
    }
    Ok(())
}
