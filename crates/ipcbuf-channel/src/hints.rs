//! Capacity hints applied before probing.
//!
//! A hint the platform cannot honor is an error, not a warning: probing
//! without it would measure something other than what was asked for.

use std::os::fd::AsRawFd;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use socket2::Socket;

use crate::endpoint::Endpoint;
use crate::platform::Platform;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityHints {
    /// Requested pipe capacity (F_SETPIPE_SZ).
    pub pipe_capacity: Option<usize>,
    /// Requested SO_SNDBUF on the write side.
    pub send_buffer: Option<usize>,
    /// Requested SO_RCVBUF on the read side.
    pub recv_buffer: Option<usize>,
}

impl CapacityHints {
    pub fn has_socket_hints(&self) -> bool {
        self.send_buffer.is_some() || self.recv_buffer.is_some()
    }
}

/// Ask the kernel to resize a pipe.
pub fn apply_pipe_capacity(platform: Platform, endpoint: &Endpoint, size: usize) -> Result<()> {
    if !platform.supports_pipe_capacity_hint() {
        bail!("setting the pipe size is not supported on this platform");
    }
    set_pipe_size(endpoint.as_raw_fd(), size).context("fcntl(F_SETPIPE_SZ)")?;
    tracing::info!(size, "pipe capacity hint applied");
    Ok(())
}

#[cfg(target_os = "linux")]
fn set_pipe_size(fd: std::os::fd::RawFd, size: usize) -> std::io::Result<()> {
    let size = libc::c_int::try_from(size)
        .map_err(|_| std::io::Error::from_raw_os_error(libc::EINVAL))?;
    if unsafe { libc::fcntl(fd, libc::F_SETPIPE_SZ, size) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_pipe_size(_fd: std::os::fd::RawFd, _size: usize) -> std::io::Result<()> {
    Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
}

pub fn apply_recv_buffer(socket: &Socket, size: usize) -> Result<()> {
    socket
        .set_recv_buffer_size(size)
        .context("setsockopt(SO_RCVBUF)")?;
    tracing::info!(size, "receive buffer hint applied");
    Ok(())
}

pub fn apply_send_buffer(socket: &Socket, size: usize) -> Result<()> {
    socket
        .set_send_buffer_size(size)
        .context("setsockopt(SO_SNDBUF)")?;
    tracing::info!(size, "send buffer hint applied");
    Ok(())
}

/// Apply whichever socket hints are set. Either side may be absent.
pub fn apply_socket_hints(
    hints: &CapacityHints,
    reader: Option<&Socket>,
    writer: Option<&Socket>,
) -> Result<()> {
    if let (Some(size), Some(socket)) = (hints.recv_buffer, reader) {
        apply_recv_buffer(socket, size)?;
    }
    if let (Some(size), Some(socket)) = (hints.send_buffer, writer) {
        apply_send_buffer(socket, size)?;
    }
    Ok(())
}
