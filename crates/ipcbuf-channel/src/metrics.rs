//! Auxiliary metrics: what the platform itself says about buffer sizes.
//!
//! Purely observational. Nothing here feeds back into the probe.

use std::os::fd::AsRawFd;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::endpoint::Endpoint;
use crate::platform::{Platform, Queue};
use crate::transport::ChannelSpec;

/// A named integer reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub name: String,
    pub value: i64,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// PIPE_BUF, F_GETPIPE_SZ and _PC_PIPE_BUF for a pipe's write end.
pub fn pipe_metrics(platform: Platform, endpoint: &Endpoint) -> Result<Vec<Metric>> {
    let mut metrics = Vec::new();
    let fd = endpoint.as_raw_fd();

    #[cfg(target_os = "linux")]
    metrics.push(Metric::new("PIPE_BUF", libc::PIPE_BUF as i64));

    if platform.reports_pipe_capacity() {
        metrics.push(Metric::new("F_GETPIPE_SZ", pipe_capacity(fd)?));
    }

    let pc = unsafe { libc::fpathconf(fd, libc::_PC_PIPE_BUF) };
    if pc < 0 {
        return Err(std::io::Error::last_os_error()).context("fpathconf");
    }
    metrics.push(Metric::new("_PC_PIPE_BUF", pc as i64));

    Ok(metrics)
}

#[cfg(target_os = "linux")]
fn pipe_capacity(fd: std::os::fd::RawFd) -> Result<i64> {
    let size = unsafe { libc::fcntl(fd, libc::F_GETPIPE_SZ) };
    if size < 0 {
        return Err(std::io::Error::last_os_error()).context("fcntl(F_GETPIPE_SZ)");
    }
    Ok(size as i64)
}

#[cfg(not(target_os = "linux"))]
fn pipe_capacity(_fd: std::os::fd::RawFd) -> Result<i64> {
    anyhow::bail!("F_GETPIPE_SZ is not available on this platform")
}

/// SO_SNDBUF of a socket endpoint. None for non-sockets.
pub fn send_buffer(endpoint: &Endpoint) -> Result<Option<Metric>> {
    endpoint
        .socket()
        .map(|s| {
            let n = s.send_buffer_size().context("getsockopt")?;
            Ok(Metric::new("SO_SNDBUF", n as i64))
        })
        .transpose()
}

/// SO_RCVBUF of a socket endpoint. None for non-sockets.
pub fn recv_buffer(endpoint: &Endpoint) -> Result<Option<Metric>> {
    endpoint
        .socket()
        .map(|s| {
            let n = s.recv_buffer_size().context("getsockopt")?;
            Ok(Metric::new("SO_RCVBUF", n as i64))
        })
        .transpose()
}

/// Depth of one of the endpoint's queues, named after the control call used.
pub fn queue_depth(endpoint: &Endpoint, queue: Queue) -> Result<Option<Metric>> {
    let depth = endpoint.queue_depth(queue).context("ioctl")?;
    Ok(depth.map(|(control, n)| Metric::new(control.name(), n as i64)))
}

/// The kernel tunable related to `spec`, if the platform has one.
///
/// Best effort: a tunable that cannot be read is logged and skipped.
pub fn tunable(platform: Platform, spec: &ChannelSpec) -> Option<Metric> {
    let name = platform.tunable(spec)?;
    match read_tunable(name) {
        Ok(value) => Some(Metric::new(short_name(name), value)),
        Err(e) => {
            tracing::warn!(tunable = name, error = %e, "failed to read kernel tunable");
            None
        }
    }
}

/// Last dotted component: "net.unix.max_dgram_qlen" → "max_dgram_qlen".
pub fn short_name(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((_, last)) if !last.is_empty() => last,
        _ => name,
    }
}

#[cfg(target_os = "linux")]
fn read_tunable(name: &str) -> Result<i64> {
    let path = std::path::Path::new("/proc/sys").join(name.replace('.', "/"));
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_tunable(&text).with_context(|| format!("unexpected value in {}", path.display()))
}

#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
fn read_tunable(name: &str) -> Result<i64> {
    let cname = std::ffi::CString::new(name).context("sysctl name contains null byte")?;
    let mut buf = [0u8; 8];
    let mut len = buf.len();
    let rc = unsafe {
        libc::sysctlbyname(
            cname.as_ptr(),
            buf.as_mut_ptr() as *mut libc::c_void,
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc < 0 {
        return Err(std::io::Error::last_os_error()).context("sysctl");
    }
    match len {
        4 => Ok(i32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]) as i64),
        8 => Ok(i64::from_ne_bytes(buf)),
        other => anyhow::bail!("sysctl {name} returned {other} bytes"),
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
fn read_tunable(name: &str) -> Result<i64> {
    anyhow::bail!("no way to read {name} on this platform")
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_tunable(text: &str) -> Result<i64> {
    let value: i64 = text
        .split_whitespace()
        .next()
        .context("empty value")?
        .parse()
        .context("not a number")?;
    if value < 1 {
        anyhow::bail!("value {value} is not positive");
    }
    Ok(value)
}
