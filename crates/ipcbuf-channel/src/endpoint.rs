//! One side of a channel: a pipe/FIFO file descriptor or a socket.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

use anyhow::{Context, Result};
use socket2::Socket;

use ipcbuf_core::DrainSource;

use crate::platform::{Platform, Queue, QueueControl};
use crate::transport::TransportKind;

enum Io {
    File(File),
    Socket(Socket),
}

pub struct Endpoint {
    kind: TransportKind,
    platform: Platform,
    io: Io,
}

impl Endpoint {
    pub fn from_file(kind: TransportKind, platform: Platform, file: File) -> Self {
        Self {
            kind,
            platform,
            io: Io::File(file),
        }
    }

    pub fn from_socket(kind: TransportKind, platform: Platform, socket: Socket) -> Self {
        Self {
            kind,
            platform,
            io: Io::Socket(socket),
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn socket(&self) -> Option<&Socket> {
        match &self.io {
            Io::Socket(s) => Some(s),
            Io::File(_) => None,
        }
    }

    /// Put the endpoint into non-blocking mode, keeping its other status flags.
    pub fn set_nonblocking(&self) -> Result<()> {
        match &self.io {
            Io::Socket(s) => s.set_nonblocking(true).context("fcntl set flags"),
            Io::File(f) => set_fd_nonblocking(f.as_raw_fd()).context("fcntl set flags"),
        }
    }

    pub fn queue_control(&self, queue: Queue) -> Option<QueueControl> {
        self.platform.queue_control(self.kind, queue)
    }

    /// Bytes sitting in `queue`, if the platform exposes that for this
    /// transport.
    pub fn queue_depth(&self, queue: Queue) -> io::Result<Option<(QueueControl, usize)>> {
        match self.queue_control(queue) {
            Some(control) => Ok(Some((control, queue_ioctl(self.as_raw_fd(), control)?))),
            None => Ok(None),
        }
    }
}

impl Read for Endpoint {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.io {
            Io::File(f) => f.read(buf),
            Io::Socket(s) => s.read(buf),
        }
    }
}

impl Write for Endpoint {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.io {
            Io::File(f) => f.write(buf),
            Io::Socket(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DrainSource for Endpoint {
    fn queued(&mut self) -> io::Result<Option<usize>> {
        Ok(self.queue_depth(Queue::Read)?.map(|(_, n)| n))
    }
}

impl AsFd for Endpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match &self.io {
            Io::File(f) => f.as_fd(),
            Io::Socket(s) => s.as_fd(),
        }
    }
}

impl AsRawFd for Endpoint {
    fn as_raw_fd(&self) -> RawFd {
        self.as_fd().as_raw_fd()
    }
}

fn set_fd_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn queue_ioctl(fd: RawFd, control: QueueControl) -> io::Result<usize> {
    let mut n: libc::c_int = 0;
    let rc = match control {
        QueueControl::Fionread => unsafe {
            libc::ioctl(fd, libc::FIONREAD, &mut n as *mut libc::c_int)
        },
        #[cfg(target_os = "linux")]
        QueueControl::Siocoutq => unsafe {
            // SIOCOUTQ shares its request number with TIOCOUTQ.
            libc::ioctl(fd, libc::TIOCOUTQ, &mut n as *mut libc::c_int)
        },
        #[cfg(not(target_os = "linux"))]
        QueueControl::Siocoutq => return Err(io::Error::from(io::ErrorKind::Unsupported)),
        #[cfg(any(target_os = "freebsd", target_os = "netbsd"))]
        QueueControl::Fionwrite => unsafe {
            libc::ioctl(fd, bsd::FIONWRITE, &mut n as *mut libc::c_int)
        },
        #[cfg(any(target_os = "freebsd", target_os = "netbsd"))]
        QueueControl::Fionspace => unsafe {
            libc::ioctl(fd, bsd::FIONSPACE, &mut n as *mut libc::c_int)
        },
        #[cfg(not(any(target_os = "freebsd", target_os = "netbsd")))]
        QueueControl::Fionwrite | QueueControl::Fionspace => {
            return Err(io::Error::from(io::ErrorKind::Unsupported))
        }
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n.max(0) as usize)
}

// <sys/filio.h>: _IOR('f', n, int).
#[cfg(target_os = "freebsd")]
mod bsd {
    pub const FIONWRITE: libc::c_ulong = 0x4004_6677;
    pub const FIONSPACE: libc::c_ulong = 0x4004_6676;
}

#[cfg(target_os = "netbsd")]
mod bsd {
    pub const FIONWRITE: libc::c_ulong = 0x4004_6679;
    pub const FIONSPACE: libc::c_ulong = 0x4004_6678;
}
