//! Scripted in-memory channel used by the engine's unit tests.

use std::io::{self, Read, Write};

use crate::drain::DrainSource;

/// Behaves like a kernel channel with a fixed capacity.
///
/// Stream mode accepts partial writes; datagram mode accepts a write whole or
/// refuses it as full. An optional message ceiling answers EMSGSIZE.
pub struct ScriptedChannel {
    capacity: usize,
    data: Vec<u8>,
    atomic: bool,
    max_message: Option<usize>,
    fail_with: Option<i32>,
    writes: Vec<usize>,
    expose_queue: bool,
    closed: bool,
}

impl ScriptedChannel {
    pub fn stream(capacity: usize) -> Self {
        Self {
            capacity,
            data: Vec::new(),
            atomic: false,
            max_message: None,
            fail_with: None,
            writes: Vec::new(),
            expose_queue: false,
            closed: false,
        }
    }

    pub fn datagram(capacity: usize) -> Self {
        Self {
            atomic: true,
            ..Self::stream(capacity)
        }
    }

    pub fn with_max_message(mut self, max: usize) -> Self {
        self.max_message = Some(max);
        self
    }

    pub fn failing_with(mut self, code: i32) -> Self {
        self.fail_with = Some(code);
        self
    }

    pub fn exposing_queue(mut self) -> Self {
        self.expose_queue = true;
        self
    }

    /// Reads past the end return 0 instead of EAGAIN.
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn preloaded(mut self, bytes: usize) -> Self {
        self.data = vec![b'x'; bytes];
        self
    }

    pub fn writes(&self) -> &[usize] {
        &self.writes
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn buffered(&self) -> usize {
        self.data.len()
    }
}

impl Write for ScriptedChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes.push(buf.len());
        if let Some(code) = self.fail_with {
            return Err(io::Error::from_raw_os_error(code));
        }
        if let Some(max) = self.max_message {
            if buf.len() > max {
                return Err(io::Error::from_raw_os_error(libc::EMSGSIZE));
            }
        }
        let room = self.capacity - self.data.len();
        if room == 0 || (self.atomic && buf.len() > room) {
            return Err(io::Error::from_raw_os_error(libc::EAGAIN));
        }
        let n = buf.len().min(room);
        self.data.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for ScriptedChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.is_empty() {
            if self.closed {
                return Ok(0);
            }
            return Err(io::Error::from_raw_os_error(libc::EAGAIN));
        }
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data.drain(..n);
        Ok(n)
    }
}

impl DrainSource for ScriptedChannel {
    fn queued(&mut self) -> io::Result<Option<usize>> {
        Ok(self.expose_queue.then_some(self.data.len()))
    }
}
