//! Drain collector. Empties the read side after a probe.

use std::io::{self, Read};

use serde::Serialize;

use crate::error::ProbeError;

/// Buffer size used when nothing larger was ever accepted (stdio's BUFSIZ).
pub const DEFAULT_MIN_BUFFER: usize = 8192;

/// A read endpoint that can optionally report how many bytes are queued.
pub trait DrainSource: Read {
    /// Bytes waiting to be read, or None if the platform does not expose
    /// this for the endpoint's transport.
    fn queued(&mut self) -> io::Result<Option<usize>> {
        Ok(None)
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct DrainReport {
    pub bytes_read: u64,
    pub reads: usize,
    /// Queue depth seen before each read, when available.
    pub queue_readings: Vec<usize>,
}

/// Read everything currently queued on `source` without blocking.
///
/// Stops on a queue reading of zero, on a read that would block, or on end
/// of channel. Any other read failure is returned as an error.
pub fn drain<R>(
    source: &mut R,
    largest_chunk: usize,
    min_buffer: usize,
) -> Result<DrainReport, ProbeError>
where
    R: DrainSource + ?Sized,
{
    let mut buf = vec![0u8; largest_chunk.max(min_buffer).max(1)];
    let mut report = DrainReport::default();

    loop {
        if let Some(left) = source.queued().map_err(ProbeError::QueueDepth)? {
            report.queue_readings.push(left);
            if left == 0 {
                break;
            }
        }

        match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                report.bytes_read += n as u64;
                report.reads += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(ProbeError::Read(e)),
        }
    }

    tracing::debug!(
        bytes_read = report.bytes_read,
        reads = report.reads,
        buffer = buf.len(),
        "drain complete"
    );
    Ok(report)
}
