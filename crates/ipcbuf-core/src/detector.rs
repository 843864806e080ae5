//! Saturation detector.
//!
//! Classifies one attempted write against a non-blocking endpoint. The only
//! retry anywhere in the engine lives here: when the kernel says a request is
//! structurally too large (EMSGSIZE, ENOBUFS) the size is shrunk one byte at
//! a time and the same write is reissued. "Currently full" is never retried.

use std::io::{self, Write};

use crate::error::ProbeError;
use crate::result::{ProbeResult, WriteOutcome};

/// Content of every probe write.
pub const FILL_BYTE: u8 = b'x';

/// Why the kernel refused a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// No room right now (EAGAIN / EWOULDBLOCK).
    Full,
    /// The request exceeds a transport ceiling (EMSGSIZE / ENOBUFS).
    TooLarge,
    Unexpected,
}

impl Refusal {
    pub fn of(err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EMSGSIZE) | Some(libc::ENOBUFS) => Refusal::TooLarge,
            Some(code) if code == libc::EAGAIN || code == libc::EWOULDBLOCK => Refusal::Full,
            _ if err.kind() == io::ErrorKind::WouldBlock => Refusal::Full,
            _ => Refusal::Unexpected,
        }
    }
}

/// Attempt to write `requested` bytes and classify what happened.
///
/// Accepted bytes are added to `acc`. An unexpected failure is returned as
/// `Err` and must end the run.
pub fn classify<W>(
    endpoint: &mut W,
    requested: usize,
    acc: &mut ProbeResult,
) -> Result<WriteOutcome, ProbeError>
where
    W: Write + ?Sized,
{
    let buf = vec![FILL_BYTE; requested];
    let mut size = requested;
    let mut shrunk = false;

    loop {
        match endpoint.write(&buf[..size]) {
            Ok(n) => {
                acc.record_accepted(n);
                if shrunk {
                    tracing::debug!(requested, shrunk_to = n, "accepted after shrinking");
                    return Ok(WriteOutcome::Oversized { shrunk_to: n });
                }
                tracing::debug!(requested, written = n, "write accepted");
                return Ok(WriteOutcome::Accepted(n));
            }
            Err(err) => match Refusal::of(&err) {
                Refusal::TooLarge => {
                    size = size.saturating_sub(1);
                    if size == 0 {
                        tracing::debug!(requested, error = %err, "cannot write a single byte");
                        return Ok(WriteOutcome::Fatal(err));
                    }
                    shrunk = true;
                    tracing::trace!(size, "over structural limit, shrinking");
                }
                Refusal::Full => {
                    let shrunk_to = shrunk.then_some(size);
                    tracing::debug!(requested, ?shrunk_to, "channel saturated");
                    return Ok(WriteOutcome::Saturated { shrunk_to });
                }
                Refusal::Unexpected => {
                    return Err(ProbeError::Write {
                        requested: size,
                        error: err,
                    });
                }
            },
        }
    }
}
