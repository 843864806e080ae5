//! Fail-fast errors raised by the probing engine.
//!
//! Saturation and structural oversize are outcomes, not errors. Anything in
//! this enum means the environment did something the probe cannot reason
//! about, and the caller is expected to propagate it to the top level.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("write({requested}): {error}")]
    Write { requested: usize, error: io::Error },
    #[error("read: {0}")]
    Read(io::Error),
    #[error("queue depth query: {0}")]
    QueueDepth(io::Error),
}

impl ProbeError {
    /// The underlying OS error code, if there is one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            ProbeError::Write { error, .. } => error.raw_os_error(),
            ProbeError::Read(e) | ProbeError::QueueDepth(e) => e.raw_os_error(),
        }
    }
}
