//! ipcbuf-core: the buffer-probing engine.
//!
//! Everything here works against `std::io` traits so it can be driven by a
//! real kernel channel or by a scripted endpoint in tests. Provisioning the
//! channels themselves lives in `ipcbuf-channel`.

pub mod config;
pub mod detector;
pub mod drain;
pub mod error;
pub mod probe;
pub mod result;

pub use config::{ConfigError, IpcbufConfig};
pub use detector::{classify, Refusal};
pub use drain::{drain, DrainReport, DrainSource};
pub use error::ProbeError;
pub use probe::{run, ProbeConfig, ProbeObserver, Strategy};
pub use result::{Attempt, ProbeResult, WriteOutcome};

#[cfg(test)]
mod testing;
