//! ipcbuf integration test harness.
//!
//! Tests here probe real kernel channels: pipes, FIFOs, socket pairs and
//! bound sockets. FIFO and local socket paths live in the temp directory,
//! unique per test, and are removed when the channel is dropped.
//!
//!   cargo test --test integration

use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{bail, Result};

use ipcbuf_channel::{
    CapacityHints, Channel, ChannelSpec, Platform, Provisioned, Provisioner, Role, SocketFlavor,
    StreamRendezvous, TransportKind,
};
use ipcbuf_core::{DrainReport, IpcbufConfig, ProbeConfig, ProbeResult};

// ── Harness ───────────────────────────────────────────────────────────────────

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

/// A config whose FIFO and socket paths no other test uses.
pub fn temp_config(tag: &str) -> IpcbufConfig {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir().join(format!("ipcbuf-it-{}-{tag}-{id}", std::process::id()));
    let mut config = IpcbufConfig::default();
    config.paths.fifo = base.with_extension("fifo");
    config.paths.socket = base.with_extension("sock");
    config
}

pub fn spec(kind: TransportKind, flavor: &str) -> ChannelSpec {
    let flavor: SocketFlavor = flavor.parse().expect("valid socket flavor");
    ChannelSpec::new(kind, flavor)
}

/// Provision a channel whose ends both live in this process.
pub fn ready(config: &IpcbufConfig, spec: ChannelSpec, hints: CapacityHints) -> Result<Channel> {
    match Provisioner::new(config, hints, Platform::current()).provision(spec)? {
        Provisioned::Ready(chan) => Ok(chan),
        Provisioned::Stream(_) => bail!("{} needs a peer", spec.describe()),
    }
}

pub fn rendezvous(config: &IpcbufConfig, spec: ChannelSpec) -> Result<StreamRendezvous> {
    match Provisioner::new(config, CapacityHints::default(), Platform::current()).provision(spec)? {
        Provisioned::Stream(rv) => Ok(rv),
        Provisioned::Ready(_) => bail!("{} is not a stream socket", spec.describe()),
    }
}

/// Probe the write side, close it where the transport needs that, drain.
pub fn probe_and_drain(chan: &mut Channel, probe: &ProbeConfig) -> Result<(ProbeResult, DrainReport)> {
    let result = ipcbuf_core::run(chan.writer_mut()?, probe, &mut ())?;
    chan.finish_writing();
    let drained = ipcbuf_core::drain(chan.reader_mut(), result.largest_chunk(), 8192)?;
    Ok((result, drained))
}

mod channels;
mod stream;
