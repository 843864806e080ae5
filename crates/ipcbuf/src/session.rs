//! One run, start to finish: provision, probe, drain, report.

use std::io::Write;

use anyhow::{Context, Result};

use ipcbuf_channel::{
    metrics, Channel, Endpoint, Platform, Provisioned, Provisioner, Queue, Role, StreamRendezvous,
    TransportKind,
};
use ipcbuf_core::{IpcbufConfig, ProbeConfig, ProbeResult};

use crate::cli::Options;
use crate::report::Reporter;

pub fn run(opts: &Options, config: &IpcbufConfig) -> Result<()> {
    let platform = Platform::current();
    tracing::debug!(platform = platform.name(), "starting run");

    let mut report = Reporter::stdout(opts.output, &opts.channel, &opts.probe, opts.hints);
    match Provisioner::new(config, opts.hints, platform).provision(opts.channel)? {
        Provisioned::Ready(chan) => probe_channel(chan, platform, opts, config, &mut report)?,
        Provisioned::Stream(rendezvous) => {
            return probe_stream(rendezvous, platform, opts, config, report);
        }
    }
    report.finish()?;
    Ok(())
}

/// Both ends live in this process: probe the write side, then drain the read side.
fn probe_channel<W: Write>(
    mut chan: Channel,
    platform: Platform,
    opts: &Options,
    config: &IpcbufConfig,
    report: &mut Reporter<W>,
) -> Result<()> {
    report.header();

    let spec = chan.spec();
    let writer = chan.writer().context("write side already closed")?;
    let reader = chan.reader();
    match spec.kind {
        TransportKind::Pipe => report.metrics(metrics::pipe_metrics(platform, writer)?),
        TransportKind::Fifo => {}
        TransportKind::SocketPair => {
            report.metrics(metrics::tunable(platform, &spec));
            report.metrics(metrics::recv_buffer(reader)?);
            report.metrics(metrics::send_buffer(writer)?);
        }
        TransportKind::Socket => {
            report.metrics(metrics::tunable(platform, &spec));
            report.metrics(metrics::send_buffer(writer)?);
            report.metrics(metrics::recv_buffer(reader)?);
        }
    }

    let result = write_phase(chan.writer_mut()?, &opts.probe, report)?;
    chan.finish_writing();
    drain_phase(chan.reader_mut(), &result, config, report)
}

/// Fork into connector and acceptor. Each process reports its own half.
fn probe_stream(
    rendezvous: StreamRendezvous,
    platform: Platform,
    opts: &Options,
    config: &IpcbufConfig,
    mut report: Reporter<std::io::Stdout>,
) -> Result<()> {
    report.header();
    report.metrics(metrics::tunable(platform, &rendezvous.spec()));

    match rendezvous.split()? {
        Role::Connector(mut writer) => {
            report.set_role("connector");
            report.metrics(metrics::send_buffer(&writer)?);
            write_phase(&mut writer, &opts.probe, &mut report)?;
        }
        Role::Acceptor(acceptor) => {
            report.set_role("acceptor");
            let mut reader = acceptor.accept_and_wait()?;
            report.metrics(metrics::recv_buffer(&reader)?);
            // The acceptor never saw the writes, so the drain buffer starts at its minimum.
            drain_phase(&mut reader, &ProbeResult::new(), config, &mut report)?;
        }
    }
    report.finish()?;
    Ok(())
}

fn write_phase<W: Write>(
    writer: &mut Endpoint,
    probe: &ProbeConfig,
    report: &mut Reporter<W>,
) -> Result<ProbeResult> {
    report.metrics(metrics::queue_depth(writer, Queue::Space)?);
    report.plan();
    let result = ipcbuf_core::run(writer, probe, report).context("probe failed")?;
    report.probe_finished(&result);
    report.metrics(metrics::queue_depth(writer, Queue::Write)?);
    report.observed_total();
    Ok(result)
}

fn drain_phase<W: Write>(
    reader: &mut Endpoint,
    result: &ProbeResult,
    config: &IpcbufConfig,
    report: &mut Reporter<W>,
) -> Result<()> {
    report.draining();
    let control = reader.queue_control(Queue::Read);
    let drained = ipcbuf_core::drain(reader, result.largest_chunk(), config.drain.min_buffer)
        .context("drain failed")?;
    tracing::info!(bytes_read = drained.bytes_read, accepted = result.total(), "drained");
    report.drain_finished(drained, control.map(|c| c.name()));
    Ok(())
}
