//! Command-line surface.

use anyhow::{bail, Result};
use clap::Parser;

use ipcbuf_channel::{CapacityHints, ChannelSpec, SocketDomain, SocketFlavor, TransportKind};
use ipcbuf_core::ProbeConfig;

#[derive(Debug, Parser)]
#[command(
    name = "ipcbuf",
    version,
    about = "Measure how many bytes an IPC channel buffers before a non-blocking write would block",
    after_help = "If [CHUNK|INC] is not given, chunk mode repeats the first chunk size \
                  and loop mode doubles it each iteration."
)]
pub struct Cli {
    /// Write a first chunk, then a fixed number of further chunks
    #[arg(short = 'c', overrides_with = "growth_loop")]
    pub fixed_chunk: bool,

    /// Write in a loop, growing the chunk until a write is not fully accepted (default)
    #[arg(short = 'l', overrides_with = "fixed_chunk")]
    pub growth_loop: bool,

    /// Write this many additional chunks (chunk mode)
    #[arg(short = 'n', value_name = "NUM", default_value_t = 1)]
    pub repeat: usize,

    /// Be quiet and only print the final number
    #[arg(short = 'q')]
    pub quiet: bool,

    /// Print one JSON object describing the run
    #[arg(long, conflicts_with = "quiet")]
    pub json: bool,

    /// Try to set the pipe's size to this many bytes (Linux only)
    #[arg(short = 'P', value_name = "SIZE", value_parser = clap::value_parser!(u64).range(1..))]
    pub pipe_size: Option<u64>,

    /// Try to set SO_RCVBUF to this many bytes (socket/socketpair only)
    #[arg(short = 'R', value_name = "SIZE", value_parser = clap::value_parser!(u64).range(1..))]
    pub recv_buffer: Option<u64>,

    /// Try to set SO_SNDBUF to this many bytes (socket/socketpair only)
    #[arg(short = 'S', value_name = "SIZE", value_parser = clap::value_parser!(u64).range(1..))]
    pub send_buffer: Option<u64>,

    /// Socket type: [inet-|inet6-](dgram|stream)
    #[arg(short = 's', value_name = "TYPE")]
    pub socket_type: Option<SocketFlavor>,

    /// IPC type: fifo, pipe, socket, socketpair
    #[arg(short = 't', value_name = "TYPE", default_value = "pipe")]
    pub transport: TransportKind,

    /// Initial chunk size
    #[arg(value_name = "CHUNK", default_value_t = 1)]
    pub chunk: usize,

    /// Second chunk size (chunk mode) or loop increment (loop mode)
    #[arg(value_name = "CHUNK|INC")]
    pub second: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Narrative,
    Quiet,
    Json,
}

/// Validated options for one run.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub channel: ChannelSpec,
    pub probe: ProbeConfig,
    pub hints: CapacityHints,
    pub output: OutputMode,
}

impl Cli {
    /// Reject combinations that parse but make no sense together.
    pub fn into_options(self) -> Result<Options> {
        if self.pipe_size.is_some() && self.transport != TransportKind::Pipe {
            bail!("Setting the pipe size only makes sense with '-t pipe'.");
        }
        if let Some(flavor) = self.socket_type {
            if !self.transport.is_socket() {
                bail!("Setting the socket type only makes sense with '-t socket' or '-t socketpair'.");
            }
            if flavor.domain != SocketDomain::Local && self.transport != TransportKind::Socket {
                bail!("'inet/inet6' type sockets can only be specified with '-t socket'.");
            }
        }
        if (self.recv_buffer.is_some() || self.send_buffer.is_some()) && !self.transport.is_socket() {
            bail!("Setting socket buffer sizes only makes sense with '-t socket' or '-t socketpair'.");
        }

        let probe = if self.fixed_chunk {
            ProbeConfig::fixed_chunk_run(self.chunk, self.second, self.repeat)
        } else {
            // From zero, doubling or a zero increment never grows.
            if self.chunk == 0 && matches!(self.second, None | Some(0)) {
                bail!("A loop starting at 0 bytes needs a positive increment.");
            }
            ProbeConfig::growth_loop(self.chunk, self.second)
        };

        let output = if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Narrative
        };

        Ok(Options {
            channel: ChannelSpec::new(self.transport, self.socket_type.unwrap_or_default()),
            probe,
            hints: CapacityHints {
                pipe_capacity: self.pipe_size.map(to_size),
                send_buffer: self.send_buffer.map(to_size),
                recv_buffer: self.recv_buffer.map(to_size),
            },
            output,
        })
    }
}

fn to_size(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}
