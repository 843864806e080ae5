//! Run reporting: narrative, quiet and JSON.
//!
//! Narrative lines go to stdout as events happen, in the classic column
//! format (`name           :    value`). Saturation notes go to stderr. JSON
//! mode collects everything and prints a single document at the end.

use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use ipcbuf_channel::{CapacityHints, ChannelSpec, Metric};
use ipcbuf_core::{Attempt, DrainReport, ProbeConfig, ProbeObserver, ProbeResult, Strategy, WriteOutcome};

use crate::cli::OutputMode;

#[derive(Debug, Serialize)]
pub struct AttemptReport {
    pub requested: usize,
    pub accepted: usize,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shrunk_to: Option<usize>,
    pub total: u64,
}

impl From<&Attempt> for AttemptReport {
    fn from(a: &Attempt) -> Self {
        Self {
            requested: a.requested,
            accepted: a.outcome.accepted(),
            outcome: a.outcome.label(),
            shrunk_to: a.outcome.shrunk_to(),
            total: a.total,
        }
    }
}

/// The JSON document for one process's share of a run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub transport: String,
    /// "connector" or "acceptor" for stream sockets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub probe: ProbeConfig,
    pub hints: CapacityHints,
    pub metrics: Vec<Metric>,
    pub attempts: Vec<AttemptReport>,
    pub total: u64,
    pub largest_chunk: usize,
    pub iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain: Option<DrainReport>,
}

pub struct Reporter<W: Write> {
    mode: OutputMode,
    out: W,
    run: RunReport,
    // First write failure; surfaced by `finish`.
    error: Option<io::Error>,
}

impl Reporter<io::Stdout> {
    pub fn stdout(mode: OutputMode, spec: &ChannelSpec, probe: &ProbeConfig, hints: CapacityHints) -> Self {
        Self::new(mode, io::stdout(), spec, probe, hints)
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(mode: OutputMode, out: W, spec: &ChannelSpec, probe: &ProbeConfig, hints: CapacityHints) -> Self {
        Self {
            mode,
            out,
            run: RunReport {
                transport: spec.describe(),
                role: None,
                probe: *probe,
                hints,
                metrics: Vec::new(),
                attempts: Vec::new(),
                total: 0,
                largest_chunk: 0,
                iterations: 0,
                drain: None,
            },
            error: None,
        }
    }

    pub fn set_role(&mut self, role: &'static str) {
        self.run.role = Some(role);
    }

    /// "Testing <transport> buffer size in <mode> mode." plus the strategy.
    pub fn header(&mut self) {
        let probe = self.run.probe;
        let c1 = probe.first_chunk;
        let transport = self.run.transport.clone();
        self.line(format_args!(
            "Testing {transport} buffer size in {} mode.",
            probe.strategy.mode_name()
        ));
        match probe.strategy {
            Strategy::GrowthLoop => match probe.second {
                None => self.line(format_args!(
                    "Loop starting with {c1} byte{} and doubling each iteration.",
                    plural(c1)
                )),
                Some(inc) => self.line(format_args!(
                    "Loop starting with {c1} byte{}, increasing by {inc} byte{} each time.",
                    plural(c1),
                    if inc != 1 { "s" } else { "" }
                )),
            },
            Strategy::FixedChunkRun => self.line(format_args!(
                "First chunk: {c1} byte{}, then {} more chunk{} of size {}.",
                plural(c1),
                probe.repeat,
                plural(probe.repeat),
                probe.second_chunk()
            )),
        }
        self.line(format_args!(""));
    }

    pub fn metric(&mut self, metric: Metric) {
        self.line(format_args!("{:<15}: {:>8}", metric.name, metric.value));
        self.run.metrics.push(metric);
    }

    pub fn metrics(&mut self, metrics: impl IntoIterator<Item = Metric>) {
        for m in metrics {
            self.metric(m);
        }
    }

    /// Blank line before the writes, then the plan for a Fixed-Chunk-Run.
    pub fn plan(&mut self) {
        self.line(format_args!(""));
        let probe = self.run.probe;
        let Some(total) = probe.planned_total() else {
            return;
        };
        let c1 = probe.first_chunk;
        if probe.has_explicit_second() {
            self.line(format_args!(
                "Trying to write {c1} + ({} * {}) = {total} byte{}...",
                probe.repeat,
                probe.second_chunk(),
                plural(total)
            ));
        } else if probe.repeat > 0 {
            self.line(format_args!(
                "Trying to write {c1} * {} = {total} byte{}...",
                probe.repeat + 1,
                plural(total)
            ));
        } else {
            self.line(format_args!("Trying to write {c1} byte{}...", plural(total)));
        }
    }

    pub fn probe_finished(&mut self, result: &ProbeResult) {
        self.run.total = result.total();
        self.run.largest_chunk = result.largest_chunk();
        self.run.iterations = result.iterations();
        self.line(format_args!("{:<15}: {:>8}", "Iterations", result.iterations()));
    }

    /// The headline number. In quiet mode it is the only output.
    pub fn observed_total(&mut self) {
        let total = self.run.total;
        match self.mode {
            OutputMode::Quiet => self.emit(format_args!("{total}")),
            _ => {
                self.line(format_args!("Observed total : {total:>8}"));
                self.line(format_args!(""));
            }
        }
    }

    pub fn draining(&mut self) {
        self.line(format_args!("Draining..."));
    }

    /// Per-read queue readings, then the bytes read.
    pub fn drain_finished(&mut self, report: DrainReport, queue_control: Option<&str>) {
        if let Some(name) = queue_control {
            for depth in &report.queue_readings {
                self.line(format_args!("{name:<15}: {depth:>8}"));
            }
        }
        self.line(format_args!("{:<15}: {:>8}", "Read", report.bytes_read));
        self.run.drain = Some(report);
    }

    /// Print the JSON document if in JSON mode, flush, and report any write
    /// failure seen along the way.
    pub fn finish(mut self) -> Result<W> {
        if self.mode == OutputMode::Json {
            let doc = serde_json::to_string_pretty(&self.run).context("failed to encode report")?;
            self.emit(format_args!("{doc}"));
        }
        if let Err(e) = self.out.flush() {
            self.error.get_or_insert(e);
        }
        match self.error {
            Some(e) => Err(e).context("failed to write report"),
            None => Ok(self.out),
        }
    }

    /// A narrative line; dropped in quiet and JSON modes.
    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        if self.mode == OutputMode::Narrative {
            self.emit(args);
        }
    }

    fn emit(&mut self, args: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{args}") {
            self.error.get_or_insert(e);
        }
    }
}

impl<W: Write> ProbeObserver for Reporter<W> {
    fn on_attempt(&mut self, attempt: &Attempt) {
        self.run.attempts.push(AttemptReport::from(attempt));
        // stderr notes are printed whatever the output mode.
        if let Some(note) = refusal_note(attempt) {
            eprintln!("{note}");
        }
        if self.mode != OutputMode::Narrative {
            return;
        }

        if let Some(n) = attempt.outcome.shrunk_to() {
            self.line(format_args!("{:<15}: {:>8}", "MSGSIZE", n));
        }
        if let WriteOutcome::Accepted(_) | WriteOutcome::Oversized { .. } = attempt.outcome {
            let wanted = attempt.requested;
            self.line(format_args!(
                "Wrote {:>8} out of {:>8} byte{}. {}(Total: {:>8})",
                attempt.outcome.accepted(),
                wanted,
                plural(wanted),
                if wanted > 1 { "" } else { " " },
                attempt.total
            ));
        }
    }
}

/// The stderr note for a refused write, if the attempt was refused.
pub fn refusal_note(attempt: &Attempt) -> Option<String> {
    match &attempt.outcome {
        WriteOutcome::Saturated { shrunk_to } => {
            let count = shrunk_to.unwrap_or(attempt.requested);
            Some(format!(
                "Unable to write {count} more byte{}: {}",
                plural(count),
                io::Error::from_raw_os_error(libc::EAGAIN)
            ))
        }
        WriteOutcome::Fatal(e) => Some(format!("Unable to write even a single byte: {e}")),
        WriteOutcome::Accepted(_) | WriteOutcome::Oversized { .. } => None,
    }
}

fn plural<N: PartialOrd + From<u8>>(n: N) -> &'static str {
    if n > N::from(1) {
        "s"
    } else {
        ""
    }
}
