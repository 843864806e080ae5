//! Outcome and accumulator types shared by the detector and the engine.

use std::io;

/// Result of one attempted write.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The kernel took `n` bytes of the requested size (possibly fewer than asked).
    Accepted(usize),
    /// The request exceeded a structural ceiling; after shrinking, `shrunk_to`
    /// bytes were accepted.
    Oversized { shrunk_to: usize },
    /// The channel is full. `shrunk_to` is the last reduced size tried if the
    /// request had already been shrunk in this attempt.
    Saturated { shrunk_to: Option<usize> },
    /// Shrinking reached zero: the channel refuses even a single byte.
    Fatal(io::Error),
}

impl WriteOutcome {
    /// Bytes that actually entered the channel.
    pub fn accepted(&self) -> usize {
        match self {
            WriteOutcome::Accepted(n) => *n,
            WriteOutcome::Oversized { shrunk_to } => *shrunk_to,
            WriteOutcome::Saturated { .. } | WriteOutcome::Fatal(_) => 0,
        }
    }

    /// True only for an unshrunk write that took every requested byte.
    pub fn is_full_write(&self, requested: usize) -> bool {
        matches!(self, WriteOutcome::Accepted(n) if *n == requested)
    }

    /// The reduced size, when shrink-and-retry kicked in.
    pub fn shrunk_to(&self) -> Option<usize> {
        match self {
            WriteOutcome::Oversized { shrunk_to } => Some(*shrunk_to),
            WriteOutcome::Saturated { shrunk_to } => *shrunk_to,
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WriteOutcome::Accepted(_) => "accepted",
            WriteOutcome::Oversized { .. } => "oversized",
            WriteOutcome::Saturated { .. } => "saturated",
            WriteOutcome::Fatal(_) => "fatal",
        }
    }
}

/// One entry of the attempt log.
#[derive(Debug)]
pub struct Attempt {
    /// Chunk size the engine asked for.
    pub requested: usize,
    pub outcome: WriteOutcome,
    /// Running total after this attempt.
    pub total: u64,
}

/// Accumulated output of a probe run.
///
/// Built up by the detector and engine, then handed read-only to reporting
/// and to the drain (which sizes its buffer from `largest_chunk`).
#[derive(Debug, Default)]
pub struct ProbeResult {
    total: u64,
    largest_chunk: usize,
    attempts: Vec<Attempt>,
}

impl ProbeResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of every accepted byte count in the run.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Largest single accepted write.
    pub fn largest_chunk(&self) -> usize {
        self.largest_chunk
    }

    /// Number of write attempts, including the terminal one.
    pub fn iterations(&self) -> usize {
        self.attempts.len()
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Requested sizes in attempt order.
    pub fn requested_sizes(&self) -> Vec<usize> {
        self.attempts.iter().map(|a| a.requested).collect()
    }

    pub(crate) fn record_accepted(&mut self, n: usize) {
        self.total += n as u64;
        if n > self.largest_chunk {
            self.largest_chunk = n;
        }
    }

    pub(crate) fn push_attempt(&mut self, requested: usize, outcome: WriteOutcome) -> &Attempt {
        self.attempts.push(Attempt {
            requested,
            outcome,
            total: self.total,
        });
        &self.attempts[self.attempts.len() - 1]
    }
}
