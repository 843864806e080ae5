//! Probe engine. Drives a write schedule against one endpoint.
//!
//! Two strategies:
//!   Growth-Loop      grow the chunk after every full write, stop at the
//!                    first write that is not a full acceptance.
//!   Fixed-Chunk-Run  a predetermined list of writes, every one attempted
//!                    whatever the earlier ones returned.

use std::io::Write;

use serde::Serialize;

use crate::detector::classify;
use crate::error::ProbeError;
use crate::result::{Attempt, ProbeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    GrowthLoop,
    FixedChunkRun,
}

impl Strategy {
    /// Short name used in narrative output.
    pub fn mode_name(&self) -> &'static str {
        match self {
            Strategy::GrowthLoop => "loop",
            Strategy::FixedChunkRun => "chunk",
        }
    }
}

/// Immutable input to a probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeConfig {
    pub strategy: Strategy,
    pub first_chunk: usize,
    /// Increment (Growth-Loop) or second chunk size (Fixed-Chunk-Run).
    /// None = double each step / repeat the first chunk.
    pub second: Option<usize>,
    /// Additional chunks after the first. Fixed-Chunk-Run only.
    pub repeat: usize,
}

impl ProbeConfig {
    pub fn growth_loop(first_chunk: usize, increment: Option<usize>) -> Self {
        Self {
            strategy: Strategy::GrowthLoop,
            first_chunk,
            second: increment,
            repeat: 0,
        }
    }

    pub fn fixed_chunk_run(first_chunk: usize, second: Option<usize>, repeat: usize) -> Self {
        Self {
            strategy: Strategy::FixedChunkRun,
            first_chunk,
            second,
            repeat,
        }
    }

    /// Size of chunks 2..=N+1 of a Fixed-Chunk-Run. A second size of zero
    /// means the same as none: repeat the first chunk.
    pub fn second_chunk(&self) -> usize {
        match self.second {
            Some(n) if n > 0 => n,
            _ => self.first_chunk,
        }
    }

    /// True when an explicit, non-zero second chunk size was given.
    pub fn has_explicit_second(&self) -> bool {
        matches!(self.second, Some(n) if n > 0)
    }

    /// The full write schedule of a Fixed-Chunk-Run. None for Growth-Loop,
    /// whose schedule depends on what the channel accepts.
    pub fn schedule(&self) -> Option<Vec<usize>> {
        match self.strategy {
            Strategy::GrowthLoop => None,
            Strategy::FixedChunkRun => {
                let mut sizes = Vec::with_capacity(self.repeat + 1);
                sizes.push(self.first_chunk);
                sizes.extend(std::iter::repeat(self.second_chunk()).take(self.repeat));
                Some(sizes)
            }
        }
    }

    /// Bytes a Fixed-Chunk-Run tries to write in total.
    pub fn planned_total(&self) -> Option<u64> {
        self.schedule()
            .map(|sizes| sizes.iter().map(|&n| n as u64).sum())
    }

    /// Chunk size following `current` in a Growth-Loop.
    pub fn next_chunk(&self, current: usize) -> usize {
        match self.second {
            None => current.saturating_mul(2),
            Some(inc) => current.saturating_add(inc),
        }
    }
}

/// Receives each attempt as it completes, for live narration.
pub trait ProbeObserver {
    fn on_attempt(&mut self, _attempt: &Attempt) {}
}

impl ProbeObserver for () {}

/// Run `config` against `endpoint`, which must already be non-blocking.
pub fn run<W>(
    endpoint: &mut W,
    config: &ProbeConfig,
    observer: &mut dyn ProbeObserver,
) -> Result<ProbeResult, ProbeError>
where
    W: Write + ?Sized,
{
    let result = match config.strategy {
        Strategy::GrowthLoop => growth_loop(endpoint, config, observer)?,
        Strategy::FixedChunkRun => fixed_chunk_run(endpoint, config, observer)?,
    };
    tracing::info!(
        strategy = config.strategy.mode_name(),
        total = result.total(),
        largest_chunk = result.largest_chunk(),
        iterations = result.iterations(),
        "probe finished"
    );
    Ok(result)
}

fn growth_loop<W>(
    endpoint: &mut W,
    config: &ProbeConfig,
    observer: &mut dyn ProbeObserver,
) -> Result<ProbeResult, ProbeError>
where
    W: Write + ?Sized,
{
    let mut result = ProbeResult::new();
    let mut size = config.first_chunk;

    loop {
        let outcome = classify(endpoint, size, &mut result)?;
        let full = outcome.is_full_write(size);
        observer.on_attempt(result.push_attempt(size, outcome));
        if !full {
            return Ok(result);
        }
        size = config.next_chunk(size);
    }
}

fn fixed_chunk_run<W>(
    endpoint: &mut W,
    config: &ProbeConfig,
    observer: &mut dyn ProbeObserver,
) -> Result<ProbeResult, ProbeError>
where
    W: Write + ?Sized,
{
    let mut result = ProbeResult::new();
    for size in config.schedule().unwrap_or_default() {
        let outcome = classify(endpoint, size, &mut result)?;
        observer.on_attempt(result.push_attempt(size, outcome));
    }
    Ok(result)
}
