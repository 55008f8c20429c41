//! Deterministic replay of a JSON-lines input trace through an area.
//!
//! Each trace line is an [`InputEvent`] plus a `t_ms` timestamp relative to the
//! start of the trace. Before an input is applied, every engine deadline at or
//! before its timestamp is run, in order, so the output does not depend on how
//! fast the trace is read. After the last line the remaining deadlines are
//! drained.

#[cfg(test)]
#[path = "replay_test.rs"]
mod replay_test;

use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use movable::area::AreaController;
use movable::config::ConfigError;
use movable::event::{AreaEvent, InputEvent, ItemId};
use movable::geometry::ItemTransform;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("invalid config in {path}: {source}")]
    Config { path: String, source: ConfigError },
    #[error("trace line {line}: {source}")]
    Trace { line: usize, source: serde_json::Error },
    #[error("trace line {line}: timestamp {t_ms}ms is before the previous {last_ms}ms")]
    Backwards { line: usize, t_ms: u64, last_ms: u64 },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct TraceEntry {
    t_ms: u64,
    #[serde(flatten)]
    input: InputEvent,
}

#[derive(Debug, Serialize)]
struct EmittedLine<'a> {
    t_ms: u64,
    #[serde(flatten)]
    event: &'a AreaEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinalState {
    pub item: ItemId,
    pub state: ItemTransform,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub inputs: usize,
    pub events: usize,
    pub end_ms: u64,
    pub items: Vec<FinalState>,
}

/// Replays a trace against one mounted area.
pub struct Replay<'a, W: Write> {
    area: &'a mut AreaController,
    out: W,
    start: Instant,
    quiet: bool,
    inputs: usize,
    events: usize,
    last_ms: u64,
}

impl<'a, W: Write> Replay<'a, W> {
    /// `quiet` suppresses per-event output; the summary is still returned.
    pub fn new(area: &'a mut AreaController, out: W, quiet: bool) -> Self {
        area.mount();
        Self { area, out, start: Instant::now(), quiet, inputs: 0, events: 0, last_ms: 0 }
    }

    pub fn run(mut self, reader: impl BufRead) -> Result<Summary, CliError> {
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| CliError::Read { path: "trace input".to_owned(), source })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let entry: TraceEntry =
                serde_json::from_str(trimmed).map_err(|source| CliError::Trace { line: index + 1, source })?;
            if entry.t_ms < self.last_ms {
                return Err(CliError::Backwards { line: index + 1, t_ms: entry.t_ms, last_ms: self.last_ms });
            }
            self.advance_to(entry.t_ms)?;
            let now = self.at(entry.t_ms);
            let produced = self.area.handle(entry.input, now);
            self.inputs += 1;
            self.write(entry.t_ms, &produced)?;
        }
        self.drain()?;
        self.out.flush()?;

        let items = self.area.items().map(|it| FinalState { item: it.id(), state: it.state() }).collect();
        let summary = Summary { inputs: self.inputs, events: self.events, end_ms: self.last_ms, items };
        info!(inputs = summary.inputs, events = summary.events, end_ms = summary.end_ms, "replay finished");
        Ok(summary)
    }

    /// Run every deadline due at or before `t_ms`.
    fn advance_to(&mut self, t_ms: u64) -> Result<(), CliError> {
        while let Some(due_ms) = self.next_due_ms() {
            if due_ms > t_ms {
                break;
            }
            self.tick_at(due_ms)?;
        }
        self.last_ms = t_ms;
        Ok(())
    }

    /// Run deadlines until nothing is pending.
    fn drain(&mut self) -> Result<(), CliError> {
        while let Some(due_ms) = self.next_due_ms() {
            self.tick_at(due_ms.max(self.last_ms))?;
            self.last_ms = self.last_ms.max(due_ms);
        }
        Ok(())
    }

    fn tick_at(&mut self, t_ms: u64) -> Result<(), CliError> {
        debug!(t_ms, "tick");
        let now = self.at(t_ms);
        let produced = self.area.tick(now);
        self.write(t_ms, &produced)
    }

    fn next_due_ms(&self) -> Option<u64> {
        let due = self.area.next_deadline()?;
        let elapsed = due.saturating_duration_since(self.start);
        // Round up so the tick lands at or after the deadline.
        let ms = elapsed.as_nanos().div_ceil(1_000_000);
        Some(u64::try_from(ms).unwrap_or(u64::MAX))
    }

    fn at(&self, t_ms: u64) -> Instant {
        self.start + Duration::from_millis(t_ms)
    }

    fn write(&mut self, t_ms: u64, produced: &[AreaEvent]) -> Result<(), CliError> {
        self.events += produced.len();
        if self.quiet {
            return Ok(());
        }
        for event in produced {
            let line = serde_json::to_string(&EmittedLine { t_ms, event })?;
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }
}
