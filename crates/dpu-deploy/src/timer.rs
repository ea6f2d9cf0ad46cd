//! Per-phase wall-clock bookkeeping.
//!
//! [`PhaseLedger::start`] hands out a [`RunningPhase`] token and
//! [`PhaseLedger::stop`] consumes it, so a phase cannot be stopped
//! without having been started.

use std::collections::BTreeMap;
use std::time::Duration;

use dpu_core::Step;
use tokio::time::Instant;
use tracing::info;

/// A phase whose timer is running.
#[must_use = "a started phase must be stopped"]
#[derive(Debug)]
pub struct RunningPhase {
    step: Step,
    started: Instant,
}

#[derive(Debug, Default)]
pub struct PhaseLedger {
    elapsed: BTreeMap<Step, Duration>,
}

impl PhaseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, step: Step) -> RunningPhase {
        debug_assert!(!self.elapsed.contains_key(&step), "phase {step} timed twice");
        RunningPhase {
            step,
            started: Instant::now(),
        }
    }

    pub fn stop(&mut self, phase: RunningPhase) -> Duration {
        let elapsed = phase.started.elapsed();
        self.elapsed.insert(phase.step, elapsed);
        elapsed
    }

    pub fn duration(&self, step: Step) -> Option<Duration> {
        self.elapsed.get(&step).copied()
    }

    /// Close the ledger and log every recorded phase in phase order.
    pub fn finish(self) -> PhaseReport {
        let report = PhaseReport {
            entries: self.elapsed.into_iter().collect(),
        };
        for (step, elapsed) in report.iter() {
            info!("{step}: {}", format_elapsed(elapsed));
        }
        report
    }
}

/// Durations of the phases that ran, in phase order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    entries: Vec<(Step, Duration)>,
}

impl PhaseReport {
    pub fn iter(&self) -> impl Iterator<Item = (Step, Duration)> + '_ {
        self.entries.iter().copied()
    }

    pub fn steps(&self) -> Vec<Step> {
        self.entries.iter().map(|(step, _)| *step).collect()
    }

    pub fn duration(&self, step: Step) -> Option<Duration> {
        self.entries.iter().find(|(s, _)| *s == step).map(|(_, d)| *d)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render a duration for operators: `1h 02m 03s`, `4m 05s`, `12.3s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}
