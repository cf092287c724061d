//! Accumulating named timers.
//!
//! Each worker carries a [`TimerRegistry`] and brackets the expensive
//! stages of a realization with start/stop pairs; the driver reports the
//! accumulated totals when a tuple finishes. Timers are purely
//! observational and never feed back into the simulation.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// The stages the engine accounts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Spread,
    Deltatron,
    Stats,
    GrowTotal,
    DriverTotal,
}

const TIMER_COUNT: usize = 5;

impl TimerKind {
    fn index(self) -> usize {
        match self {
            TimerKind::Spread => 0,
            TimerKind::Deltatron => 1,
            TimerKind::Stats => 2,
            TimerKind::GrowTotal => 3,
            TimerKind::DriverTotal => 4,
        }
    }

    fn name(self) -> &'static str {
        match self {
            TimerKind::Spread => "spread",
            TimerKind::Deltatron => "deltatron",
            TimerKind::Stats => "stats",
            TimerKind::GrowTotal => "grow_total",
            TimerKind::DriverTotal => "driver_total",
        }
    }

    fn all() -> [TimerKind; TIMER_COUNT] {
        [
            TimerKind::Spread,
            TimerKind::Deltatron,
            TimerKind::Stats,
            TimerKind::GrowTotal,
            TimerKind::DriverTotal,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    accumulated: Duration,
    started: Option<Instant>,
    laps: u64,
}

/// Per-worker registry of accumulating timers.
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry {
    slots: [Slot; TIMER_COUNT],
}

impl TimerRegistry {
    pub fn new() -> TimerRegistry {
        TimerRegistry::default()
    }

    /// Start a timer; starting a running timer restarts its lap.
    pub fn start(&mut self, kind: TimerKind) {
        self.slots[kind.index()].started = Some(Instant::now());
    }

    /// Stop a timer and fold the lap into its total. Stopping a timer
    /// that is not running is a no-op.
    pub fn stop(&mut self, kind: TimerKind) {
        let slot = &mut self.slots[kind.index()];
        if let Some(started) = slot.started.take() {
            slot.accumulated += started.elapsed();
            slot.laps += 1;
        }
    }

    pub fn elapsed(&self, kind: TimerKind) -> Duration {
        self.slots[kind.index()].accumulated
    }

    pub fn laps(&self, kind: TimerKind) -> u64 {
        self.slots[kind.index()].laps
    }

    /// One-line summary for the tuple-completion log.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for kind in TimerKind::all() {
            let slot = &self.slots[kind.index()];
            if slot.laps == 0 {
                continue;
            }
            if !out.is_empty() {
                out.push_str(", ");
            }
            let _ = write!(
                out,
                "{} {:.3}s/{}",
                kind.name(),
                slot.accumulated.as_secs_f64(),
                slot.laps
            );
        }
        if out.is_empty() {
            out.push_str("no timers ran");
        }
        out
    }
}
