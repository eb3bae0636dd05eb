//! Overall progress accounting.
//!
//! Each phase owns a sub-range of 0–100. Local completion is computed as
//! `round(done / total * 100)` and mapped linearly into that sub-range. The
//! tracker never reports a value lower than one it already reported.

use crate::pipeline::phase::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseRange {
    pub start: u8,
    pub end: u8,
}

impl PhaseRange {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Maps a local percentage (0–100) into this range.
    pub fn map(self, local_percent: u8) -> u8 {
        let span = f32::from(self.end.saturating_sub(self.start));
        let offset = (f32::from(local_percent.min(100)) * span / 100.0).round();
        self.start.saturating_add(offset as u8).min(self.end)
    }
}

/// Role searches occupy the first part of the searching range, job emission the rest.
pub const SEARCH_ROLES: PhaseRange = PhaseRange::new(15, 25);
pub const SEARCH_EMIT: PhaseRange = PhaseRange::new(25, 35);

pub fn phase_range(phase: Phase) -> PhaseRange {
    match phase {
        Phase::Idle => PhaseRange::new(0, 0),
        Phase::Parsing => PhaseRange::new(0, 15),
        Phase::Searching => PhaseRange::new(15, 35),
        Phase::Analyzing => PhaseRange::new(35, 75),
        Phase::Generating => PhaseRange::new(75, 90),
        Phase::Completed => PhaseRange::new(100, 100),
        Phase::Cancelled | Phase::Error => PhaseRange::new(0, 0),
    }
}

/// `round(done / total * 100)`; an empty workload counts as finished.
pub fn local_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (done.min(total) as f64 / total as f64 * 100.0).round();
    pct as u8
}

#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    last: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u8 {
        self.last
    }

    /// Records `done` of `total` within `range` and returns the monotonic value.
    pub fn report(&mut self, range: PhaseRange, done: usize, total: usize) -> u8 {
        self.set(range.map(local_percent(done, total)))
    }

    /// Records progress at the start of `phase`'s range.
    pub fn enter(&mut self, phase: Phase) -> u8 {
        self.set(phase_range(phase).start)
    }

    pub fn set(&mut self, value: u8) -> u8 {
        self.last = self.last.max(value.min(100));
        self.last
    }
}
