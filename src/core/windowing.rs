//! Phase windows over a batch's samples.
//!
//! A window is the contiguous run of samples whose elapsed time falls inside
//! a phase, bounds included. Neighbouring windows share their boundary
//! sample when one sits exactly on the boundary.

use crate::core::phase::{Phase, Phases};
use crate::ingest::{Sample, Signal};
use std::ops::Range;

/// Samples between `start` and `end` inclusive.
///
/// `samples` must be ordered by elapsed time.
pub fn span(samples: &[Sample], start: f64, end: f64) -> &[Sample] {
    &samples[span_range(samples, start, end)]
}

/// Index range of [`span`] within `samples`.
pub fn span_range(samples: &[Sample], start: f64, end: f64) -> Range<usize> {
    let from = samples.partition_point(|s| s.elapsed_minutes < start);
    let to = samples.partition_point(|s| s.elapsed_minutes <= end);
    from..to.max(from)
}

/// The samples belonging to one phase.
#[derive(Debug, Clone, Copy)]
pub struct PhaseWindow<'a> {
    pub phase: Phase,
    pub samples: &'a [Sample],
}

impl<'a> PhaseWindow<'a> {
    pub fn new(samples: &'a [Sample], phase: Phase) -> Self {
        Self {
            phase,
            samples: span(samples, phase.start, phase.end),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn duration_minutes(&self) -> f64 {
        self.phase.duration()
    }

    /// Present values of `signal`, in time order.
    pub fn values(&self, signal: Signal) -> Vec<f64> {
        self.samples.iter().filter_map(|s| s.signal(signal)).collect()
    }

    /// First present value of `signal`.
    pub fn first(&self, signal: Signal) -> Option<f64> {
        self.samples.iter().find_map(|s| s.signal(signal))
    }

    /// Last present value of `signal`.
    pub fn last(&self, signal: Signal) -> Option<f64> {
        self.samples.iter().rev().find_map(|s| s.signal(signal))
    }
}

/// One window per phase, in phase order.
pub fn phase_windows<'a>(samples: &'a [Sample], phases: &Phases) -> Vec<PhaseWindow<'a>> {
    phases.iter().map(|p| PhaseWindow::new(samples, *p)).collect()
}
