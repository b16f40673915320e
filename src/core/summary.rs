//! Per-phase signal summaries.
//!
//! Each phase window is reduced to a handful of numbers: temperature
//! statistics, the water pumped and the grist drawn from the case.

use crate::core::phase::{EndRule, PhaseKind, Phases};
use crate::core::windowing::{phase_windows, PhaseWindow};
use crate::ingest::{Sample, Signal};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Descriptive statistics of one signal within a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

impl SignalStats {
    /// `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        Some(Self {
            count: values.len(),
            mean: Statistics::mean(values),
            min: Statistics::min(values),
            max: Statistics::max(values),
            std_dev: Statistics::population_std_dev(values),
        })
    }
}

/// Summary of a single phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub id: u8,
    pub kind: PhaseKind,
    pub start: f64,
    pub end: f64,
    pub duration_minutes: f64,
    pub sample_count: usize,
    pub end_rule: EndRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mash_temp: Option<SignalStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_temp: Option<SignalStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wort_temp: Option<SignalStats>,
    /// Water pumped during the phase in litres
    pub water_volume_l: f64,
    /// Grist drawn from the case during the phase in kg
    pub grist_drawn_kg: f64,
}

/// Summarize every phase of a segmented batch.
pub fn summarize(samples: &[Sample], phases: &Phases) -> Vec<PhaseSummary> {
    phase_windows(samples, phases)
        .iter()
        .map(summarize_window)
        .collect()
}

fn summarize_window(window: &PhaseWindow<'_>) -> PhaseSummary {
    let phase = window.phase;
    PhaseSummary {
        id: phase.id,
        kind: phase.kind,
        start: phase.start,
        end: phase.end,
        duration_minutes: window.duration_minutes(),
        sample_count: window.sample_count(),
        end_rule: phase.end_rule,
        mash_temp: SignalStats::from_values(&window.values(Signal::MashTemp)),
        water_temp: SignalStats::from_values(&window.values(Signal::WaterTemp)),
        wort_temp: SignalStats::from_values(&window.values(Signal::WortTemp)),
        water_volume_l: water_volume(window.samples),
        grist_drawn_kg: grist_drawn(window),
    }
}

/// Water pumped over the window: each reading counts as one minute of flow.
fn water_volume(samples: &[Sample]) -> f64 {
    samples.iter().filter_map(|s| s.water_flow).sum::<f64>() / 60.0
}

fn grist_drawn(window: &PhaseWindow<'_>) -> f64 {
    match (
        window.first(Signal::VesselWeight),
        window.last(Signal::VesselWeight),
    ) {
        (Some(first), Some(last)) => (first - last).max(0.0),
        _ => 0.0,
    }
}
