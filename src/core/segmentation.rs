//! Phase segmentation engine.
//!
//! A batch is cut into seven contiguous phases by walking forward from the
//! process start. For each phase boundary an ordered chain of detectors is
//! tried against the samples strictly after the previous boundary; the first
//! detector that finds a signal transition wins. When none does, the phase
//! gets a fixed-duration window. Every boundary is clamped into
//! `[previous boundary, process end]`.

use crate::core::flow::{derive_flow, FlowSample};
use crate::core::phase::{EndRule, Phase, PhaseKind, Phases, PHASE_COUNT};
use crate::core::thresholds::ThresholdConfig;
use crate::ingest::{Batch, Sample, Signal};
use thiserror::Error;
use tracing::debug;

/// Signals the engine cannot work without.
const REQUIRED_SIGNALS: [Signal; 2] = [Signal::VesselWeight, Signal::WaterFlow];

/// Reasons a batch cannot be segmented.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("batch contains no samples")]
    EmptyBatch,
    #[error("required signal `{0}` is missing from every sample")]
    MissingSignal(Signal),
}

/// Segment a batch into its seven phases.
pub fn segment(batch: &Batch, thresholds: &ThresholdConfig) -> Result<Phases, SegmentError> {
    segment_samples(&batch.samples, thresholds)
}

/// Segment samples that are already ordered by timestamp.
pub fn segment_samples(
    samples: &[Sample],
    thresholds: &ThresholdConfig,
) -> Result<Phases, SegmentError> {
    let (first, last) = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(SegmentError::EmptyBatch),
    };
    if let Some(signal) = REQUIRED_SIGNALS
        .into_iter()
        .find(|&signal| samples.iter().all(|s| s.signal(signal).is_none()))
    {
        return Err(SegmentError::MissingSignal(signal));
    }

    let process_start = first.elapsed_minutes;
    let process_end = last.elapsed_minutes;
    let timeline = Timeline {
        flow: derive_flow(samples),
        thresholds,
    };

    let mut boundary = process_start;
    let mut ends = [(process_end, EndRule::ProcessEnd); PHASE_COUNT];
    for (slot, plan) in ends.iter_mut().zip(phase_plans(thresholds)) {
        let (candidate, rule) = plan.resolve(&timeline, boundary);
        let end = clamp_boundary(candidate, boundary, process_end);
        *slot = (end, rule);
        boundary = end;
    }

    Ok(std::array::from_fn(|i| {
        let kind = PhaseKind::ALL[i];
        let start = if i == 0 { process_start } else { ends[i - 1].0 };
        let (end, end_rule) = ends[i];
        Phase {
            id: kind.id(),
            kind,
            start,
            end,
            end_rule,
        }
    }))
}

fn clamp_boundary(candidate: f64, lower: f64, upper: f64) -> f64 {
    if candidate.is_nan() {
        lower
    } else {
        candidate.max(lower).min(upper)
    }
}

/// Derived-flow view of a batch with the thresholds it is judged against.
struct Timeline<'a> {
    flow: Vec<FlowSample<'a>>,
    thresholds: &'a ThresholdConfig,
}

impl<'a> Timeline<'a> {
    /// Samples strictly after `boundary`.
    fn after(&self, boundary: f64) -> &[FlowSample<'a>] {
        let first = self.flow.partition_point(|s| s.elapsed() <= boundary);
        &self.flow[first..]
    }

    fn grist_active(&self, s: &FlowSample<'_>) -> bool {
        s.addition_rate > self.thresholds.grist_rate
    }

    fn high_flow(&self, s: &FlowSample<'_>) -> bool {
        s.water_flow().is_some_and(|f| f > self.thresholds.high_flow)
    }

    /// `None` when flow-drop detection is disabled.
    fn low_flow(&self, s: &FlowSample<'_>) -> Option<bool> {
        let limit = self.thresholds.low_flow?;
        Some(s.water_flow().is_some_and(|f| f < limit))
    }

    fn first_high_after(&self, boundary: f64) -> Option<f64> {
        self.after(boundary)
            .iter()
            .find(|s| self.high_flow(s))
            .map(|s| s.elapsed())
    }

    fn last_high_after(&self, boundary: f64) -> Option<f64> {
        self.after(boundary)
            .iter()
            .rev()
            .find(|s| self.high_flow(s))
            .map(|s| s.elapsed())
    }

    fn first_low_after(&self, boundary: f64) -> Option<f64> {
        self.after(boundary)
            .iter()
            .find(|s| self.low_flow(s).unwrap_or(false))
            .map(|s| s.elapsed())
    }
}

/// One boundary heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Detector {
    /// First sample where grist starts moving
    FirstGristActivity,
    /// Just after the last sample where grist is still moving
    LastGristActivity { epsilon: f64 },
    /// Earliest global minimum of the grist case weight
    MinimumWeight,
    /// First high-flow sample, shifted back by `lead`
    FirstHighFlow { lead: f64 },
    /// First interruption in high flow, shifted back from the resumption
    SpargeGap { gap: f64, lead: f64 },
    /// First low-flow sample after the run of high flow begins
    FlowDropAfterFirstHigh,
    /// First low-flow sample after the run of high flow ends
    FlowDropAfterLastHigh,
    /// Last high-flow sample plus a settling tail
    LastHighFlow { tail: f64 },
}

impl Detector {
    fn rule(self) -> EndRule {
        match self {
            Detector::FirstGristActivity => EndRule::FirstGristActivity,
            Detector::LastGristActivity { .. } => EndRule::LastGristActivity,
            Detector::MinimumWeight => EndRule::MinimumWeight,
            Detector::FirstHighFlow { .. } => EndRule::FirstHighFlow,
            Detector::SpargeGap { .. } => EndRule::SpargeGap,
            Detector::FlowDropAfterFirstHigh | Detector::FlowDropAfterLastHigh => EndRule::FlowDrop,
            Detector::LastHighFlow { .. } => EndRule::LastHighFlow,
        }
    }

    fn detect(self, timeline: &Timeline<'_>, boundary: f64) -> Option<f64> {
        match self {
            Detector::FirstGristActivity => timeline
                .after(boundary)
                .iter()
                .find(|s| timeline.grist_active(s))
                .map(|s| s.elapsed()),
            Detector::LastGristActivity { epsilon } => timeline
                .after(boundary)
                .iter()
                .rev()
                .find(|s| timeline.grist_active(s))
                .map(|s| s.elapsed() + epsilon),
            Detector::MinimumWeight => timeline
                .flow
                .iter()
                .filter_map(|s| s.sample.vessel_weight.map(|w| (w, s.elapsed())))
                .fold(None, |lowest: Option<(f64, f64)>, (w, t)| match lowest {
                    Some((min, _)) if w >= min => lowest,
                    _ => Some((w, t)),
                })
                .map(|(_, t)| t),
            Detector::FirstHighFlow { lead } => {
                timeline.first_high_after(boundary).map(|t| t - lead)
            }
            Detector::SpargeGap { gap, lead } => {
                let highs: Vec<f64> = timeline
                    .after(boundary)
                    .iter()
                    .filter(|s| timeline.high_flow(s))
                    .map(|s| s.elapsed())
                    .collect();
                highs
                    .windows(2)
                    .find(|pair| pair[1] - pair[0] > gap)
                    .map(|pair| pair[1] - lead)
            }
            Detector::FlowDropAfterFirstHigh => {
                timeline.thresholds.low_flow?;
                let first_high = timeline.first_high_after(boundary)?;
                timeline.first_low_after(first_high)
            }
            Detector::FlowDropAfterLastHigh => {
                timeline.thresholds.low_flow?;
                let last_high = timeline.last_high_after(boundary)?;
                timeline.first_low_after(last_high)
            }
            Detector::LastHighFlow { tail } => {
                timeline.last_high_after(boundary).map(|t| t + tail)
            }
        }
    }
}

/// Detector chain and fallback window for one phase end.
struct PhasePlan {
    kind: PhaseKind,
    detectors: Vec<Detector>,
    fallback_minutes: f64,
}

impl PhasePlan {
    fn resolve(&self, timeline: &Timeline<'_>, boundary: f64) -> (f64, EndRule) {
        self.detectors
            .iter()
            .find_map(|d| d.detect(timeline, boundary).map(|t| (t, d.rule())))
            .unwrap_or_else(|| {
                debug!(
                    phase = self.kind.name(),
                    start = boundary,
                    window = self.fallback_minutes,
                    "no signal transition found, using fixed window"
                );
                (boundary + self.fallback_minutes, EndRule::FixedWindow)
            })
    }
}

/// Plans for the ends of phases 1 through 6; phase 7 always runs to the end.
fn phase_plans(t: &ThresholdConfig) -> [PhasePlan; PHASE_COUNT - 1] {
    [
        PhasePlan {
            kind: PhaseKind::WaterPreFill,
            detectors: vec![Detector::FirstGristActivity],
            fallback_minutes: t.prefill_fallback_minutes,
        },
        PhasePlan {
            kind: PhaseKind::GristAddition,
            detectors: vec![
                Detector::LastGristActivity {
                    epsilon: t.grist_end_epsilon_minutes,
                },
                Detector::MinimumWeight,
            ],
            fallback_minutes: t.grist_fallback_minutes,
        },
        PhasePlan {
            kind: PhaseKind::Resting,
            detectors: vec![Detector::FirstHighFlow { lead: 0.0 }],
            fallback_minutes: t.rest_fallback_minutes,
        },
        PhasePlan {
            kind: PhaseKind::Sparge,
            detectors: vec![
                Detector::SpargeGap {
                    gap: t.sparge_gap_minutes,
                    lead: t.sparge_gap_lead_minutes,
                },
                Detector::FlowDropAfterFirstHigh,
                Detector::LastHighFlow {
                    tail: t.sparge_tail_minutes,
                },
            ],
            fallback_minutes: t.sparge_fallback_minutes,
        },
        PhasePlan {
            kind: PhaseKind::FirstWort,
            detectors: vec![Detector::FirstHighFlow {
                lead: t.second_sparge_lead_minutes,
            }],
            fallback_minutes: t.first_wort_fallback_minutes,
        },
        PhasePlan {
            kind: PhaseKind::SecondSparge,
            detectors: vec![
                Detector::FlowDropAfterLastHigh,
                Detector::LastHighFlow {
                    tail: t.second_sparge_tail_minutes,
                },
            ],
            fallback_minutes: t.second_sparge_fallback_minutes,
        },
    ]
}
