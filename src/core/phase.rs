//! The seven mashing phases and their time intervals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of phases in every batch.
pub const PHASE_COUNT: usize = 7;

/// Fixed phases of a mashing run, in temporal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    WaterPreFill,
    GristAddition,
    Resting,
    Sparge,
    FirstWort,
    SecondSparge,
    GrainDisposal,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; PHASE_COUNT] = [
        PhaseKind::WaterPreFill,
        PhaseKind::GristAddition,
        PhaseKind::Resting,
        PhaseKind::Sparge,
        PhaseKind::FirstWort,
        PhaseKind::SecondSparge,
        PhaseKind::GrainDisposal,
    ];

    /// 1-based phase number.
    pub fn id(self) -> u8 {
        self as u8 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            PhaseKind::WaterPreFill => "Water Pre-Fill",
            PhaseKind::GristAddition => "Grist Addition",
            PhaseKind::Resting => "Resting",
            PhaseKind::Sparge => "Sparge",
            PhaseKind::FirstWort => "First Wort",
            PhaseKind::SecondSparge => "Second Sparge",
            PhaseKind::GrainDisposal => "Grain Disposal",
        }
    }

    /// The signal signature that bounds this phase.
    pub fn description(self) -> &'static str {
        match self {
            PhaseKind::WaterPreFill => "Water enters the tun before any grist moves",
            PhaseKind::GristAddition => "Grist case weight falls until addition stops",
            PhaseKind::Resting => "No grist and no sparge flow while enzymes convert",
            PhaseKind::Sparge => "Sparge water pumps until flow stops or pauses",
            PhaseKind::FirstWort => "Runoff collects until a second water spike",
            PhaseKind::SecondSparge => "Second water injection until flow settles",
            PhaseKind::GrainDisposal => "Spent grain discharge until the log ends",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What fixed the end of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndRule {
    FirstGristActivity,
    LastGristActivity,
    MinimumWeight,
    FirstHighFlow,
    SpargeGap,
    FlowDrop,
    LastHighFlow,
    FixedWindow,
    ProcessEnd,
}

/// One bounded phase of a batch, in elapsed minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: u8,
    pub kind: PhaseKind,
    pub start: f64,
    pub end: f64,
    pub end_rule: EndRule,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Inclusive on both ends.
    pub fn contains(&self, elapsed_minutes: f64) -> bool {
        elapsed_minutes >= self.start && elapsed_minutes <= self.end
    }

    /// Whether the end came from a fixed-duration window rather than a signal.
    pub fn is_fallback(&self) -> bool {
        self.end_rule == EndRule::FixedWindow
    }
}

/// The full segmentation of one batch.
pub type Phases = [Phase; PHASE_COUNT];
