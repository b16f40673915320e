//! Tunable thresholds for phase segmentation.
//!
//! Two historical threshold sets exist and can disagree on the same batch,
//! so both are kept as named presets rather than picking one silently.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named threshold sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPreset {
    /// Low activation thresholds (grist > 0.5, flow > 200) with flow-drop detection
    #[default]
    Loose,
    /// High activation thresholds (grist > 10, flow > 300) without flow-drop detection
    Strict,
}

impl fmt::Display for ThresholdPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdPreset::Loose => f.write_str("loose"),
            ThresholdPreset::Strict => f.write_str("strict"),
        }
    }
}

impl FromStr for ThresholdPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loose" => Ok(ThresholdPreset::Loose),
            "strict" => Ok(ThresholdPreset::Strict),
            other => Err(ConfigError::Invalid(format!("unknown threshold preset '{other}'"))),
        }
    }
}

/// Every constant the segmentation engine compares against.
///
/// Times are in minutes, flows in L/hr, addition rates in kg per sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Preset these values started from
    pub preset: ThresholdPreset,
    /// Grist addition rate that counts as "material moving"
    pub grist_rate: f64,
    /// Water flow that counts as sparge pumping
    pub high_flow: f64,
    /// Water flow below which pumping has stopped; `None` disables flow-drop detection
    pub low_flow: Option<f64>,
    /// Interruption between high-flow samples that ends the sparge
    pub sparge_gap_minutes: f64,
    pub prefill_fallback_minutes: f64,
    /// Added after the last active grist sample
    pub grist_end_epsilon_minutes: f64,
    /// Grist addition window when no detector fires. Kept so every phase has
    /// one, but not reached in practice: the minimum-weight rule resolves as
    /// soon as any weight is logged, and a batch without weights is rejected.
    pub grist_fallback_minutes: f64,
    pub rest_fallback_minutes: f64,
    /// Sparge ends this long before flow resumes after a gap
    pub sparge_gap_lead_minutes: f64,
    /// Sparge ends this long after the last high-flow sample
    pub sparge_tail_minutes: f64,
    pub sparge_fallback_minutes: f64,
    /// First wort ends this long before the second sparge starts
    pub second_sparge_lead_minutes: f64,
    pub first_wort_fallback_minutes: f64,
    pub second_sparge_tail_minutes: f64,
    pub second_sparge_fallback_minutes: f64,
}

impl ThresholdConfig {
    pub fn preset(preset: ThresholdPreset) -> Self {
        match preset {
            ThresholdPreset::Loose => Self::loose(),
            ThresholdPreset::Strict => Self::strict(),
        }
    }

    pub fn loose() -> Self {
        Self {
            preset: ThresholdPreset::Loose,
            grist_rate: 0.5,
            high_flow: 200.0,
            low_flow: Some(50.0),
            sparge_gap_minutes: 3.0,
            prefill_fallback_minutes: 5.0,
            grist_end_epsilon_minutes: 1.0,
            grist_fallback_minutes: 10.0,
            rest_fallback_minutes: 60.0,
            sparge_gap_lead_minutes: 1.0,
            sparge_tail_minutes: 2.0,
            sparge_fallback_minutes: 15.0,
            second_sparge_lead_minutes: 1.0,
            first_wort_fallback_minutes: 30.0,
            second_sparge_tail_minutes: 5.0,
            second_sparge_fallback_minutes: 20.0,
        }
    }

    pub fn strict() -> Self {
        Self {
            preset: ThresholdPreset::Strict,
            grist_rate: 10.0,
            high_flow: 300.0,
            low_flow: None,
            sparge_gap_minutes: 5.0,
            prefill_fallback_minutes: 5.0,
            grist_end_epsilon_minutes: 1.0,
            grist_fallback_minutes: 10.0,
            rest_fallback_minutes: 45.0,
            sparge_gap_lead_minutes: 2.0,
            sparge_tail_minutes: 2.0,
            sparge_fallback_minutes: 20.0,
            second_sparge_lead_minutes: 2.0,
            first_wort_fallback_minutes: 40.0,
            second_sparge_tail_minutes: 5.0,
            second_sparge_fallback_minutes: 30.0,
        }
    }

    /// Reject negative or non-finite values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("grist_rate", Some(self.grist_rate)),
            ("high_flow", Some(self.high_flow)),
            ("low_flow", self.low_flow),
            ("sparge_gap_minutes", Some(self.sparge_gap_minutes)),
            ("prefill_fallback_minutes", Some(self.prefill_fallback_minutes)),
            ("grist_end_epsilon_minutes", Some(self.grist_end_epsilon_minutes)),
            ("grist_fallback_minutes", Some(self.grist_fallback_minutes)),
            ("rest_fallback_minutes", Some(self.rest_fallback_minutes)),
            ("sparge_gap_lead_minutes", Some(self.sparge_gap_lead_minutes)),
            ("sparge_tail_minutes", Some(self.sparge_tail_minutes)),
            ("sparge_fallback_minutes", Some(self.sparge_fallback_minutes)),
            ("second_sparge_lead_minutes", Some(self.second_sparge_lead_minutes)),
            ("first_wort_fallback_minutes", Some(self.first_wort_fallback_minutes)),
            ("second_sparge_tail_minutes", Some(self.second_sparge_tail_minutes)),
            ("second_sparge_fallback_minutes", Some(self.second_sparge_fallback_minutes)),
        ];

        for (name, value) in fields {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "threshold {name} must be a non-negative number, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::loose()
    }
}
