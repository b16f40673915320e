//! Process anomaly flags for a segmented batch.

use crate::core::flow::{grist_consumed, water_added};
use crate::core::phase::{PhaseKind, Phases};
use crate::core::windowing::{span, PhaseWindow};
use crate::ingest::{Sample, Signal};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Limits the anomaly checks compare against.
///
/// Temperatures in °C, ratios in kg of grist per litre of water.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyLimits {
    /// Sparge water should average at least this
    pub sparge_temp_target_low: f64,
    /// Sparge water above this risks extracting husk tannins
    pub sparge_temp_risk_high: f64,
    /// Largest acceptable mash temperature drop while resting
    pub rest_max_temp_drop: f64,
    /// Below this the grist is flooded with hot water
    pub grist_water_ratio_low: f64,
    /// Above this the mash is too thick to wet out
    pub grist_water_ratio_high: f64,
    /// Ratio is only judged while water runs at least this fast (L/min)
    pub ratio_min_water_rate: f64,
    /// Ratio is only judged once this much water is in (L)
    pub ratio_min_water_added: f64,
}

impl Default for AnomalyLimits {
    fn default() -> Self {
        Self {
            sparge_temp_target_low: 74.0,
            sparge_temp_risk_high: 78.0,
            rest_max_temp_drop: 2.0,
            grist_water_ratio_low: 0.2,
            grist_water_ratio_high: 1.5,
            ratio_min_water_rate: 5.0,
            ratio_min_water_added: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

/// Which side of the grist:water band a ratio fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioRisk {
    /// Too much water for the grist
    Cooked,
    /// Too little water for the grist
    Starchy,
}

/// What was flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnomalyKind {
    SpargeWaterTooHot { peak: f64, limit: f64 },
    SpargeWaterTooCool { mean: f64, target: f64 },
    RestHeatLoss { drop: f64, limit: f64 },
    /// Most extreme ratio seen on the flagged side
    GristWaterRatio { ratio: f64, limit: f64, risk: RatioRisk },
    /// The phase end came from a fixed window, not a signal transition
    FallbackBoundary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub phase: PhaseKind,
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

impl Anomaly {
    fn warning(phase: PhaseKind, kind: AnomalyKind) -> Self {
        Self {
            phase,
            severity: Severity::Warning,
            kind,
        }
    }
}

/// Run every check against a segmented batch.
pub fn detect_anomalies(samples: &[Sample], phases: &Phases, limits: &AnomalyLimits) -> Vec<Anomaly> {
    let sparge = PhaseWindow::new(samples, phases[PhaseKind::Sparge as usize]);
    let resting = PhaseWindow::new(samples, phases[PhaseKind::Resting as usize]);

    let mut anomalies = Vec::new();
    anomalies.extend(check_sparge_temperature(&sparge, limits));
    anomalies.extend(check_rest_heat_loss(&resting, limits));
    anomalies.extend(check_grist_water_ratio(samples, phases, limits));
    anomalies.extend(
        phases
            .iter()
            .filter(|p| p.is_fallback())
            .map(|p| Anomaly {
                phase: p.kind,
                severity: Severity::Info,
                kind: AnomalyKind::FallbackBoundary,
            }),
    );
    anomalies
}

fn check_sparge_temperature(window: &PhaseWindow<'_>, limits: &AnomalyLimits) -> Vec<Anomaly> {
    let temps = window.values(Signal::WaterTemp);
    if temps.is_empty() {
        return Vec::new();
    }

    let mut found = Vec::new();
    let peak = Statistics::max(&temps);
    if peak > limits.sparge_temp_risk_high {
        found.push(Anomaly::warning(
            PhaseKind::Sparge,
            AnomalyKind::SpargeWaterTooHot {
                peak,
                limit: limits.sparge_temp_risk_high,
            },
        ));
    }

    let mean = Statistics::mean(&temps);
    if mean < limits.sparge_temp_target_low {
        found.push(Anomaly::warning(
            PhaseKind::Sparge,
            AnomalyKind::SpargeWaterTooCool {
                mean,
                target: limits.sparge_temp_target_low,
            },
        ));
    }
    found
}

fn check_rest_heat_loss(window: &PhaseWindow<'_>, limits: &AnomalyLimits) -> Option<Anomaly> {
    let temps = window.values(Signal::MashTemp);
    let first = *temps.first()?;
    let drop = first - Statistics::min(&temps);
    (drop > limits.rest_max_temp_drop).then(|| {
        Anomaly::warning(
            PhaseKind::Resting,
            AnomalyKind::RestHeatLoss {
                drop,
                limit: limits.rest_max_temp_drop,
            },
        )
    })
}

/// Grist:water ratio across the addition window, judged while grist is added.
///
/// Water and grist both accumulate from the start of pre-fill.
fn check_grist_water_ratio(samples: &[Sample], phases: &Phases, limits: &AnomalyLimits) -> Vec<Anomaly> {
    let grist_phase = phases[PhaseKind::GristAddition as usize];
    let window = span(samples, phases[PhaseKind::WaterPreFill as usize].start, grist_phase.end);

    let ratios: Vec<f64> = window
        .iter()
        .zip(grist_consumed(window))
        .zip(water_added(window))
        .filter(|((s, _), added)| {
            grist_phase.contains(s.elapsed_minutes)
                && s.water_flow.is_some_and(|f| f / 60.0 >= limits.ratio_min_water_rate)
                && *added > limits.ratio_min_water_added
        })
        .filter_map(|((_, consumed), added)| Some(consumed? / added))
        .collect();
    if ratios.is_empty() {
        return Vec::new();
    }

    let mut found = Vec::new();
    let lowest = Statistics::min(&ratios);
    if lowest < limits.grist_water_ratio_low {
        found.push(Anomaly::warning(
            PhaseKind::GristAddition,
            AnomalyKind::GristWaterRatio {
                ratio: lowest,
                limit: limits.grist_water_ratio_low,
                risk: RatioRisk::Cooked,
            },
        ));
    }
    let highest = Statistics::max(&ratios);
    if highest > limits.grist_water_ratio_high {
        found.push(Anomaly::warning(
            PhaseKind::GristAddition,
            AnomalyKind::GristWaterRatio {
                ratio: highest,
                limit: limits.grist_water_ratio_high,
                risk: RatioRisk::Starchy,
            },
        ));
    }
    found
}
