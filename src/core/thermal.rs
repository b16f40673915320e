//! Thermal flux carried into the mash by incoming water.
//!
//! For each sample after the first, the heat made available between the
//! previous and current sample is
//!
//! ```text
//! Q[i] = (flow[i-1] / 60) * cp * (mash_temp[i] - water_temp[i-1])
//! ```
//!
//! with flow converted from L/hr to L/min and water density taken as 1 kg/L.

use crate::core::flow::grist_consumed;
use crate::core::phase::{PhaseKind, Phases};
use crate::core::windowing::span_range;
use crate::ingest::Sample;
use serde::{Deserialize, Serialize};

/// Specific heat of water in kJ/(kg·°C).
pub const SPECIFIC_HEAT_WATER: f64 = 4.18;

/// Water density in kg/L.
pub const WATER_DENSITY: f64 = 1.0;

/// Per-sample thermal flux in kJ, aligned index-for-index with `samples`.
///
/// Any missing input for a pair yields exactly 0 for that sample.
pub fn thermal_flux(samples: &[Sample]) -> Vec<f64> {
    let mut flux = Vec::with_capacity(samples.len());
    if samples.is_empty() {
        return flux;
    }
    flux.push(0.0);
    flux.extend(samples.windows(2).map(|pair| pair_flux(&pair[0], &pair[1])));
    flux
}

fn pair_flux(previous: &Sample, current: &Sample) -> f64 {
    match (previous.water_flow, previous.water_temp, current.mash_temp) {
        (Some(flow), Some(water_temp), Some(mash_temp)) => {
            let mass_per_minute = WATER_DENSITY * flow / 60.0;
            mass_per_minute * SPECIFIC_HEAT_WATER * (mash_temp - water_temp)
        }
        _ => 0.0,
    }
}

/// Grist consumed before heat-per-grist is reported, in kg.
pub const HEAT_PER_GRIST_MIN_GRIST_KG: f64 = 100.0;

/// One point of a thermal flux series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluxPoint {
    pub elapsed_minutes: f64,
    pub flux_kj: f64,
}

/// Heat delivered by the water per kg of grist consumed so far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatPerGristPoint {
    pub elapsed_minutes: f64,
    /// `-Q / grist consumed`, in kJ/kg
    pub kj_per_kg: f64,
    pub grist_consumed_kg: f64,
}

/// Thermal flux over the raw material addition window (pre-fill plus grist addition).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeatProfile {
    pub start: f64,
    pub end: f64,
    pub points: Vec<FluxPoint>,
    /// Only samples with more than [`HEAT_PER_GRIST_MIN_GRIST_KG`] consumed
    pub heat_per_grist: Vec<HeatPerGristPoint>,
    pub total_kj: f64,
    /// Largest absolute per-sample flux
    pub peak_kj: f64,
}

impl HeatProfile {
    /// Annotate the addition window of an already segmented batch.
    pub fn for_addition(samples: &[Sample], phases: &Phases) -> Self {
        let start = phases[PhaseKind::WaterPreFill as usize].start;
        let end = phases[PhaseKind::GristAddition as usize].end;

        let range = span_range(samples, start, end);
        let flux = thermal_flux(samples);
        let window = &samples[range.clone()];
        let flux = &flux[range];

        let points: Vec<FluxPoint> = window
            .iter()
            .zip(flux)
            .map(|(s, &flux_kj)| FluxPoint {
                elapsed_minutes: s.elapsed_minutes,
                flux_kj,
            })
            .collect();

        let heat_per_grist = points
            .iter()
            .zip(grist_consumed(window))
            .filter_map(|(p, consumed)| {
                let consumed = consumed.filter(|&c| c > HEAT_PER_GRIST_MIN_GRIST_KG)?;
                Some(HeatPerGristPoint {
                    elapsed_minutes: p.elapsed_minutes,
                    kj_per_kg: -p.flux_kj / consumed,
                    grist_consumed_kg: consumed,
                })
            })
            .collect();

        let total_kj = points.iter().map(|p| p.flux_kj).sum();
        let peak_kj = points.iter().map(|p| p.flux_kj.abs()).fold(0.0, f64::max);

        Self {
            start,
            end,
            points,
            heat_per_grist,
            total_kj,
            peak_kj,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(flow: Option<f64>, water: Option<f64>, mash: Option<f64>) -> Sample {
        Sample {
            timestamp: Utc::now(),
            elapsed_minutes: 0.0,
            vessel_weight: None,
            water_flow: flow,
            mash_temp: mash,
            water_temp: water,
            wort_temp: None,
        }
    }

    #[test]
    fn test_reference_value() {
        let samples = vec![
            sample(Some(300.0), Some(20.0), None),
            sample(None, None, Some(65.0)),
        ];
        let flux = thermal_flux(&samples);
        assert_eq!(flux.len(), 2);
        assert_eq!(flux[0], 0.0);
        assert!((flux[1] - 940.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_temperature_is_exact_zero() {
        let samples = vec![
            sample(Some(300.0), None, Some(60.0)),
            sample(Some(300.0), Some(20.0), Some(65.0)),
            sample(Some(300.0), Some(20.0), None),
        ];
        let flux = thermal_flux(&samples);
        assert_eq!(flux[1], 0.0);
        assert_eq!(flux[2], 0.0);
        assert!(flux.iter().all(|q| !q.is_nan()));
    }

    #[test]
    fn test_missing_flow_is_zero() {
        let samples = vec![
            sample(None, Some(20.0), Some(60.0)),
            sample(Some(100.0), Some(20.0), Some(65.0)),
        ];
        assert_eq!(thermal_flux(&samples), vec![0.0, 0.0]);
    }

    #[test]
    fn test_empty_and_single() {
        assert!(thermal_flux(&[]).is_empty());
        assert_eq!(thermal_flux(&[sample(Some(1.0), Some(1.0), Some(1.0))]), vec![0.0]);
    }

    #[test]
    fn test_negative_flux_when_water_is_hotter() {
        let samples = vec![
            sample(Some(600.0), Some(80.0), Some(60.0)),
            sample(Some(600.0), Some(80.0), Some(62.0)),
        ];
        let flux = thermal_flux(&samples);
        assert!((flux[1] - 10.0 * SPECIFIC_HEAT_WATER * -18.0).abs() < 1e-9);
    }

    #[test]
    fn test_heat_per_grist_after_enough_grist() {
        let weights = [1000.0, 950.0, 850.0, 700.0];
        let samples: Vec<Sample> = weights
            .iter()
            .enumerate()
            .map(|(i, &w)| Sample {
                elapsed_minutes: i as f64,
                vessel_weight: Some(w),
                ..sample(Some(600.0), Some(80.0), Some(60.0))
            })
            .collect();
        let phases: Phases = std::array::from_fn(|i| {
            let kind = PhaseKind::ALL[i];
            let (start, end) = match i {
                0 => (0.0, 1.0),
                1 => (1.0, 3.0),
                _ => (3.0, 3.0),
            };
            crate::core::phase::Phase {
                id: kind.id(),
                kind,
                start,
                end,
                end_rule: crate::core::phase::EndRule::LastGristActivity,
            }
        });

        let profile = HeatProfile::for_addition(&samples, &phases);
        assert_eq!(profile.points.len(), 4);

        // 10 L/min of 80 °C water into a 60 °C mash.
        let q = 10.0 * SPECIFIC_HEAT_WATER * -20.0;
        assert!((profile.total_kj - 3.0 * q).abs() < 1e-9);
        assert!((profile.peak_kj - q.abs()).abs() < 1e-9);

        assert_eq!(profile.heat_per_grist.len(), 2);
        let first = profile.heat_per_grist[0];
        assert_eq!(first.elapsed_minutes, 2.0);
        assert_eq!(first.grist_consumed_kg, 150.0);
        assert!((first.kj_per_kg - 836.0 / 150.0).abs() < 1e-9);
        assert!((profile.heat_per_grist[1].kj_per_kg - 836.0 / 300.0).abs() < 1e-9);
    }
}
