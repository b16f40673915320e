//! Sensor reading types for mashing batches.
//!
//! A [`SensorReading`] is one row exactly as it arrived from the plant
//! historian. A [`Batch`] owns the readings of one process run, sorted by
//! timestamp and re-zeroed onto its own elapsed-minutes axis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A sensor column carried by every reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Grist case weight (kg)
    VesselWeight,
    /// Sparging/mashing water flow (L/hr)
    WaterFlow,
    /// Mash tun temperature (°C)
    MashTemp,
    /// Incoming mashing/sparging water temperature (°C)
    WaterTemp,
    /// Wort receiver temperature (°C)
    WortTemp,
}

impl Signal {
    /// Column name used by the plant export.
    pub fn column(self) -> &'static str {
        match self {
            Signal::VesselWeight => "greast_case_weight",
            Signal::WaterFlow => "sparging_mashing_water_flow",
            Signal::MashTemp => "mashing_temp",
            Signal::WaterTemp => "mashing_sparging_water_temp",
            Signal::WortTemp => "wort_receiver_temp",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::VesselWeight => "vessel_weight",
            Signal::WaterFlow => "water_flow",
            Signal::MashTemp => "mash_temp",
            Signal::WaterTemp => "water_temp",
            Signal::WortTemp => "wort_temp",
        };
        f.write_str(name)
    }
}

/// One raw row from the sensor log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Batch this reading belongs to
    pub batch_id: String,
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
    /// Grist case weight in kg
    pub vessel_weight: Option<f64>,
    /// Water flow in L/hr
    pub water_flow: Option<f64>,
    /// Mash temperature in °C
    pub mash_temp: Option<f64>,
    /// Incoming water temperature in °C
    pub water_temp: Option<f64>,
    /// Wort receiver temperature in °C
    pub wort_temp: Option<f64>,
}

impl SensorReading {
    /// Create a reading with every signal missing.
    pub fn new(batch_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            batch_id: batch_id.into(),
            timestamp,
            vessel_weight: None,
            water_flow: None,
            mash_temp: None,
            water_temp: None,
            wort_temp: None,
        }
    }

    /// Replace non-finite values with "missing".
    pub fn normalized(mut self) -> Self {
        for value in [
            &mut self.vessel_weight,
            &mut self.water_flow,
            &mut self.mash_temp,
            &mut self.water_temp,
            &mut self.wort_temp,
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                *value = None;
            }
        }
        self
    }
}

/// A reading placed on its batch's elapsed-time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// Minutes since the first sample of the batch
    pub elapsed_minutes: f64,
    pub vessel_weight: Option<f64>,
    pub water_flow: Option<f64>,
    pub mash_temp: Option<f64>,
    pub water_temp: Option<f64>,
    pub wort_temp: Option<f64>,
}

impl Sample {
    /// Value of a given signal on this sample.
    pub fn signal(&self, signal: Signal) -> Option<f64> {
        match signal {
            Signal::VesselWeight => self.vessel_weight,
            Signal::WaterFlow => self.water_flow,
            Signal::MashTemp => self.mash_temp,
            Signal::WaterTemp => self.water_temp,
            Signal::WortTemp => self.wort_temp,
        }
    }
}

/// All samples of one process run, ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub samples: Vec<Sample>,
}

impl Batch {
    /// Build a batch from raw readings.
    ///
    /// Readings are sorted by timestamp (ties keep their input order) and the
    /// elapsed axis starts at zero on the earliest one.
    pub fn from_readings(id: impl Into<String>, mut readings: Vec<SensorReading>) -> Self {
        readings.sort_by_key(|r| r.timestamp);

        let samples = match readings.first() {
            Some(first) => {
                let origin = first.timestamp;
                readings
                    .into_iter()
                    .map(|r| {
                        let r = r.normalized();
                        Sample {
                            elapsed_minutes: (r.timestamp - origin).num_milliseconds() as f64
                                / 60_000.0,
                            timestamp: r.timestamp,
                            vessel_weight: r.vessel_weight,
                            water_flow: r.water_flow,
                            mash_temp: r.mash_temp,
                            water_temp: r.water_temp,
                            wort_temp: r.wort_temp,
                        }
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        Self {
            id: id.into(),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Elapsed minutes of the last sample, or `None` for an empty batch.
    pub fn process_end(&self) -> Option<f64> {
        self.samples.last().map(|s| s.elapsed_minutes)
    }

    /// Timestamp of the first sample.
    pub fn process_start(&self) -> Option<DateTime<Utc>> {
        self.samples.first().map(|s| s.timestamp)
    }

    /// Whether at least one sample carries a value for `signal`.
    pub fn has_signal(&self, signal: Signal) -> bool {
        self.samples.iter().any(|s| s.signal(signal).is_some())
    }

    /// Numeric batch number parsed from the id, if any.
    pub fn number(&self) -> Option<u64> {
        batch_number(&self.id)
    }
}

/// Extract the numeric part of a batch id.
///
/// Ids look like `BREW_1042` (second `_`-separated token) or a bare `1042`.
pub fn batch_number(id: &str) -> Option<u64> {
    let id = id.trim();
    if id.contains('_') {
        id.split('_').nth(1)?.trim().parse().ok()
    } else {
        id.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_batch_sorts_and_rezeroes() {
        let readings = vec![
            SensorReading::new("B_1", at(12)),
            SensorReading::new("B_1", at(10)),
            SensorReading::new("B_1", at(11)),
        ];
        let batch = Batch::from_readings("B_1", readings);

        let elapsed: Vec<f64> = batch.samples.iter().map(|s| s.elapsed_minutes).collect();
        assert_eq!(elapsed, vec![0.0, 1.0, 2.0]);
        assert_eq!(batch.process_start(), Some(at(10)));
        assert_eq!(batch.process_end(), Some(2.0));
    }

    #[test]
    fn test_sub_minute_elapsed() {
        let readings = vec![
            SensorReading::new("7", at(0)),
            SensorReading::new("7", at(0) + Duration::seconds(30)),
        ];
        let batch = Batch::from_readings("7", readings);
        assert!((batch.samples[1].elapsed_minutes - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_values_become_missing() {
        let mut reading = SensorReading::new("1", at(0));
        reading.mash_temp = Some(f64::NAN);
        reading.water_flow = Some(f64::INFINITY);
        reading.vessel_weight = Some(900.0);

        let batch = Batch::from_readings("1", vec![reading]);
        let sample = &batch.samples[0];
        assert_eq!(sample.mash_temp, None);
        assert_eq!(sample.water_flow, None);
        assert_eq!(sample.vessel_weight, Some(900.0));
        assert!(batch.has_signal(Signal::VesselWeight));
        assert!(!batch.has_signal(Signal::WaterFlow));
    }

    #[test]
    fn test_empty_batch() {
        let batch = Batch::from_readings("empty", Vec::new());
        assert!(batch.is_empty());
        assert_eq!(batch.process_end(), None);
    }

    #[test]
    fn test_batch_number_parsing() {
        assert_eq!(batch_number("BREW_1042"), Some(1042));
        assert_eq!(batch_number("1042"), Some(1042));
        assert_eq!(batch_number("BREW_x"), None);
        assert_eq!(batch_number("trial"), None);
    }

    #[test]
    fn test_signal_columns() {
        assert_eq!(Signal::VesselWeight.column(), "greast_case_weight");
        assert_eq!(Signal::WaterFlow.to_string(), "water_flow");
    }
}
