//! Grist addition rate derived from the grist case weight.
//!
//! The case empties into the mash tun, so its weight falls while grist is
//! being added. The addition rate is the negated weight differential,
//! clamped at zero so refills never count as consumption.

use crate::ingest::Sample;

/// A sample paired with its derived grist addition rate.
#[derive(Debug, Clone, Copy)]
pub struct FlowSample<'a> {
    pub sample: &'a Sample,
    /// kg drawn since the previous sample, always >= 0
    pub addition_rate: f64,
}

impl FlowSample<'_> {
    pub fn elapsed(&self) -> f64 {
        self.sample.elapsed_minutes
    }

    pub fn water_flow(&self) -> Option<f64> {
        self.sample.water_flow
    }
}

/// Compute the addition rate for every sample.
///
/// The first sample has rate 0. A missing weight on either side of a pair
/// also yields 0 for that pair.
pub fn addition_rates(samples: &[Sample]) -> Vec<f64> {
    samples
        .iter()
        .scan(None::<f64>, |previous, sample| {
            let rate = match (*previous, sample.vessel_weight) {
                (Some(before), Some(now)) => (before - now).max(0.0),
                _ => 0.0,
            };
            *previous = sample.vessel_weight;
            Some(rate)
        })
        .collect()
}

/// Pair each sample with its addition rate.
pub fn derive_flow(samples: &[Sample]) -> Vec<FlowSample<'_>> {
    samples
        .iter()
        .zip(addition_rates(samples))
        .map(|(sample, addition_rate)| FlowSample {
            sample,
            addition_rate,
        })
        .collect()
}

/// Grist drawn from the case since the first weighed sample of `samples`.
///
/// `None` where the weight is missing; never negative.
pub fn grist_consumed(samples: &[Sample]) -> Vec<Option<f64>> {
    let initial = samples.iter().find_map(|s| s.vessel_weight);
    samples
        .iter()
        .map(|s| Some((initial? - s.vessel_weight?).max(0.0)))
        .collect()
}

/// Cumulative water added in litres, one minute of flow per reading.
pub fn water_added(samples: &[Sample]) -> Vec<f64> {
    samples
        .iter()
        .scan(0.0, |total, s| {
            *total += s.water_flow.unwrap_or(0.0) / 60.0;
            Some(*total)
        })
        .collect()
}
