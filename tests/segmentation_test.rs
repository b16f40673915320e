//! Integration tests for phase segmentation and thermal flux.

use chrono::{Duration, TimeZone, Utc};
use mash_phase_analyzer::core::{addition_rates, EndRule, PhaseKind, Phases, PHASE_COUNT};
use mash_phase_analyzer::{
    segment, thermal_flux, Batch, SegmentError, SensorReading, Signal, ThresholdConfig,
};

/// One reading per minute for `minutes` minutes.
fn batch_from(
    minutes: i64,
    weight: impl Fn(i64) -> Option<f64>,
    flow: impl Fn(i64) -> Option<f64>,
) -> Batch {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 14, 7, 30, 0).unwrap();
    let readings = (0..minutes)
        .map(|m| {
            let mut r = SensorReading::new("MASH_7", t0 + Duration::minutes(m));
            r.vessel_weight = weight(m);
            r.water_flow = flow(m);
            r.mash_temp = Some(64.0);
            r.water_temp = Some(76.0);
            r
        })
        .collect();
    Batch::from_readings("MASH_7", readings)
}

/// 100 minutes; weight falls 1000 -> 800 kg over minutes 2..8, 400 L/hr between minutes 10 and 30.
fn scenario_batch() -> Batch {
    batch_from(
        100,
        |m| {
            let w = match m {
                0..=2 => 1000.0,
                3..=7 => 1000.0 - 200.0 * (m - 2) as f64 / 6.0,
                _ => 800.0,
            };
            Some(w)
        },
        |m| Some(if (10..=30).contains(&m) { 400.0 } else { 0.0 }),
    )
}

fn assert_covers(phases: &Phases, batch: &Batch) {
    assert_eq!(phases.len(), PHASE_COUNT);
    assert_eq!(phases[0].start, 0.0);
    assert_eq!(phases[PHASE_COUNT - 1].end, batch.process_end().unwrap());
    for (i, phase) in phases.iter().enumerate() {
        assert_eq!(phase.id as usize, i + 1);
        assert!(phase.end >= phase.start, "phase {} runs backwards", phase.id);
        if i > 0 {
            assert_eq!(phases[i - 1].end, phase.start, "gap before phase {}", phase.id);
        }
    }
}

#[test]
fn scenario_loose_thresholds() {
    let batch = scenario_batch();
    let phases = segment(&batch, &ThresholdConfig::loose()).unwrap();
    assert_covers(&phases, &batch);

    let ends: Vec<f64> = phases.iter().map(|p| p.end).collect();
    assert!((2.0..=3.0).contains(&ends[0]), "phase 1 ended at {}", ends[0]);
    assert!((8.0..=9.0).contains(&ends[1]), "phase 2 ended at {}", ends[1]);
    assert_eq!(ends[2], 10.0);
    assert!((30.0..=32.0).contains(&ends[3]), "phase 4 ended at {}", ends[3]);
    assert_eq!(ends[6], 99.0);

    assert_eq!(phases[0].end_rule, EndRule::FirstGristActivity);
    assert_eq!(phases[1].end_rule, EndRule::LastGristActivity);
    assert_eq!(phases[2].end_rule, EndRule::FirstHighFlow);
    assert_eq!(phases[4].end_rule, EndRule::FixedWindow);
    assert_eq!(phases[5].end_rule, EndRule::FixedWindow);
    assert_eq!(phases[6].end_rule, EndRule::ProcessEnd);
}

#[test]
fn scenario_strict_thresholds() {
    let batch = scenario_batch();
    let phases = segment(&batch, &ThresholdConfig::strict()).unwrap();
    assert_covers(&phases, &batch);

    assert_eq!(phases[2].end, 10.0);
    assert_eq!(phases[3].end, 32.0);
    assert_eq!(phases[3].end_rule, EndRule::LastHighFlow);
    assert!(phases[4].is_fallback());
    // Second sparge fallback runs past the log and is capped.
    assert_eq!(phases[5].end, 99.0);
}

#[test]
fn segmentation_is_deterministic() {
    let batch = scenario_batch();
    let thresholds = ThresholdConfig::default();
    let first = segment(&batch, &thresholds).unwrap();
    let second = segment(&batch, &thresholds).unwrap();
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.start.to_bits(), b.start.to_bits());
        assert_eq!(a.end.to_bits(), b.end.to_bits());
        assert_eq!(a.end_rule, b.end_rule);
    }
}

#[test]
fn flat_flow_falls_back_to_fixed_windows() {
    let batch = batch_from(200, |_| Some(1000.0), |_| Some(0.0));
    let phases = segment(&batch, &ThresholdConfig::loose()).unwrap();
    assert_covers(&phases, &batch);

    assert_eq!(phases[0].end, 5.0);
    assert!(phases[0].is_fallback());
    assert_eq!(phases[1].end_rule, EndRule::MinimumWeight);
    assert_eq!(phases[1].end, 5.0);
    assert_eq!(phases[2].end, 65.0);
    assert_eq!(phases[3].end, 80.0);
    assert_eq!(phases[4].end, 110.0);
    assert_eq!(phases[5].end, 130.0);
    assert_eq!(phases[6].end, 199.0);
    assert!(phases[2..6].iter().all(|p| p.is_fallback()));
}

#[test]
fn short_batch_is_capped_at_process_end() {
    let batch = batch_from(12, |_| Some(500.0), |_| Some(0.0));
    let phases = segment(&batch, &ThresholdConfig::loose()).unwrap();
    assert_covers(&phases, &batch);
    assert!(phases.iter().skip(2).all(|p| p.end == 11.0));
}

#[test]
fn single_sample_batch() {
    let batch = batch_from(1, |_| Some(500.0), |_| Some(250.0));
    let phases = segment(&batch, &ThresholdConfig::loose()).unwrap();
    assert!(phases.iter().all(|p| p.start == 0.0 && p.end == 0.0));
}

#[test]
fn empty_and_signal_less_batches_are_rejected() {
    let empty = Batch::from_readings("MASH_1", Vec::new());
    assert_eq!(
        segment(&empty, &ThresholdConfig::default()),
        Err(SegmentError::EmptyBatch)
    );

    let no_flow = batch_from(30, |_| Some(900.0), |_| None);
    assert_eq!(
        segment(&no_flow, &ThresholdConfig::default()),
        Err(SegmentError::MissingSignal(Signal::WaterFlow))
    );

    let no_weight = batch_from(30, |_| None, |_| Some(0.0));
    assert_eq!(
        segment(&no_weight, &ThresholdConfig::default()),
        Err(SegmentError::MissingSignal(Signal::VesselWeight))
    );
}

#[test]
fn gaps_in_weight_still_segment() {
    let batch = batch_from(
        60,
        |m| if m % 4 == 0 { None } else { Some(1000.0 - m as f64) },
        |m| Some(if (20..40).contains(&m) { 350.0 } else { 0.0 }),
    );
    let phases = segment(&batch, &ThresholdConfig::loose()).unwrap();
    assert_covers(&phases, &batch);
}

#[test]
fn addition_rates_are_never_negative() {
    let sequences: Vec<Vec<Option<f64>>> = vec![
        (0..20).map(|i| Some(1000.0 - 10.0 * i as f64)).collect(),
        (0..20).map(|i| Some(500.0 + 7.0 * i as f64)).collect(),
        (0..20)
            .map(|i| Some(if i % 2 == 0 { 300.0 } else { 312.5 }))
            .collect(),
        (0..20)
            .map(|i| if i % 3 == 0 { None } else { Some(100.0 - i as f64) })
            .collect(),
    ];

    for weights in sequences {
        let batch = batch_from(20, |m| weights[m as usize], |_| Some(0.0));
        let rates = addition_rates(&batch.samples);
        assert_eq!(rates.len(), batch.len());
        assert_eq!(rates[0], 0.0);
        assert!(rates.iter().all(|r| *r >= 0.0), "negative rate in {rates:?}");
    }
}

#[test]
fn thermal_reference_scenario() {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 14, 7, 30, 0).unwrap();
    let mut before = SensorReading::new("MASH_9", t0);
    before.water_flow = Some(300.0);
    before.water_temp = Some(20.0);
    let mut after = SensorReading::new("MASH_9", t0 + Duration::minutes(1));
    after.mash_temp = Some(65.0);

    let batch = Batch::from_readings("MASH_9", vec![before, after]);
    let flux = thermal_flux(&batch.samples);
    assert_eq!(flux[0], 0.0);
    assert!((flux[1] - 940.5).abs() < 1e-9);
}

#[test]
fn thermal_zero_fallback_on_missing_temperatures() {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 14, 7, 30, 0).unwrap();
    let readings = (0..60)
        .map(|m| {
            let mut r = SensorReading::new("MASH_8", t0 + Duration::minutes(m));
            r.vessel_weight = Some(900.0);
            r.water_flow = Some(250.0);
            r.mash_temp = if m % 5 == 0 { None } else { Some(63.0) };
            r.water_temp = if m % 7 == 0 { Some(f64::NAN) } else { Some(78.0) };
            r
        })
        .collect();
    let batch = Batch::from_readings("MASH_8", readings);

    let flux = thermal_flux(&batch.samples);
    assert_eq!(flux.len(), batch.len());
    for i in 1..flux.len() {
        assert!(!flux[i].is_nan(), "sample {i}");
        if batch.samples[i].mash_temp.is_none() || batch.samples[i - 1].water_temp.is_none() {
            assert_eq!(flux[i], 0.0, "sample {i}");
        } else {
            assert!(flux[i] < 0.0, "sample {i}");
        }
    }
}

#[test]
fn phase_kinds_follow_process_order() {
    let phases = segment(&scenario_batch(), &ThresholdConfig::default()).unwrap();
    let kinds: Vec<PhaseKind> = phases.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, PhaseKind::ALL.to_vec());
}
