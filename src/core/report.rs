//! Batch report builder.
//!
//! A report bundles everything derived from one batch: the seven phases,
//! per-phase summaries, the heat profile over the addition window and any
//! anomaly flags. Reports are plain serde structs so they can be written as
//! pretty JSON or one object per line.

use crate::core::anomaly::{detect_anomalies, Anomaly, AnomalyLimits};
use crate::core::phase::{EndRule, Phase, PhaseKind, Phases};
use crate::core::segmentation::{segment, SegmentError};
use crate::core::summary::{summarize, PhaseSummary};
use crate::core::thermal::HeatProfile;
use crate::core::thresholds::{ThresholdConfig, ThresholdPreset};
use crate::ingest::Batch;
use crate::journal::SharedRunJournal;
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

/// The current report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "mash-phase-analyzer";

/// Producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
}

/// A phase with its display name, as written to reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub id: u8,
    pub kind: PhaseKind,
    pub name: String,
    pub start: f64,
    pub end: f64,
    pub end_rule: EndRule,
}

impl From<&Phase> for PhaseReport {
    fn from(phase: &Phase) -> Self {
        Self {
            id: phase.id,
            kind: phase.kind,
            name: phase.name().to_string(),
            start: phase.start,
            end: phase.end,
            end_rule: phase.end_rule,
        }
    }
}

/// Everything derived from one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub report_version: String,
    pub producer: Producer,
    /// When this report was computed (RFC3339)
    pub computed_at_utc: String,
    pub batch_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<u64>,
    pub sample_count: usize,
    /// Timestamp of the first sample (RFC3339)
    pub process_start_utc: String,
    /// Elapsed minutes of the last sample
    pub process_end_minutes: f64,
    pub preset: ThresholdPreset,
    pub phases: Vec<PhaseReport>,
    pub summaries: Vec<PhaseSummary>,
    pub heat: HeatProfile,
    pub anomalies: Vec<Anomaly>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub meta: HashMap<String, serde_json::Value>,
}

impl BatchReport {
    /// Phase boundaries as `(name, start, end)` triples.
    pub fn phase_table(&self) -> Vec<(&str, f64, f64)> {
        self.phases
            .iter()
            .map(|p| (p.name.as_str(), p.start, p.end))
            .collect()
    }

    pub fn fallback_count(&self) -> usize {
        self.phases
            .iter()
            .filter(|p| p.end_rule == EndRule::FixedWindow)
            .count()
    }
}

/// Result of analyzing one batch inside [`ReportBuilder::build_all`].
#[derive(Debug)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub result: Result<BatchReport, SegmentError>,
}

/// Builds [`BatchReport`]s with a fixed set of thresholds and limits.
pub struct ReportBuilder {
    instance_id: Uuid,
    thresholds: ThresholdConfig,
    limits: AnomalyLimits,
    journal: Option<SharedRunJournal>,
}

impl ReportBuilder {
    /// Create a builder with a unique instance ID.
    pub fn new(thresholds: ThresholdConfig, limits: AnomalyLimits) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            thresholds,
            limits,
            journal: None,
        }
    }

    /// Count every batch built into `journal`.
    pub fn with_journal(mut self, journal: SharedRunJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Segment and annotate a single batch.
    pub fn build(&self, batch: &Batch) -> Result<BatchReport, SegmentError> {
        let phases = match segment(batch, &self.thresholds) {
            Ok(phases) => phases,
            Err(e) => {
                warn!(batch = %batch.id, "segmentation failed: {e}");
                if let Some(ref journal) = self.journal {
                    journal.record_failure(batch.len());
                }
                return Err(e);
            }
        };

        let report = self.assemble(batch, &phases);
        if let Some(ref journal) = self.journal {
            journal.record_batch(batch.len(), report.fallback_count());
        }
        Ok(report)
    }

    /// Build reports for every batch in parallel, keeping input order.
    pub fn build_all(&self, batches: &[Batch]) -> Vec<BatchOutcome> {
        let outcomes: Vec<BatchOutcome> = batches
            .par_iter()
            .map(|batch| BatchOutcome {
                batch_id: batch.id.clone(),
                result: self.build(batch),
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(
            batches = outcomes.len(),
            failed, "analysis finished"
        );
        outcomes
    }

    /// Build a report and serialize it to pretty JSON.
    pub fn build_json(&self, batch: &Batch) -> Result<String, SegmentError> {
        let report = self.build(batch)?;
        Ok(serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string()))
    }

    fn assemble(&self, batch: &Batch, phases: &Phases) -> BatchReport {
        let samples = &batch.samples;

        let mut meta = HashMap::new();
        meta.insert(
            "grist_rate_threshold".to_string(),
            serde_json::json!(self.thresholds.grist_rate),
        );
        meta.insert(
            "high_flow_threshold".to_string(),
            serde_json::json!(self.thresholds.high_flow),
        );
        if let Some(low_flow) = self.thresholds.low_flow {
            meta.insert("low_flow_threshold".to_string(), serde_json::json!(low_flow));
        }

        BatchReport {
            report_version: REPORT_VERSION.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: self.instance_id.to_string(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            batch_id: batch.id.clone(),
            batch_number: batch.number(),
            sample_count: batch.len(),
            process_start_utc: batch
                .process_start()
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_default(),
            process_end_minutes: batch.process_end().unwrap_or(0.0),
            preset: self.thresholds.preset,
            phases: phases.iter().map(PhaseReport::from).collect(),
            summaries: summarize(samples, phases),
            heat: HeatProfile::for_addition(samples, phases),
            anomalies: detect_anomalies(samples, phases, &self.limits),
            meta,
        }
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new(ThresholdConfig::default(), AnomalyLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SensorReading;
    use crate::journal::create_shared_journal;
    use chrono::{Duration, TimeZone};

    fn batch(id: &str, minutes: i64) -> Batch {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        let readings = (0..minutes)
            .map(|i| {
                let mut r = SensorReading::new(id, t0 + Duration::minutes(i));
                r.vessel_weight = Some(if i < 5 { 1000.0 } else { 1000.0 - 5.0 * (i.min(20) - 4) as f64 });
                r.water_flow = Some(if (30..50).contains(&i) { 400.0 } else { 0.0 });
                r.mash_temp = Some(64.0);
                r.water_temp = Some(75.0);
                r
            })
            .collect();
        Batch::from_readings(id, readings)
    }

    #[test]
    fn test_builder_instance_id() {
        let builder1 = ReportBuilder::default();
        let builder2 = ReportBuilder::default();
        assert_ne!(builder1.instance_id(), builder2.instance_id());
    }

    #[test]
    fn test_report_creation() {
        let builder = ReportBuilder::default();
        let report = builder.build(&batch("MASH_12", 80)).unwrap();

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.batch_number, Some(12));
        assert_eq!(report.sample_count, 80);
        assert_eq!(report.phases.len(), 7);
        assert_eq!(report.summaries.len(), 7);
        assert_eq!(report.phases[0].name, "Water Pre-Fill");
        assert_eq!(report.phases[6].end, 79.0);
        assert_eq!(report.process_end_minutes, 79.0);
        assert_eq!(report.preset, ThresholdPreset::Loose);
        assert_eq!(report.phase_table()[3].0, "Sparge");
    }

    #[test]
    fn test_json_serialization() {
        let builder = ReportBuilder::default();
        let json = builder.build_json(&batch("MASH_1", 60)).unwrap();

        assert!(json.contains("report_version"));
        assert!(json.contains("computed_at_utc"));
        assert!(json.contains("producer"));
        assert!(json.contains("phases"));
        assert!(json.contains("Grain Disposal"));
        assert!(json.contains("high_flow_threshold"));
    }

    #[test]
    fn test_build_all_keeps_order_and_journals() {
        let journal = create_shared_journal();
        let builder = ReportBuilder::default().with_journal(journal.clone());

        let batches = vec![
            batch("MASH_3", 70),
            Batch::from_readings("MASH_4", Vec::new()),
            batch("MASH_5", 90),
        ];
        let outcomes = builder.build_all(&batches);

        let ids: Vec<&str> = outcomes.iter().map(|o| o.batch_id.as_str()).collect();
        assert_eq!(ids, vec!["MASH_3", "MASH_4", "MASH_5"]);
        assert!(outcomes[0].result.is_ok());
        assert_eq!(
            outcomes[1].result.as_ref().unwrap_err(),
            &SegmentError::EmptyBatch
        );
        assert!(outcomes[2].result.is_ok());

        let stats = journal.stats();
        assert_eq!(stats.batches_analyzed, 2);
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.samples_processed, 160);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let builder = ReportBuilder::default();
        let batches: Vec<Batch> = (1..=8).map(|n| batch(&format!("MASH_{n}"), 40 + 5 * n)).collect();

        let parallel = builder.build_all(&batches);
        for (outcome, batch) in parallel.iter().zip(&batches) {
            let sequential = builder.build(batch).unwrap();
            let report = outcome.result.as_ref().unwrap();
            assert_eq!(report.phases, sequential.phases);
            assert_eq!(report.summaries, sequential.summaries);
        }
    }
}
