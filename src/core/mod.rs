//! Core analysis for the mash phase analyzer.
//!
//! This module contains:
//! - Flow derivation and the phase segmentation engine
//! - Thermal flux estimation
//! - Phase windows, summaries and anomaly flags
//! - Report building for export

pub mod anomaly;
pub mod flow;
pub mod phase;
pub mod report;
pub mod segmentation;
pub mod summary;
pub mod thermal;
pub mod thresholds;
pub mod windowing;

// Re-export commonly used types
pub use anomaly::{detect_anomalies, Anomaly, AnomalyKind, AnomalyLimits, Severity};
pub use flow::{addition_rates, derive_flow, grist_consumed, water_added, FlowSample};
pub use phase::{EndRule, Phase, PhaseKind, Phases, PHASE_COUNT};
pub use report::{BatchOutcome, BatchReport, ReportBuilder, PRODUCER_NAME, REPORT_VERSION};
pub use segmentation::{segment, segment_samples, SegmentError};
pub use summary::{summarize, PhaseSummary, SignalStats};
pub use thermal::{
    thermal_flux, FluxPoint, HeatPerGristPoint, HeatProfile, HEAT_PER_GRIST_MIN_GRIST_KG,
    SPECIFIC_HEAT_WATER,
};
pub use thresholds::{ThresholdConfig, ThresholdPreset};
pub use windowing::{phase_windows, span, span_range, PhaseWindow};
