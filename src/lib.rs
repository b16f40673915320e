//! Mash Phase Analyzer - phase segmentation for instrumented mash vessels.
//!
//! This library reads time-stamped sensor logs from a mashing vessel (grist
//! case weight, water flow, mash and water temperatures), cuts every batch
//! into seven contiguous process phases and derives a per-sample thermal
//! flux signal used to flag process anomalies.
//!
//! # Guarantees
//!
//! - **Total**: every non-empty batch with weight and flow data gets exactly seven phases
//! - **Contiguous**: each phase starts where the previous one ended
//! - **Deterministic**: the same samples and thresholds always give the same phases
//! - **No NaN**: missing sensor values turn into zero flux, never NaN
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Mash Phase Analyzer                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Ingest    │──▶│    Flow     │──▶│ Segmentation│       │
//! │  │   (CSV)     │   │ (derivation)│   │ (7 phases)  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                              │              │
//! │                                              ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │    Run      │◀──│   Report    │◀──│  Thermal /  │       │
//! │  │  Journal    │   │  (rayon)    │   │  Summaries  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mash_phase_analyzer::{ingest, segment, ThresholdConfig};
//!
//! let batches = ingest::read_batches_from_path("mash.csv".as_ref())?;
//! for batch in &batches {
//!     let phases = segment(batch, &ThresholdConfig::default())?;
//!     for phase in &phases {
//!         println!("{:<16} {:>7.2} .. {:>7.2}", phase.name(), phase.start, phase.end);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod core;
pub mod ingest;
pub mod journal;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    derive_flow, segment, thermal_flux, BatchReport, Phase, PhaseKind, Phases, ReportBuilder,
    SegmentError, ThresholdConfig, ThresholdPreset,
};
pub use ingest::{Batch, IngestError, Sample, SensorReading, Signal};
pub use journal::{JournalStats, RunJournal, SharedRunJournal};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reference card for the seven phases, shown by `mash-phases phases`.
pub const PHASE_GUIDE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                MASH PHASE ANALYZER - PHASE GUIDE                 ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  1. Water Pre-Fill   water in, no grist yet                      ║
║  2. Grist Addition   grist drawn from the case into the mash     ║
║  3. Resting          enzymatic rest, no pumping                  ║
║  4. Sparge           high-flow rinse of the grain bed            ║
║  5. First Wort       pumping paused, wort drains                 ║
║  6. Second Sparge    final high-flow rinse                       ║
║  7. Grain Disposal   spent grain removed until process end       ║
║                                                                  ║
║  Phase ends come from grist addition rate and water flow.        ║
║  When no transition is found a fixed window is used and the      ║
║  phase is flagged as a fallback boundary.                        ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
