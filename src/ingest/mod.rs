//! Sensor log ingestion.
//!
//! Turns exported historian rows into ordered per-batch timelines that the
//! analysis core consumes.

pub mod reader;
pub mod types;

pub use reader::{
    group_batches, parse_timestamp, read_batches, read_batches_from_path, read_readings,
    IngestError,
};
pub use types::{batch_number, Batch, Sample, SensorReading, Signal};
