//! Mash Phase Analyzer CLI
//!
//! Segments mashing sensor logs into process phases.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use mash_phase_analyzer::{
    config::Config,
    core::{segment, thermal_flux, BatchReport, HeatProfile, PhaseKind, ReportBuilder},
    ingest::{read_batches_from_path, Batch},
    journal::{create_shared_journal_with_persistence, RunJournal},
    ThresholdPreset, PHASE_GUIDE, VERSION,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mash-phases")]
#[command(version = VERSION)]
#[command(about = "Phase segmentation for mashing sensor logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the seven phase boundaries of each batch
    Segment {
        /// Sensor log (CSV)
        csv: PathBuf,

        /// Only this batch (id or number)
        #[arg(long)]
        batch: Option<String>,

        /// Threshold preset (loose or strict); defaults to the configured thresholds
        #[arg(long)]
        preset: Option<ThresholdPreset>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the thermal flux series of one batch
    Thermal {
        /// Sensor log (CSV)
        csv: PathBuf,

        /// Batch id or number
        #[arg(long)]
        batch: String,
    },

    /// Build full reports for every batch and write them to disk
    Analyze {
        /// Sensor log (CSV)
        csv: PathBuf,

        /// Output directory for reports
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Threshold preset (loose or strict)
        #[arg(long)]
        preset: Option<ThresholdPreset>,
    },

    /// Describe the seven process phases
    Phases,

    /// Show cumulative analysis statistics
    Status,

    /// Show configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// One pretty JSON file per batch
    Json,
    /// All reports in a single JSON Lines file
    Jsonl,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Segment {
            csv,
            batch,
            preset,
            json,
        } => cmd_segment(&csv, batch.as_deref(), preset, json),
        Commands::Thermal { csv, batch } => cmd_thermal(&csv, &batch),
        Commands::Analyze {
            csv,
            output,
            format,
            preset,
        } => cmd_analyze(&csv, output, format, preset),
        Commands::Phases => {
            cmd_phases();
            Ok(())
        }
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
    }
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        warn!("using default configuration: {e}");
        Config::default()
    })
}

fn load_batches(csv: &Path) -> Result<Vec<Batch>> {
    let batches = read_batches_from_path(csv)
        .with_context(|| format!("failed to read sensor log {}", csv.display()))?;
    if batches.is_empty() {
        bail!("no batches found in {}", csv.display());
    }
    Ok(batches)
}

/// Keep only the batch matching `wanted` by id or by number.
fn select_batches(batches: Vec<Batch>, wanted: Option<&str>) -> Result<Vec<Batch>> {
    let Some(wanted) = wanted else {
        return Ok(batches);
    };
    let number: Option<u64> = wanted.trim().parse().ok();
    let selected: Vec<Batch> = batches
        .into_iter()
        .filter(|b| b.id == wanted || (number.is_some() && b.number() == number))
        .collect();
    if selected.is_empty() {
        bail!("batch '{wanted}' not found");
    }
    Ok(selected)
}

fn cmd_segment(
    csv: &Path,
    batch: Option<&str>,
    preset: Option<ThresholdPreset>,
    json: bool,
) -> Result<()> {
    let config = load_config();
    let thresholds = config.thresholds_for(preset);
    let batches = select_batches(load_batches(csv)?, batch)?;

    let mut all = serde_json::Map::new();
    for batch in &batches {
        let phases = match segment(batch, &thresholds) {
            Ok(phases) => phases,
            Err(e) => {
                warn!(batch = %batch.id, "skipping batch: {e}");
                continue;
            }
        };

        if json {
            all.insert(batch.id.clone(), serde_json::to_value(phases)?);
            continue;
        }

        println!("Batch {} ({} samples, {} thresholds)", batch.id, batch.len(), thresholds.preset);
        println!("  {:<3} {:<16} {:>9} {:>9}  {}", "#", "Phase", "Start", "End", "Ended by");
        for phase in &phases {
            println!(
                "  {:<3} {:<16} {:>9.2} {:>9.2}  {:?}",
                phase.id,
                phase.name(),
                phase.start,
                phase.end,
                phase.end_rule
            );
        }
        println!();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
    }
    Ok(())
}

fn cmd_thermal(csv: &Path, batch: &str) -> Result<()> {
    let config = load_config();
    let selected = select_batches(load_batches(csv)?, Some(batch))?;

    for batch in &selected {
        let flux = thermal_flux(&batch.samples);

        println!("Batch {} thermal flux (kJ)", batch.id);
        println!("  {:>9} {:>12}", "Minute", "Q");
        for (sample, q) in batch.samples.iter().zip(&flux) {
            println!("  {:>9.2} {:>12.2}", sample.elapsed_minutes, q);
        }

        match segment(batch, &config.thresholds) {
            Ok(phases) => {
                let heat = HeatProfile::for_addition(&batch.samples, &phases);
                println!();
                println!(
                    "  Raw material addition ({:.2} .. {:.2} min): total {:.1} kJ, peak {:.1} kJ",
                    heat.start, heat.end, heat.total_kj, heat.peak_kj
                );
            }
            Err(e) => warn!(batch = %batch.id, "no addition window: {e}"),
        }
        println!();
    }
    Ok(())
}

fn cmd_analyze(
    csv: &Path,
    output: Option<PathBuf>,
    format: Format,
    preset: Option<ThresholdPreset>,
) -> Result<()> {
    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        warn!("could not create directories: {e}");
    }
    let output_dir = output.unwrap_or_else(|| config.export_path.clone());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let batches = load_batches(csv)?;
    let journal = create_shared_journal_with_persistence(config.journal_path());
    let builder = ReportBuilder::new(config.thresholds_for(preset), config.anomalies.clone())
        .with_journal(journal.clone());

    info!(batches = batches.len(), preset = %builder.thresholds().preset, "analyzing");
    let outcomes = builder.build_all(&batches);

    let mut reports: Vec<BatchReport> = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome.result {
            Ok(report) => reports.push(report),
            Err(e) => eprintln!("Batch {}: {e}", outcome.batch_id),
        }
    }

    match format {
        Format::Json => {
            for report in &reports {
                let path = output_dir.join(format!("{}.json", sanitize(&report.batch_id)));
                let json = serde_json::to_string_pretty(report)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            println!("Wrote {} report(s) to {}", reports.len(), output_dir.display());
        }
        Format::Jsonl => {
            let path = output_dir.join(format!(
                "reports_{}.jsonl",
                Utc::now().format("%Y%m%d_%H%M%S")
            ));
            std::fs::write(&path, to_jsonl(&reports)?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {} report(s) to {}", reports.len(), path.display());
        }
    }

    for report in &reports {
        let warnings = report
            .anomalies
            .iter()
            .filter(|a| a.severity == mash_phase_analyzer::core::Severity::Warning)
            .count();
        if warnings > 0 {
            println!("  {}: {warnings} warning(s)", report.batch_id);
        }
    }

    if let Err(e) = journal.save() {
        warn!("could not save run journal: {e}");
    }
    println!();
    println!("{}", journal.summary());
    Ok(())
}

/// One JSON document per line, each line terminated.
fn to_jsonl<T: Serialize>(items: &[T]) -> serde_json::Result<String> {
    let mut out = String::new();
    for item in items {
        out.push_str(&serde_json::to_string(item)?);
        out.push('\n');
    }
    Ok(out)
}

/// File-system safe version of a batch id.
///
/// Other bytes are percent-encoded so distinct ids never share a file.
fn sanitize(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn cmd_phases() {
    println!("{PHASE_GUIDE}");
    for kind in PhaseKind::ALL {
        println!("{}. {:<16} {}", kind.id(), kind.name(), kind.description());
    }
}

fn cmd_status() -> Result<()> {
    let config = load_config();

    println!("Mash Phase Analyzer Status");
    println!("==========================");
    println!();
    println!("Configuration:");
    println!("  Threshold preset: {}", config.thresholds.preset);
    println!("  Grist rate threshold: {}", config.thresholds.grist_rate);
    println!("  High flow threshold: {} L/hr", config.thresholds.high_flow);
    match config.thresholds.low_flow {
        Some(low) => println!("  Low flow threshold: {low} L/hr"),
        None => println!("  Low flow threshold: disabled"),
    }
    println!("  Reports: {}", config.export_path.display());
    println!();

    let journal_path = config.journal_path();
    if journal_path.exists() {
        let journal = RunJournal::with_persistence(journal_path);
        println!("{}", journal.summary());
    } else {
        println!("No previous analysis runs found.");
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", Config::config_path().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_batch_id() {
        assert_eq!(sanitize("MASH_12"), "MASH_12");
        assert_eq!(sanitize("a/b c"), "a%2Fb%20c");
        assert_ne!(sanitize("a/b"), sanitize("a_b"));
        assert_ne!(sanitize("a/b"), sanitize("a%2Fb"));
    }

    #[test]
    fn test_jsonl_ends_every_line() {
        let out = to_jsonl(&[serde_json::json!({"a": 1}), serde_json::json!({"b": 2})]).unwrap();
        assert_eq!(out, "{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(to_jsonl::<u8>(&[]).unwrap(), "");
    }

    #[test]
    fn test_cli_parses_preset() {
        let cli = Cli::try_parse_from(["mash-phases", "segment", "log.csv", "--preset", "strict"])
            .unwrap();
        match cli.command {
            Commands::Segment { preset, .. } => assert_eq!(preset, Some(ThresholdPreset::Strict)),
            _ => panic!("expected segment"),
        }
        assert!(Cli::try_parse_from(["mash-phases", "segment", "log.csv", "--preset", "x"]).is_err());
    }
}
