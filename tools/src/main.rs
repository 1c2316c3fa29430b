//! etl-runner: headless runner for the delegated-payments pipeline.
//!
//! Usage:
//!   etl-runner --db pfml.db --config config.json --step claimant-extract
//!   etl-runner --db pfml.db --step error-report
//!   etl-runner --db pfml.db --step state-counts

use std::env;
use std::path::Path;

use anyhow::{bail, Result};
use chrono::Utc;

use pfml_core::blobstore::FsStore;
use pfml_core::claimant_extract::ClaimantExtractStep;
use pfml_core::config::PipelineConfig;
use pfml_core::extract::CLAIMANT_EXTRACT_PIPELINE;
use pfml_core::flows::StateRegistry;
use pfml_core::intake::copy_extract_files_to_archive;
use pfml_core::report::{send_claimant_error_report, BlobArchiveSink};
use pfml_core::statelog::StateLogEngine;
use pfml_core::step::{run_extract_step, StepContext};
use pfml_core::store::EtlStore;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or("pfml.db");
    let step = arg_value(&args, "--step").unwrap_or("claimant-extract");
    let config = match arg_value(&args, "--config") {
        Some(path) => PipelineConfig::load(Path::new(path))?,
        None => PipelineConfig::default().with_env_overrides(),
    };

    println!("pfml etl-runner");
    println!("  db:      {db}");
    println!("  step:    {step}");
    println!("  source:  {}", config.source_dir);
    println!("  archive: {}", config.archive_root);
    println!();

    let store = EtlStore::open(db)?;
    store.migrate()?;
    let registry = StateRegistry::init()?;
    let blob = FsStore::new();
    let now = Utc::now();

    let import_log_id = store.create_import_log(step, now)?;
    let outcome: Result<String> = match step {
        "intake" => run_intake(&blob, &store, &config),
        "claimant-extract" => {
            run_claimant_extract(&blob, &store, &registry, &config, import_log_id)
        }
        "error-report" => run_error_report(&blob, &store, &registry, &config, import_log_id),
        "state-counts" => run_state_counts(&store, &registry),
        other => bail!("unknown step: {other}"),
    };

    match outcome {
        Ok(report) => {
            store.finish_import_log(import_log_id, "success", &report, Utc::now())?;
            println!("{report}");
            Ok(())
        }
        Err(err) => {
            store.finish_import_log(import_log_id, "error", &err.to_string(), Utc::now())?;
            Err(err)
        }
    }
}

fn run_intake(blob: &FsStore, store: &EtlStore, config: &PipelineConfig) -> Result<String> {
    let outcome = copy_extract_files_to_archive(blob, store, config, &CLAIMANT_EXTRACT_PIPELINE)?;
    Ok(format!(
        "intake: staged {} group(s) ({} files), ignored {} too-old, {} already-terminal",
        outcome.staged_groups.len(),
        outcome.copied_files.len(),
        outcome.ignored_too_old.len(),
        outcome.ignored_processed.len()
    ))
}

fn run_claimant_extract(
    blob: &FsStore,
    store: &EtlStore,
    registry: &StateRegistry,
    config: &PipelineConfig,
    import_log_id: i64,
) -> Result<String> {
    copy_extract_files_to_archive(blob, store, config, &CLAIMANT_EXTRACT_PIPELINE)?;

    let ctx = StepContext {
        store,
        blob,
        registry,
        config,
        import_log_id,
        now: Utc::now(),
    };
    let mut step = ClaimantExtractStep;
    let summary = run_extract_step(&mut step, &ctx)?;

    let mut lines = Vec::new();
    for (group, report) in &summary.processed_groups {
        lines.push(format!(
            "{group}: {} processed, {} flagged, {} skipped",
            report.records_processed, report.records_flagged, report.records_skipped
        ));
    }
    for group in &summary.skipped_groups {
        lines.push(format!("{group}: superseded, moved to skipped"));
    }
    if lines.is_empty() {
        lines.push("no date-groups to process".to_string());
    }
    Ok(lines.join("\n"))
}

fn run_error_report(
    blob: &FsStore,
    store: &EtlStore,
    registry: &StateRegistry,
    config: &PipelineConfig,
    import_log_id: i64,
) -> Result<String> {
    let sink = BlobArchiveSink {
        blob,
        reports_root: config.reports_root.clone(),
    };
    let dispatch =
        send_claimant_error_report(store, registry, &sink, None, import_log_id, Utc::now())?;
    Ok(format!(
        "error report: {} record(s) delivered to {}",
        dispatch.record_count, dispatch.destination
    ))
}

fn run_state_counts(store: &EtlStore, registry: &StateRegistry) -> Result<String> {
    let engine = StateLogEngine::new(registry);
    let counts = engine.get_state_counts(store)?;
    if counts.is_empty() {
        return Ok("no entities tracked yet".to_string());
    }
    let lines: Vec<String> = counts
        .iter()
        .map(|c| format!("{:>6}  {}", c.count, c.state.description()))
        .collect();
    Ok(lines.join("\n"))
}

fn arg_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == name)
        .map(|w| w[1].as_str())
}
