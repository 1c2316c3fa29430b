//! File intake: discover new extract files at the source and stage them
//! into the received area, grouped by date.
//!
//! Per date-group: discovered → (ignore: too old | already processed) →
//! staged-to-received. The processed/skipped reference-file existence
//! check runs BEFORE any copy; the step engine re-checks after staging
//! (race window) before transforming.

use std::collections::BTreeMap;

use crate::blobstore::BlobStore;
use crate::config::PipelineConfig;
use crate::error::{EtlError, EtlResult};
use crate::extract::ExtractPipeline;
use crate::paths;
use crate::store::EtlStore;
use crate::types::DateGroup;

#[derive(Debug, Default)]
pub struct IntakeOutcome {
    /// Date-groups newly staged into the received area.
    pub staged_groups: Vec<DateGroup>,
    /// Individual files copied this run.
    pub copied_files: Vec<String>,
    pub ignored_too_old: Vec<DateGroup>,
    pub ignored_processed: Vec<DateGroup>,
}

/// Group discovered file paths by the date-group token in their filename.
/// Files without a parseable token are dropped with a warning.
pub fn group_files_by_date(file_paths: &[String]) -> BTreeMap<DateGroup, Vec<String>> {
    let mut groups: BTreeMap<DateGroup, Vec<String>> = BTreeMap::new();
    for path in file_paths {
        let filename = paths::filename_of(path);
        match paths::date_group_from_filename(filename) {
            Some(group) => groups.entry(group).or_default().push(path.clone()),
            None => log::warn!("no date-group token in {path}, ignoring"),
        }
    }
    groups
}

/// Walk the source area (flat listing and dated subfolders), filter out
/// too-old and already-terminal date-groups, and copy every expected file
/// into the received staging area.
///
/// Fatal before any copy: two sources mapping to one destination
/// (DuplicateFile), or the latest retained group missing an expected
/// file (MissingFiles — a date-group is all-or-nothing).
pub fn copy_extract_files_to_archive(
    blob: &dyn BlobStore,
    store: &EtlStore,
    config: &PipelineConfig,
    pipeline: &ExtractPipeline,
) -> EtlResult<IntakeOutcome> {
    let mut outcome = IntakeOutcome::default();
    let sources = blob.list(&config.source_dir)?;

    // (date_group, logical_name) → source paths. More than one source per
    // slot is fatal below.
    let mut discovered: BTreeMap<DateGroup, BTreeMap<&'static str, Vec<String>>> = BTreeMap::new();
    for path in &sources {
        let filename = paths::filename_of(path);
        let Some(config_match) = pipeline.expected_files.iter().find(|f| {
            filename == f.logical_name || filename.ends_with(&format!("-{}", f.logical_name))
        }) else {
            log::debug!("{path} is not an expected extract file, ignoring");
            continue;
        };
        let Some(group) = date_group_for(path, filename) else {
            log::warn!("{path} has no date-group in filename or folder, ignoring");
            continue;
        };
        discovered
            .entry(group)
            .or_default()
            .entry(config_match.logical_name)
            .or_default()
            .push(path.clone());
    }

    // Partition groups and detect duplicates before any transfer happens.
    let mut retained: BTreeMap<DateGroup, Vec<(&'static str, String)>> = BTreeMap::new();
    for (group, slots) in discovered {
        if is_too_old(config, &group) {
            log::info!("date-group {group} predates the configured history window, ignoring");
            outcome.ignored_too_old.push(group);
            continue;
        }
        if is_already_terminal(store, config, pipeline, &group)? {
            log::info!("date-group {group} already processed or skipped, ignoring");
            outcome.ignored_processed.push(group);
            continue;
        }

        let mut files = Vec::with_capacity(slots.len());
        for (logical_name, mut slot_sources) in slots {
            if slot_sources.len() > 1 {
                slot_sources.sort();
                return Err(EtlError::DuplicateFile {
                    destination: format!("{group}-{logical_name}"),
                    sources: slot_sources.join(", "),
                });
            }
            files.push((logical_name, slot_sources.remove(0)));
        }
        retained.insert(group, files);
    }

    // The latest retained group must be complete before anything copies.
    if let Some((latest_group, files)) = retained.iter().next_back() {
        let missing: Vec<&str> = pipeline
            .expected_files
            .iter()
            .map(|f| f.logical_name)
            .filter(|name| !files.iter().any(|(logical, _)| logical == name))
            .collect();
        if !missing.is_empty() {
            return Err(EtlError::MissingFiles {
                date_group: latest_group.clone(),
                missing: missing.join(", "),
            });
        }
    }

    for (group, files) in &retained {
        let received = paths::received_path(&config.archive_root, group);
        for (logical_name, source) in files {
            let destination = paths::join(&received, &format!("{group}-{logical_name}"));
            blob.copy(source, &destination)?;
            outcome.copied_files.push(destination);
        }
        log::info!("staged date-group {group} ({} files)", files.len());
        outcome.staged_groups.push(group.clone());
    }

    Ok(outcome)
}

/// True when a reference file already sits at the group's processed or
/// skipped terminal location — the idempotence guard.
pub fn is_already_terminal(
    store: &EtlStore,
    config: &PipelineConfig,
    pipeline: &ExtractPipeline,
    group: &str,
) -> EtlResult<bool> {
    let processed =
        paths::processed_path(&config.archive_root, pipeline.reference_file_type, group);
    if store.get_reference_file_by_location(&processed)?.is_some() {
        return Ok(true);
    }
    let skipped = paths::skipped_path(&config.archive_root, pipeline.reference_file_type, group);
    Ok(store.get_reference_file_by_location(&skipped)?.is_some())
}

fn is_too_old(config: &PipelineConfig, group: &str) -> bool {
    let Some(max_history_date) = config.claimant_extract_max_history_date else {
        return false;
    };
    match paths::date_group_timestamp(group) {
        Some(ts) => ts.date() < max_history_date,
        None => false,
    }
}

/// Date-group from the filename prefix, falling back to a dated parent
/// folder for sources laid out as `<timestamp>/<Name>.csv`.
fn date_group_for(path: &str, filename: &str) -> Option<DateGroup> {
    if let Some(group) = paths::date_group_from_filename(filename) {
        return Some(group);
    }
    let mut components: Vec<&str> = path.split('/').collect();
    components.pop(); // filename
    components
        .pop()
        .and_then(|folder| paths::date_group_from_filename(folder))
}
