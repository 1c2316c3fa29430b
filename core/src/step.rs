//! The step engine: drives one extract pipeline over the received area.
//!
//! EXECUTION ORDER per run (fixed):
//!   1. Enumerate received date-groups, oldest first.
//!   2. Move every group but the latest straight to skipped — extracts
//!      are cumulative, older unprocessed groups are superseded.
//!   3. Re-check the latest group against the processed/skipped terminal
//!      locations (idempotence double-check after intake's check).
//!   4. Download + index + stage the latest group, hand it to the step,
//!      and commit-or-rollback the whole group as one transaction.
//!
//! On any unhandled error the group's transaction rolls back, its files
//! move to the error area, and the run terminates. Groups committed
//! earlier in the same run stay committed.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::blobstore::BlobStore;
use crate::config::PipelineConfig;
use crate::error::{EtlError, EtlResult};
use crate::extract::{
    filter_known_columns, parse_csv_rows, unknown_columns, Extract, ExtractData, ExtractPipeline,
    StagingTable,
};
use crate::flows::{State, StateRegistry};
use crate::intake::{group_files_by_date, is_already_terminal};
use crate::paths;
use crate::statelog::{AssociatedEntity, StateLogEngine};
use crate::store::{EtlStore, ReferenceFileRow};
use crate::types::{DateGroup, EntityId, ImportLogId};
use crate::validation::build_outcome;

pub struct StepContext<'a> {
    pub store: &'a EtlStore,
    pub blob: &'a dyn BlobStore,
    pub registry: &'a StateRegistry,
    pub config: &'a PipelineConfig,
    pub import_log_id: ImportLogId,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Records reconciled cleanly.
    pub records_processed: u64,
    /// Records with validation issues, routed to an error-report state.
    pub records_flagged: u64,
    /// Records dropped with no DB trace (e.g. unresolvable employee).
    pub records_skipped: u64,
}

/// One concrete extract step. The engine owns file movement, staging,
/// and transaction boundaries; the step owns record-level semantics.
pub trait Step {
    fn name(&self) -> &'static str;

    fn pipeline(&self) -> &'static ExtractPipeline;

    /// Process one fully indexed date-group. Runs inside the group's
    /// open transaction; any Err rolls the whole group back.
    fn process_date_group(
        &mut self,
        ctx: &StepContext<'_>,
        data: &ExtractData,
    ) -> EtlResult<StepReport>;
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub processed_groups: Vec<(DateGroup, StepReport)>,
    pub skipped_groups: Vec<DateGroup>,
}

pub fn run_extract_step(step: &mut dyn Step, ctx: &StepContext<'_>) -> EtlResult<RunSummary> {
    let pipeline = step.pipeline();
    let received_root = paths::join(&ctx.config.archive_root, paths::RECEIVED_FOLDER);
    let groups = group_files_by_date(&ctx.blob.list(&received_root)?);

    let mut summary = RunSummary::default();
    let Some(latest_group) = groups.keys().next_back().cloned() else {
        log::info!("{}: no date-groups in received area", step.name());
        return Ok(summary);
    };

    for (group, files) in &groups {
        if *group != latest_group {
            skip_date_group(ctx, pipeline, group, files)?;
            summary.skipped_groups.push(group.clone());
            continue;
        }

        // Idempotence double-check: a concurrent or earlier run may have
        // finished this group between intake's check and now.
        if is_already_terminal(ctx.store, ctx.config, pipeline, group)? {
            log::warn!(
                "{}: date-group {group} reached a terminal location since intake, skipping",
                step.name()
            );
            continue;
        }

        if ctx.config.dry_run {
            dry_run_date_group(step, ctx, group, files)?;
            continue;
        }

        let report = process_date_group_files(step, ctx, group, files)?;
        summary.processed_groups.push((group.clone(), report));
    }

    Ok(summary)
}

/// Move a superseded group straight to its skipped terminal location and
/// record the reference file that guards against reprocessing.
fn skip_date_group(
    ctx: &StepContext<'_>,
    pipeline: &ExtractPipeline,
    group: &str,
    files: &[String],
) -> EtlResult<()> {
    let skipped_root = paths::skipped_path(
        &ctx.config.archive_root,
        pipeline.reference_file_type,
        group,
    );

    ctx.store.begin_group()?;
    let result = record_reference_file(ctx, pipeline, &skipped_root, State::ExtractSkipped, group);
    match result {
        Ok(_) => ctx.store.commit_group()?,
        Err(err) => {
            rollback_quietly(ctx.store);
            return Err(err);
        }
    }

    for file in files {
        let destination = paths::join(&skipped_root, paths::filename_of(file));
        ctx.blob.rename(file, &destination)?;
    }
    log::info!("date-group {group} superseded, moved to skipped");
    Ok(())
}

/// Download, index, stage, and reconcile the latest group inside one
/// transaction. On failure: roll back, archive the files to the error
/// area, and re-raise.
fn process_date_group_files(
    step: &mut dyn Step,
    ctx: &StepContext<'_>,
    group: &str,
    files: &[String],
) -> EtlResult<StepReport> {
    let pipeline = step.pipeline();
    let received_root = paths::received_path(&ctx.config.archive_root, group);

    ctx.store.begin_group()?;
    let attempt = (|| -> EtlResult<StepReport> {
        let reference_file_id =
            record_reference_file(ctx, pipeline, &received_root, State::ExtractReceived, group)?;

        let data = download_and_stage(ctx, pipeline, group, files, &reference_file_id)?;
        let report = step.process_date_group(ctx, &data)?;

        let engine = StateLogEngine::new(ctx.registry);
        engine.create_finished_state_log(
            ctx.store,
            &AssociatedEntity::ReferenceFile(reference_file_id.clone()),
            State::ExtractProcessed,
            &build_outcome("Extract transformed", None),
            Some(ctx.import_log_id),
            ctx.now,
            None,
        )?;
        Ok(report)
    })();

    match attempt {
        Ok(report) => {
            ctx.store.commit_group()?;
            let processed_root = paths::processed_path(
                &ctx.config.archive_root,
                pipeline.reference_file_type,
                group,
            );
            for file in files {
                let destination = paths::join(&processed_root, paths::filename_of(file));
                ctx.blob.rename(file, &destination)?;
            }
            if let Some(reference) = ctx.store.get_reference_file_by_location(&received_root)? {
                ctx.store
                    .update_reference_file_location(&reference.reference_file_id, &processed_root)?;
            }
            log::info!(
                "date-group {group}: {} processed, {} flagged, {} skipped",
                report.records_processed,
                report.records_flagged,
                report.records_skipped
            );
            Ok(report)
        }
        Err(err) => {
            log::error!("date-group {group} failed, rolling back: {err}");
            rollback_quietly(ctx.store);
            archive_failed_group(ctx, pipeline, group, files);
            Err(err)
        }
    }
}

/// Best-effort error archival after a rollback. Bookkeeping failures are
/// logged, never allowed to mask the original error.
fn archive_failed_group(
    ctx: &StepContext<'_>,
    pipeline: &ExtractPipeline,
    group: &str,
    files: &[String],
) {
    let error_root = paths::error_path(&ctx.config.archive_root, group);
    for file in files {
        let destination = paths::join(&error_root, paths::filename_of(file));
        if let Err(move_err) = ctx.blob.rename(file, &destination) {
            log::error!("failed to move {file} to error area: {move_err}");
        }
    }

    let bookkeeping = (|| -> EtlResult<()> {
        ctx.store.begin_group()?;
        match record_reference_file(ctx, pipeline, &error_root, State::ExtractErrored, group) {
            Ok(_) => ctx.store.commit_group(),
            Err(err) => {
                rollback_quietly(ctx.store);
                Err(err)
            }
        }
    })();
    if let Err(err) = bookkeeping {
        log::error!("failed to record errored reference file for {group}: {err}");
    }
}

fn dry_run_date_group(
    step: &mut dyn Step,
    ctx: &StepContext<'_>,
    group: &str,
    files: &[String],
) -> EtlResult<()> {
    let pipeline = step.pipeline();
    for config in pipeline.expected_files {
        let path = expected_file_path(group, files, config.logical_name)
            .ok_or_else(|| EtlError::MissingFiles {
                date_group: group.to_string(),
                missing: config.logical_name.to_string(),
            })?;
        let rows = parse_csv_rows(&ctx.blob.download(&path)?)?;
        log::info!(
            "dry run: {} rows in {} for date-group {group}",
            rows.len(),
            config.logical_name
        );
    }
    log::info!("dry run: date-group {group} left untouched by {}", step.name());
    Ok(())
}

/// Parse each expected file, persist every raw row to its staging table,
/// and build the in-memory index the step reconciles from.
fn download_and_stage(
    ctx: &StepContext<'_>,
    pipeline: &ExtractPipeline,
    group: &str,
    files: &[String],
    reference_file_id: &str,
) -> EtlResult<ExtractData> {
    let mut data = ExtractData::new(group.to_string(), reference_file_id.to_string());

    for config in pipeline.expected_files {
        let path = expected_file_path(group, files, config.logical_name)
            .ok_or_else(|| EtlError::MissingFiles {
                date_group: group.to_string(),
                missing: config.logical_name.to_string(),
            })?;
        let bytes = ctx.blob.download(&path)?;
        let rows = parse_csv_rows(&bytes)?;

        if let Some(first) = rows.first() {
            let unknown = unknown_columns(first, config.known_columns);
            if !unknown.is_empty() {
                log::warn!(
                    "{}: dropping unknown columns {}",
                    config.logical_name,
                    unknown.join(", ")
                );
            }
        }

        for row in &rows {
            let staged = filter_known_columns(row, config.known_columns);
            match config.staging_table {
                StagingTable::EmployeeFeed => ctx.store.insert_employee_feed_staging(
                    reference_file_id,
                    ctx.import_log_id,
                    &staged,
                )?,
                StagingTable::RequestedAbsence => ctx.store.insert_requested_absence_staging(
                    reference_file_id,
                    ctx.import_log_id,
                    &staged,
                )?,
            }
        }

        data.insert(config.logical_name, Extract::from_rows(&path, &rows, config));
    }

    Ok(data)
}

fn expected_file_path(group: &str, files: &[String], logical_name: &str) -> Option<String> {
    let wanted = format!("{group}-{logical_name}");
    files
        .iter()
        .find(|path| paths::filename_of(path) == wanted)
        .cloned()
}

/// Insert the group's reference file row and record its ingest-flow
/// transition, backdated to the extract's own timestamp.
fn record_reference_file(
    ctx: &StepContext<'_>,
    pipeline: &ExtractPipeline,
    file_location: &str,
    end_state: State,
    group: &str,
) -> EtlResult<EntityId> {
    let reference_file_id = Uuid::new_v4().to_string();
    ctx.store.insert_reference_file(&ReferenceFileRow {
        reference_file_id: reference_file_id.clone(),
        file_location: file_location.to_string(),
        reference_file_type_id: pipeline.reference_file_type.id(),
    })?;

    let start_time = paths::date_group_timestamp(group).map(|ts| Utc.from_utc_datetime(&ts));
    let engine = StateLogEngine::new(ctx.registry);
    engine.create_finished_state_log(
        ctx.store,
        &AssociatedEntity::ReferenceFile(reference_file_id.clone()),
        end_state,
        &build_outcome(end_state.description(), None),
        Some(ctx.import_log_id),
        ctx.now,
        start_time,
    )?;
    Ok(reference_file_id)
}

fn rollback_quietly(store: &EtlStore) {
    if let Err(err) = store.rollback_group() {
        log::error!("rollback failed: {err}");
    }
}
