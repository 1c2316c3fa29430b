//! Error/audit report generation and dispatch.
//!
//! Collects every entity whose CURRENT state is an add-to-error-report
//! state, renders one CSV row per record from the persisted outcome
//! JSON, and hands the bytes to a ReportSink. The e-mail transport is a
//! collaborator implementing the same trait; the blob-archive sink below
//! is the built-in fallback when mail fails.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::blobstore::BlobStore;
use crate::error::EtlResult;
use crate::flows::{State, StateRegistry};
use crate::lookups::ReferenceFileType;
use crate::paths;
use crate::statelog::{AssociatedEntity, AssociatedType, StateLogEngine};
use crate::store::{EtlStore, ReferenceFileRow, StateLogRow};
use crate::types::ImportLogId;
use crate::validation::{build_outcome, Outcome};

pub trait ReportSink {
    fn name(&self) -> &'static str;

    /// Deliver the report; returns a human-readable destination.
    fn dispatch(&self, report_name: &str, csv_bytes: &[u8]) -> EtlResult<String>;
}

/// Writes reports into the archive's reports area.
pub struct BlobArchiveSink<'a> {
    pub blob: &'a dyn BlobStore,
    pub reports_root: String,
}

impl ReportSink for BlobArchiveSink<'_> {
    fn name(&self) -> &'static str {
        "blob-archive"
    }

    fn dispatch(&self, report_name: &str, csv_bytes: &[u8]) -> EtlResult<String> {
        let destination = paths::join(&self.reports_root, report_name);
        self.blob.upload(&destination, csv_bytes)?;
        Ok(destination)
    }
}

#[derive(Debug)]
pub struct ErrorReport {
    pub name: String,
    pub csv: Vec<u8>,
    pub record_count: usize,
    state_logs: Vec<StateLogRow>,
}

#[derive(Debug)]
pub struct ReportDispatch {
    pub destination: String,
    pub record_count: usize,
}

/// Render the claimant error report from every employee currently parked
/// in the add-to-error-report state.
pub fn build_claimant_error_report(
    store: &EtlStore,
    registry: &StateRegistry,
    now: DateTime<Utc>,
) -> EtlResult<ErrorReport> {
    let engine = StateLogEngine::new(registry);
    let state_logs = engine.get_all_latest_state_logs_in_end_state(
        store,
        AssociatedType::Employee,
        State::ClaimantAddToErrorReport,
    )?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["record_key", "description", "flagged_at"])?;
    for log in &state_logs {
        let (record_key, description) = describe_outcome(log);
        writer.write_record([
            record_key.as_str(),
            description.as_str(),
            log.ended_at.to_rfc3339().as_str(),
        ])?;
    }
    let csv = writer
        .into_inner()
        .map_err(|e| crate::error::EtlError::Other(anyhow::anyhow!("csv flush failed: {e}")))?;

    Ok(ErrorReport {
        name: format!(
            "{}-claimant-extract-error-report.csv",
            now.format(paths::DATE_GROUP_FORMAT)
        ),
        csv,
        record_count: state_logs.len(),
        state_logs,
    })
}

/// Record key plus the concatenated reason/detail pairs from the stored
/// outcome JSON.
fn describe_outcome(log: &StateLogRow) -> (String, String) {
    let outcome: Option<Outcome> = log
        .outcome
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok());
    let Some(outcome) = outcome else {
        return ("<unknown>".to_string(), "no outcome recorded".to_string());
    };

    match outcome.validation_container {
        Some(container) => {
            let issues: Vec<String> = container
                .validation_issues
                .iter()
                .map(|issue| format!("{} ({})", issue.reason, issue.details))
                .collect();
            let description = format!("{}: {}", container.record_key, issues.join("; "));
            (container.record_key, description)
        }
        None => ("<unknown>".to_string(), outcome.message),
    }
}

/// Build, dispatch (primary sink, then fallback when it fails), and on
/// success move every reported employee into the report-sent state and
/// register the report file itself.
pub fn send_claimant_error_report(
    store: &EtlStore,
    registry: &StateRegistry,
    primary: &dyn ReportSink,
    fallback: Option<&dyn ReportSink>,
    import_log_id: ImportLogId,
    now: DateTime<Utc>,
) -> EtlResult<ReportDispatch> {
    let report = build_claimant_error_report(store, registry, now)?;
    if report.record_count == 0 {
        log::info!("claimant error report is empty this run");
    }

    let destination = match primary.dispatch(&report.name, &report.csv) {
        Ok(destination) => destination,
        Err(err) => {
            let Some(fallback) = fallback else {
                return Err(err);
            };
            log::warn!(
                "{} sink failed ({err}), falling back to {}",
                primary.name(),
                fallback.name()
            );
            fallback.dispatch(&report.name, &report.csv)?
        }
    };

    store.begin_group()?;
    let bookkeeping = (|| -> EtlResult<()> {
        store.insert_reference_file(&ReferenceFileRow {
            reference_file_id: Uuid::new_v4().to_string(),
            file_location: destination.clone(),
            reference_file_type_id: ReferenceFileType::ClaimantExtractErrorReport.id(),
        })?;

        let engine = StateLogEngine::new(registry);
        for log in &report.state_logs {
            let Some(employee_id) = log.employee_id.clone() else {
                continue;
            };
            engine.create_finished_state_log(
                store,
                &AssociatedEntity::Employee(employee_id),
                State::ClaimantErrorReportSent,
                &build_outcome("Error report sent", None),
                Some(import_log_id),
                now,
                None,
            )?;
        }
        Ok(())
    })();
    match bookkeeping {
        Ok(()) => store.commit_group()?,
        Err(err) => {
            if let Err(rollback_err) = store.rollback_group() {
                log::error!("rollback failed: {rollback_err}");
            }
            return Err(err);
        }
    }

    log::info!(
        "claimant error report with {} records delivered to {destination}",
        report.record_count
    );
    Ok(ReportDispatch {
        destination,
        record_count: report.record_count,
    })
}
