//! Pipeline configuration: JSON file plus environment overrides.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EtlResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Where the upstream drop-off lives (flat files and dated subfolders).
    pub source_dir: String,
    /// Root of the received/processed/skipped/error archive areas.
    pub archive_root: String,
    /// Where generated audit reports land when the mail sink is down.
    pub reports_root: String,
    /// Date-groups strictly before this date are permanently ignored.
    #[serde(default)]
    pub claimant_extract_max_history_date: Option<NaiveDate>,
    /// Stage and index files but skip reconciliation and file moves.
    #[serde(default)]
    pub dry_run: bool,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> EtlResult<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config.with_env_overrides())
    }

    /// Environment variables win over file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PFML_SOURCE_DIR") {
            self.source_dir = v;
        }
        if let Ok(v) = env::var("PFML_ARCHIVE_ROOT") {
            self.archive_root = v;
        }
        if let Ok(v) = env::var("PFML_REPORTS_ROOT") {
            self.reports_root = v;
        }
        if let Ok(v) = env::var("PFML_CLAIMANT_MAX_HISTORY_DATE") {
            match v.parse::<NaiveDate>() {
                Ok(date) => self.claimant_extract_max_history_date = Some(date),
                Err(err) => log::warn!("ignoring PFML_CLAIMANT_MAX_HISTORY_DATE ({err})"),
            }
        }
        if let Ok(v) = env::var("PFML_DRY_RUN") {
            self.dry_run = v == "1" || v.eq_ignore_ascii_case("true");
        }
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: "./data/fineos".to_string(),
            archive_root: "./data/archive".to_string(),
            reports_root: "./data/reports".to_string(),
            claimant_extract_max_history_date: None,
            dry_run: false,
        }
    }
}
