//! Archive path and date-group utilities. Pure functions only.
//!
//! Layout: `<archive_root>/<status>/<group folder>/<timestamp>-<Name>.csv`
//! where status is one of received/processed/skipped/error. Processed and
//! skipped group folders carry a pipeline suffix derived from the
//! reference-file-type description so pipelines sharing a status folder
//! stay disambiguated.

use chrono::NaiveDateTime;

use crate::lookups::ReferenceFileType;
use crate::types::DateGroup;

pub const RECEIVED_FOLDER: &str = "received";
pub const PROCESSED_FOLDER: &str = "processed";
pub const SKIPPED_FOLDER: &str = "skipped";
pub const ERROR_FOLDER: &str = "error";

/// Timestamp prefix format shared by every extract filename.
pub const DATE_GROUP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

const DATE_GROUP_LEN: usize = 19; // "2021-01-15-12-00-00"

/// Extract the canonical date-group token from a filename like
/// `2021-01-15-12-00-00-Employee_feed.csv`. Returns None when the prefix
/// is not a valid timestamp.
pub fn date_group_from_filename(filename: &str) -> Option<DateGroup> {
    let prefix = filename.get(..DATE_GROUP_LEN)?;
    date_group_timestamp(prefix).map(|_| prefix.to_string())
}

/// Parse a date-group token back into its timestamp.
pub fn date_group_timestamp(date_group: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(date_group, DATE_GROUP_FORMAT).ok()
}

/// Last path component.
pub fn filename_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn join(base: &str, rest: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rest)
}

/// Lower-cased, hyphenated folder name for a pipeline, derived from its
/// reference-file-type description ("FINEOS Claimant Extract" →
/// "fineos-claimant-extract").
pub fn pipeline_folder(file_type: ReferenceFileType) -> String {
    file_type.description().to_lowercase().replace(' ', "-")
}

/// Staging area for one date-group's received files.
pub fn received_path(archive_root: &str, date_group: &str) -> String {
    format!(
        "{}/{}/{}",
        archive_root.trim_end_matches('/'),
        RECEIVED_FOLDER,
        date_group
    )
}

/// Terminal location for a successfully processed date-group.
pub fn processed_path(
    archive_root: &str,
    file_type: ReferenceFileType,
    date_group: &str,
) -> String {
    format!(
        "{}/{}/{}-{}",
        archive_root.trim_end_matches('/'),
        PROCESSED_FOLDER,
        date_group,
        pipeline_folder(file_type)
    )
}

/// Terminal location for a superseded (never transformed) date-group.
pub fn skipped_path(archive_root: &str, file_type: ReferenceFileType, date_group: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        archive_root.trim_end_matches('/'),
        SKIPPED_FOLDER,
        date_group,
        pipeline_folder(file_type)
    )
}

/// Location for a date-group whose transformation failed.
pub fn error_path(archive_root: &str, date_group: &str) -> String {
    format!(
        "{}/{}/{}",
        archive_root.trim_end_matches('/'),
        ERROR_FOLDER,
        date_group
    )
}
