//! Integration tests for file intake:
//! 1. Complete groups stage into the received area, grouped by date
//! 2. Dated subfolders are discovered alongside flat files
//! 3. A group missing an expected file fails before any copy
//! 4. Duplicate sources for one destination are fatal
//! 5. Too-old and already-terminal groups are never copied

use std::fs;

use pfml_core::blobstore::{BlobStore, FsStore};
use pfml_core::config::PipelineConfig;
use pfml_core::error::EtlError;
use pfml_core::extract::CLAIMANT_EXTRACT_PIPELINE;
use pfml_core::intake::{copy_extract_files_to_archive, group_files_by_date};
use pfml_core::lookups::ReferenceFileType;
use pfml_core::paths;
use pfml_core::store::{EtlStore, ReferenceFileRow};

const GROUP: &str = "2021-01-15-12-00-00";

struct Env {
    _dir: tempfile::TempDir,
    config: PipelineConfig,
    store: EtlStore,
    blob: FsStore,
}

fn build_env() -> Env {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_string_lossy().to_string();
    let config = PipelineConfig {
        source_dir: format!("{root}/source"),
        archive_root: format!("{root}/archive"),
        reports_root: format!("{root}/reports"),
        claimant_extract_max_history_date: None,
        dry_run: false,
    };
    fs::create_dir_all(&config.source_dir).expect("source dir");
    let store = EtlStore::in_memory().expect("store");
    store.migrate().expect("migrate");
    Env {
        _dir: dir,
        config,
        store,
        blob: FsStore::new(),
    }
}

fn write_source(env: &Env, relative: &str, content: &str) {
    let path = format!("{}/{relative}", env.config.source_dir);
    env.blob.upload(&path, content.as_bytes()).expect("write");
}

fn write_complete_group(env: &Env, group: &str) {
    write_source(
        env,
        &format!("{group}-VBI_REQUESTEDABSENCE_SOM.csv"),
        "ABSENCE_CASENUMBER\nNTN-1-ABS-1\n",
    );
    write_source(
        env,
        &format!("{group}-Employee_feed.csv"),
        "CUSTOMERNO,DEFPAYMENTPREF\n100,Y\n",
    );
}

fn run_intake(env: &Env) -> Result<pfml_core::intake::IntakeOutcome, EtlError> {
    copy_extract_files_to_archive(&env.blob, &env.store, &env.config, &CLAIMANT_EXTRACT_PIPELINE)
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: happy path staging
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn complete_group_is_staged_into_received() {
    let env = build_env();
    write_complete_group(&env, GROUP);

    let outcome = run_intake(&env).unwrap();

    assert_eq!(outcome.staged_groups, vec![GROUP.to_string()]);
    assert_eq!(outcome.copied_files.len(), 2);
    let received = paths::received_path(&env.config.archive_root, GROUP);
    let staged = env.blob.list(&received).unwrap();
    assert_eq!(staged.len(), 2);
    assert!(staged
        .iter()
        .any(|p| p.ends_with(&format!("{GROUP}-Employee_feed.csv"))));
}

#[test]
fn dated_subfolders_are_discovered() {
    let env = build_env();
    write_source(
        &env,
        &format!("{GROUP}/VBI_REQUESTEDABSENCE_SOM.csv"),
        "ABSENCE_CASENUMBER\nNTN-1-ABS-1\n",
    );
    write_source(
        &env,
        &format!("{GROUP}/Employee_feed.csv"),
        "CUSTOMERNO,DEFPAYMENTPREF\n100,Y\n",
    );

    let outcome = run_intake(&env).unwrap();

    assert_eq!(outcome.staged_groups, vec![GROUP.to_string()]);
    // Destination filenames are normalized to the prefixed form.
    let received = paths::received_path(&env.config.archive_root, GROUP);
    let staged = env.blob.list(&received).unwrap();
    assert!(staged
        .iter()
        .all(|p| paths::filename_of(p).starts_with(GROUP)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: all-or-nothing groups
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn missing_expected_file_fails_before_any_copy() {
    let env = build_env();
    write_source(
        &env,
        &format!("{GROUP}-VBI_REQUESTEDABSENCE_SOM.csv"),
        "ABSENCE_CASENUMBER\nNTN-1-ABS-1\n",
    );

    let err = run_intake(&env).unwrap_err();

    match err {
        EtlError::MissingFiles { date_group, missing } => {
            assert_eq!(date_group, GROUP);
            assert!(missing.contains("Employee_feed.csv"));
        }
        other => panic!("expected MissingFiles, got {other}"),
    }
    // Nothing copied, no reference file created.
    let received_root = paths::join(&env.config.archive_root, paths::RECEIVED_FOLDER);
    assert!(env.blob.list(&received_root).unwrap().is_empty());
    assert_eq!(env.store.reference_file_count().unwrap(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: duplicate destinations
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn duplicate_sources_for_one_destination_are_fatal() {
    let env = build_env();
    write_complete_group(&env, GROUP);
    // Same logical file again via a dated subfolder.
    write_source(
        &env,
        &format!("{GROUP}/Employee_feed.csv"),
        "CUSTOMERNO,DEFPAYMENTPREF\n200,Y\n",
    );

    let err = run_intake(&env).unwrap_err();

    match err {
        EtlError::DuplicateFile { destination, sources } => {
            assert_eq!(destination, format!("{GROUP}-Employee_feed.csv"));
            assert_eq!(sources.matches(", ").count(), 1, "both sources listed");
        }
        other => panic!("expected DuplicateFile, got {other}"),
    }
    let received_root = paths::join(&env.config.archive_root, paths::RECEIVED_FOLDER);
    assert!(env.blob.list(&received_root).unwrap().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: permanent filters
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn groups_before_the_history_window_are_ignored() {
    let mut env = build_env();
    env.config.claimant_extract_max_history_date =
        Some("2021-01-01".parse().expect("date"));
    write_complete_group(&env, "2020-12-31-23-00-00");
    write_complete_group(&env, GROUP);

    let outcome = run_intake(&env).unwrap();

    assert_eq!(outcome.staged_groups, vec![GROUP.to_string()]);
    assert_eq!(
        outcome.ignored_too_old,
        vec!["2020-12-31-23-00-00".to_string()]
    );
}

#[test]
fn terminal_groups_are_never_copied_again() {
    let env = build_env();
    write_complete_group(&env, GROUP);

    // A prior run left its reference file at the processed location.
    let processed = paths::processed_path(
        &env.config.archive_root,
        ReferenceFileType::FineosClaimantExtract,
        GROUP,
    );
    env.store
        .insert_reference_file(&ReferenceFileRow {
            reference_file_id: "ref-1".to_string(),
            file_location: processed,
            reference_file_type_id: ReferenceFileType::FineosClaimantExtract.id(),
        })
        .unwrap();

    let outcome = run_intake(&env).unwrap();

    assert!(outcome.staged_groups.is_empty());
    assert!(outcome.copied_files.is_empty(), "zero copies on re-run");
    assert_eq!(outcome.ignored_processed, vec![GROUP.to_string()]);
    assert_eq!(env.store.reference_file_count().unwrap(), 1, "no new rows");
}

#[test]
fn skipped_location_also_counts_as_terminal() {
    let env = build_env();
    write_complete_group(&env, GROUP);

    let skipped = paths::skipped_path(
        &env.config.archive_root,
        ReferenceFileType::FineosClaimantExtract,
        GROUP,
    );
    env.store
        .insert_reference_file(&ReferenceFileRow {
            reference_file_id: "ref-1".to_string(),
            file_location: skipped,
            reference_file_type_id: ReferenceFileType::FineosClaimantExtract.id(),
        })
        .unwrap();

    let outcome = run_intake(&env).unwrap();

    assert!(outcome.staged_groups.is_empty());
    assert!(outcome.copied_files.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: date grouping
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn files_group_by_their_timestamp_prefix() {
    let files = vec![
        "a/received/2021-01-15-12-00-00-Employee_feed.csv".to_string(),
        "a/received/2021-01-15-12-00-00-VBI_REQUESTEDABSENCE_SOM.csv".to_string(),
        "a/received/2021-01-16-12-00-00-Employee_feed.csv".to_string(),
        "a/received/not-an-extract.csv".to_string(),
    ];
    let groups = group_files_by_date(&files);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups["2021-01-15-12-00-00"].len(), 2);
    assert_eq!(groups["2021-01-16-12-00-00"].len(), 1);
}
