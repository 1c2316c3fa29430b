//! Integration tests for claimant-extract reconciliation semantics:
//! 1. Address equality is case- and trim-insensitive; equal means no-op
//! 2. Address changes append to history without deleting prior pairs
//! 3. New ACH details create a pending-prenote EFT and an EFT-flow
//!    transition
//! 4. A rejected prenote match surfaces an issue instead of a new row
//! 5. A debit payment preference is flagged, not silently accepted
//! 6. Claims update in place across extract runs (last extract wins)

use chrono::Utc;

use pfml_core::blobstore::{BlobStore, FsStore};
use pfml_core::claimant_extract::{addresses_equal, ClaimantExtractStep};
use pfml_core::config::PipelineConfig;
use pfml_core::extract::CLAIMANT_EXTRACT_PIPELINE;
use pfml_core::flows::{State, StateRegistry};
use pfml_core::intake::copy_extract_files_to_archive;
use pfml_core::lookups::{AbsenceStatus, BankAccountType, PrenoteState};
use pfml_core::statelog::{AssociatedEntity, StateLogEngine};
use pfml_core::step::{run_extract_step, RunSummary, StepContext};
use pfml_core::store::{AddressRow, EmployeeRow, EtlStore, PubEftRow};
use pfml_core::validation::Outcome;

const GROUP: &str = "2021-01-15-12-00-00";

struct Env {
    _dir: tempfile::TempDir,
    config: PipelineConfig,
    store: EtlStore,
    blob: FsStore,
    registry: StateRegistry,
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
    std::fs::create_dir_all(&config.source_dir).expect("source dir");
    let store = EtlStore::in_memory().expect("store");
    store.migrate().expect("migrate");
    Env {
        _dir: dir,
        config,
        store,
        blob: FsStore::new(),
        registry: StateRegistry::init().expect("registry"),
    }
}

fn seed_employee(env: &Env) {
    env.store
        .insert_employee(&EmployeeRow {
            employee_id: "emp-1".to_string(),
            tax_identifier: "100000001".to_string(),
            first_name: None,
            last_name: None,
            date_of_birth: None,
            fineos_customer_number: None,
            current_address_pair_id: None,
        })
        .expect("seed employee");
}

fn seed_current_address(env: &Env) {
    env.store
        .insert_address(&AddressRow {
            address_id: "addr-1".to_string(),
            address_line_one: Some("1234 Main St".to_string()),
            address_line_two: Some(String::new()),
            city: Some("Boston".to_string()),
            zip_code: Some("02110".to_string()),
            geo_state: Some("MA".to_string()),
            country: Some("USA".to_string()),
        })
        .expect("seed address");
    env.store
        .insert_address_pair("pair-1", "emp-1", "addr-1")
        .expect("seed pair");
    let mut employee = env.store.get_employee("emp-1").unwrap().unwrap();
    employee.current_address_pair_id = Some("pair-1".to_string());
    env.store.update_employee(&employee).expect("set pair");
}

/// Write a group whose feed row carries the given payment fields and
/// address, then run intake + the extract step.
fn run_with_feed_row(env: &Env, group: &str, absence_row: &str, feed_row: &str) -> RunSummary {
    let absence = format!(
        "ABSENCE_CASENUMBER,NOTIFICATION_CASENUMBER,ABSENCE_CASESTATUS,\
ABSENCEREASON_COVERAGE,ABSENCEPERIOD_START,ABSENCEPERIOD_END,EMPLOYEE_CUSTOMERNO,\
LEAVEREQUEST_EVIDENCERESULTTYPE\n{absence_row}\n"
    );
    let feed = format!(
        "CUSTOMERNO,NATINSNO,DATEOFBIRTH,FIRSTNAMES,LASTNAME,DEFPAYMENTPREF,\
PAYMENTMETHOD,ADDRESS1,ADDRESS2,ADDRESS4,ADDRESS6,POSTCODE,SORTCODE,ACCOUNTNO,\
ACCOUNTTYPE\n{feed_row}\n"
    );
    env.blob
        .upload(
            &format!(
                "{}/{group}-VBI_REQUESTEDABSENCE_SOM.csv",
                env.config.source_dir
            ),
            absence.as_bytes(),
        )
        .expect("absence file");
    env.blob
        .upload(
            &format!("{}/{group}-Employee_feed.csv", env.config.source_dir),
            feed.as_bytes(),
        )
        .expect("feed file");

    copy_extract_files_to_archive(&env.blob, &env.store, &env.config, &CLAIMANT_EXTRACT_PIPELINE)
        .expect("intake");
    let import_log_id = env
        .store
        .create_import_log("claimant-extract", Utc::now())
        .expect("import log");
    let ctx = StepContext {
        store: &env.store,
        blob: &env.blob,
        registry: &env.registry,
        config: &env.config,
        import_log_id,
        now: Utc::now(),
    };
    let mut step = ClaimantExtractStep;
    run_extract_step(&mut step, &ctx).expect("step run")
}

const DEFAULT_ABSENCE_ROW: &str =
    "NTN-1-ABS-1,NTN-1,Approved,Family,2021-01-01 00:00:00,2021-04-01 00:00:00,1000,Satisfied";

fn latest_claimant_state(env: &Env, state: State) -> Option<Outcome> {
    let engine = StateLogEngine::new(&env.registry);
    engine
        .get_latest_state_log_in_end_state(
            &env.store,
            &AssociatedEntity::Employee("emp-1".to_string()),
            state,
        )
        .unwrap()
        .and_then(|row| row.outcome)
        .and_then(|raw| serde_json::from_str(&raw).ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: address no-op equality
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn equivalent_address_is_a_no_op() {
    let env = build_env();
    seed_employee(&env);
    seed_current_address(&env);

    // Same address modulo case, padding, and a missing line two.
    run_with_feed_row(
        &env,
        GROUP,
        DEFAULT_ABSENCE_ROW,
        "1000,100000001,1980-02-14 00:00:00,Jane,Doe,Y,Check,1234 MAIN ST  ,, BOSTON,MA,02110,,,",
    );

    assert_eq!(env.store.address_pair_count("emp-1").unwrap(), 1);
    let employee = env.store.get_employee("emp-1").unwrap().unwrap();
    assert_eq!(employee.current_address_pair_id.as_deref(), Some("pair-1"));
}

#[test]
fn address_equality_helper_matches_the_contract() {
    let existing = AddressRow {
        address_id: "a".to_string(),
        address_line_one: Some("1234 Main St".to_string()),
        address_line_two: Some(String::new()),
        city: Some("Boston".to_string()),
        zip_code: Some("02110".to_string()),
        geo_state: Some("MA".to_string()),
        country: Some("USA".to_string()),
    };
    let candidate = AddressRow {
        address_id: "b".to_string(),
        address_line_one: Some("1234 MAIN ST  ".to_string()),
        address_line_two: None,
        city: Some(" BOSTON".to_string()),
        zip_code: Some("02110".to_string()),
        geo_state: Some("MA".to_string()),
        country: Some("USA".to_string()),
    };
    assert!(addresses_equal(&existing, &candidate));

    let mut moved = candidate.clone();
    moved.city = Some("Worcester".to_string());
    assert!(!addresses_equal(&existing, &moved));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: address change appends history
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn changed_address_appends_a_new_pair_and_keeps_history() {
    let env = build_env();
    seed_employee(&env);
    seed_current_address(&env);

    run_with_feed_row(
        &env,
        GROUP,
        DEFAULT_ABSENCE_ROW,
        "1000,100000001,1980-02-14 00:00:00,Jane,Doe,Y,Check,77 Beacon St,,Boston,MA,02108,,,",
    );

    assert_eq!(
        env.store.address_pair_count("emp-1").unwrap(),
        2,
        "history is append-only"
    );
    let current = env
        .store
        .current_address_for_employee("emp-1")
        .unwrap()
        .unwrap();
    assert_eq!(current.address_line_one.as_deref(), Some("77 Beacon St"));
    assert_eq!(current.zip_code.as_deref(), Some("02108"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: new ACH details start the prenote lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn new_ach_details_create_pending_prenote_eft() {
    let env = build_env();
    seed_employee(&env);

    run_with_feed_row(
        &env,
        GROUP,
        DEFAULT_ABSENCE_ROW,
        "1000,100000001,1980-02-14 00:00:00,Jane,Doe,Y,Elec Funds Transfer,\
1234 Main St,,Boston,MA,02110,123456789,000111222,Checking",
    );

    let efts = env.store.get_employee_efts("emp-1").unwrap();
    assert_eq!(efts.len(), 1);
    assert_eq!(efts[0].routing_nbr, "123456789");
    assert_eq!(efts[0].account_nbr, "000111222");
    assert_eq!(efts[0].bank_account_type_id, BankAccountType::Checking.id());
    assert_eq!(
        efts[0].prenote_state_id,
        PrenoteState::PendingPrePub.id(),
        "new EFT info always enters pending-pre-pub"
    );

    // The employee entered the EFT flow's initiation state, and the
    // claimant flow still shows a clean extraction.
    let engine = StateLogEngine::new(&env.registry);
    assert!(engine
        .get_latest_state_log_in_end_state(
            &env.store,
            &AssociatedEntity::Employee("emp-1".to_string()),
            State::EftRequestReceived,
        )
        .unwrap()
        .is_some());
    assert!(latest_claimant_state(&env, State::ClaimantExtracted).is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: rejected prenote never silently reused
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn rejected_prenote_match_surfaces_issue_without_new_row() {
    let env = build_env();
    seed_employee(&env);
    env.store
        .insert_pub_eft(&PubEftRow {
            pub_eft_id: "eft-1".to_string(),
            routing_nbr: "123456789".to_string(),
            account_nbr: "000111222".to_string(),
            bank_account_type_id: BankAccountType::Checking.id(),
            prenote_state_id: PrenoteState::Rejected.id(),
            prenote_sent_at: None,
        })
        .unwrap();
    env.store.link_employee_pub_eft("emp-1", "eft-1").unwrap();

    run_with_feed_row(
        &env,
        GROUP,
        DEFAULT_ABSENCE_ROW,
        "1000,100000001,1980-02-14 00:00:00,Jane,Doe,Y,Elec Funds Transfer,\
1234 Main St,,Boston,MA,02110,123456789,000111222,Checking",
    );

    assert_eq!(env.store.pub_eft_count().unwrap(), 1, "no second EFT row");

    let outcome =
        latest_claimant_state(&env, State::ClaimantAddToErrorReport).expect("record flagged");
    let container = outcome.validation_container.unwrap();
    assert!(container
        .validation_issues
        .iter()
        .any(|i| i.reason == pfml_core::validation::ValidationReason::EftPrenoteRejected));
}

#[test]
fn approved_prenote_match_is_a_silent_no_op() {
    let env = build_env();
    seed_employee(&env);
    env.store
        .insert_pub_eft(&PubEftRow {
            pub_eft_id: "eft-1".to_string(),
            routing_nbr: "123456789".to_string(),
            account_nbr: "000111222".to_string(),
            bank_account_type_id: BankAccountType::Checking.id(),
            prenote_state_id: PrenoteState::Approved.id(),
            prenote_sent_at: None,
        })
        .unwrap();
    env.store.link_employee_pub_eft("emp-1", "eft-1").unwrap();

    run_with_feed_row(
        &env,
        GROUP,
        DEFAULT_ABSENCE_ROW,
        "1000,100000001,1980-02-14 00:00:00,Jane,Doe,Y,Elec Funds Transfer,\
1234 Main St,,Boston,MA,02110,123456789,000111222,Checking",
    );

    assert_eq!(env.store.pub_eft_count().unwrap(), 1);
    assert!(latest_claimant_state(&env, State::ClaimantExtracted).is_some());
}

#[test]
fn prenote_lifecycle_transitions_are_recorded_on_the_eft_row() {
    let env = build_env();
    seed_employee(&env);

    run_with_feed_row(
        &env,
        GROUP,
        DEFAULT_ABSENCE_ROW,
        "1000,100000001,1980-02-14 00:00:00,Jane,Doe,Y,Elec Funds Transfer,\
1234 Main St,,Boston,MA,02110,123456789,000111222,Checking",
    );

    // The prenote-response job later approves the details.
    let efts = env.store.get_employee_efts("emp-1").unwrap();
    let sent_at = Utc::now();
    env.store
        .update_prenote_state(&efts[0].pub_eft_id, PrenoteState::Approved, Some(sent_at))
        .unwrap();

    let refreshed = env.store.get_employee_efts("emp-1").unwrap();
    assert_eq!(refreshed[0].prenote_state_id, PrenoteState::Approved.id());
    assert!(refreshed[0].prenote_sent_at.is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: unusable payment method
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn debit_preference_is_flagged_not_accepted() {
    let env = build_env();
    seed_employee(&env);

    run_with_feed_row(
        &env,
        GROUP,
        DEFAULT_ABSENCE_ROW,
        "1000,100000001,1980-02-14 00:00:00,Jane,Doe,Y,Debit,\
1234 Main St,,Boston,MA,02110,,,",
    );

    assert_eq!(env.store.pub_eft_count().unwrap(), 0);
    let outcome =
        latest_claimant_state(&env, State::ClaimantAddToErrorReport).expect("record flagged");
    let container = outcome.validation_container.unwrap();
    assert!(container
        .validation_issues
        .iter()
        .any(|i| i.reason == pfml_core::validation::ValidationReason::ValueNotSupported));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 6: last extract wins across runs
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn claim_updates_in_place_across_extract_runs() {
    let env = build_env();
    seed_employee(&env);

    run_with_feed_row(
        &env,
        "2021-01-14-12-00-00",
        "NTN-1-ABS-1,NTN-1,Adjudication,Family,2021-01-01 00:00:00,2021-04-01 00:00:00,1000,",
        "1000,100000001,1980-02-14 00:00:00,Jane,Doe,Y,Check,1234 Main St,,Boston,MA,02110,,,",
    );
    let first = env
        .store
        .get_claim_by_absence_id("NTN-1-ABS-1")
        .unwrap()
        .unwrap();
    assert_eq!(
        first.fineos_absence_status_id,
        Some(AbsenceStatus::Adjudication.id())
    );
    assert!(!first.is_id_proofed);

    // The next day's cumulative extract reports the claim approved.
    run_with_feed_row(
        &env,
        GROUP,
        DEFAULT_ABSENCE_ROW,
        "1000,100000001,1980-02-14 00:00:00,Jane,Doe,Y,Check,1234 Main St,,Boston,MA,02110,,,",
    );

    assert_eq!(env.store.claim_count().unwrap(), 1, "updated, not duplicated");
    let second = env
        .store
        .get_claim_by_absence_id("NTN-1-ABS-1")
        .unwrap()
        .unwrap();
    assert_eq!(second.claim_id, first.claim_id);
    assert_eq!(
        second.fineos_absence_status_id,
        Some(AbsenceStatus::Approved.id())
    );
    assert!(second.is_id_proofed);

    // The second run chains onto the first in the claimant flow.
    let engine = StateLogEngine::new(&env.registry);
    let latest = engine
        .get_latest_state_log_in_end_state(
            &env.store,
            &AssociatedEntity::Employee("emp-1".to_string()),
            State::ClaimantExtracted,
        )
        .unwrap()
        .unwrap();
    assert_eq!(
        latest.start_state_id,
        Some(State::ClaimantExtracted.id()),
        "second sighting inherits the first run's end state"
    );
    assert!(latest.prev_state_log_id.is_some());
}
