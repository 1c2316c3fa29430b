//! Claimant extract reconciliation.
//!
//! Joins the requested-absence file to the employee feed by customer
//! number and merges each joined record into claims, employees, address
//! history, and EFT details.
//!
//! RULES:
//!   - Validation is accumulate-then-decide: field failures collect in
//!     the record's ValidationContainer and processing continues.
//!   - Employees are never created here. A record whose employee cannot
//!     be resolved is dropped with no DB trace at all — its claim is
//!     discarded unpersisted.
//!   - Within a group: claim before employee before EFT before state log.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::EtlResult;
use crate::extract::{Extract, ExtractData, ExtractPipeline, CLAIMANT_EXTRACT_PIPELINE};
use crate::extract::{EMPLOYEE_FEED, REQUESTED_ABSENCE_SOM};
use crate::flows::State;
use crate::lookups::{AbsenceStatus, BankAccountType, ClaimType, PaymentMethod, PrenoteState};
use crate::statelog::{AssociatedEntity, StateLogEngine};
use crate::step::{Step, StepContext, StepReport};
use crate::store::{AddressRow, ClaimRow, EmployeeRow, PubEftRow};
use crate::validation::{
    build_outcome, lookup_validator, validate_csv_input, ValidationContainer, ValidationReason,
};

const EVIDENCE_SATISFIED: &str = "Satisfied";
const ROUTING_NUMBER_LENGTH: usize = 9;
const ACCOUNT_NUMBER_MAX_LENGTH: usize = 40;

const VALID_ABSENCE_STATUSES: &[&str] = &[
    "Adjudication",
    "In Review",
    "Approved",
    "Declined",
    "Closed",
    "Completed",
    "Intake In Progress",
];
const VALID_CLAIM_TYPES: &[&str] = &["Family", "Employee", "Military"];
const VALID_PAYMENT_METHODS: &[&str] = &["Check", "Elec Funds Transfer", "Debit"];
// Debit cards exist as a payment method but are unusable for claimant EFT.
const UNSUPPORTED_PAYMENT_METHODS: &[&str] = &["Debit"];
const VALID_ACCOUNT_TYPES: &[&str] = &["Savings", "Checking"];

pub struct ClaimantExtractStep;

impl Step for ClaimantExtractStep {
    fn name(&self) -> &'static str {
        "claimant-extract"
    }

    fn pipeline(&self) -> &'static ExtractPipeline {
        &CLAIMANT_EXTRACT_PIPELINE
    }

    fn process_date_group(
        &mut self,
        ctx: &StepContext<'_>,
        data: &ExtractData,
    ) -> EtlResult<StepReport> {
        let absences = expect_extract(data, REQUESTED_ABSENCE_SOM)?;
        let feed = expect_extract(data, EMPLOYEE_FEED)?;

        let mut report = StepReport::default();
        let mut case_numbers: Vec<&String> = absences.indexed_data.keys().collect();
        case_numbers.sort();

        for case_number in case_numbers {
            let absence_row = &absences.indexed_data[case_number];
            match process_record(ctx, data, case_number, absence_row, feed)? {
                RecordResult::Extracted => report.records_processed += 1,
                RecordResult::Flagged => report.records_flagged += 1,
                RecordResult::Skipped(reason) => {
                    log::error!("record {case_number} dropped with no DB trace: {reason}");
                    report.records_skipped += 1;
                }
            }
        }
        Ok(report)
    }
}

/// What happened to one joined record. Skips are deliberate drops, kept
/// distinct from bugs by naming their reason.
enum RecordResult {
    Extracted,
    Flagged,
    Skipped(SkipReason),
}

enum SkipReason {
    MissingCustomerNumber,
    MissingFeedRecord(String),
    MissingTaxIdentifier(String),
    EmployeeNotFound(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCustomerNumber => write!(f, "no employee customer number on absence row"),
            Self::MissingFeedRecord(customer) => {
                write!(f, "customer {customer} absent from employee feed")
            }
            Self::MissingTaxIdentifier(customer) => {
                write!(f, "feed row for customer {customer} has no tax identifier")
            }
            Self::EmployeeNotFound(customer) => {
                write!(f, "no employee matches the tax identifier for customer {customer}")
            }
        }
    }
}

fn process_record(
    ctx: &StepContext<'_>,
    data: &ExtractData,
    case_number: &str,
    absence_row: &std::collections::HashMap<String, String>,
    feed: &Extract,
) -> EtlResult<RecordResult> {
    let mut container = ValidationContainer::new(case_number);

    // Build the claim first; its persistence waits on the employee side.
    let existing_claim = ctx.store.get_claim_by_absence_id(case_number)?;
    let claim_is_new = existing_claim.is_none();
    let mut claim = existing_claim.unwrap_or_else(|| ClaimRow {
        claim_id: Uuid::new_v4().to_string(),
        employee_id: None,
        fineos_absence_id: case_number.to_string(),
        fineos_notification_id: None,
        claim_type_id: None,
        fineos_absence_status_id: None,
        absence_period_start_date: None,
        absence_period_end_date: None,
        is_id_proofed: false,
    });
    apply_absence_fields(absence_row, &mut claim, &mut container);

    // Resolve the employee; without one the whole record is dropped.
    let customer_number = match validate_csv_input(
        "EMPLOYEE_CUSTOMERNO",
        absence_row,
        &mut container,
        true,
        None,
        None,
        None,
    ) {
        Some(value) => value,
        None => return Ok(RecordResult::Skipped(SkipReason::MissingCustomerNumber)),
    };
    let Some(feed_row) = feed.indexed_data.get(&customer_number) else {
        return Ok(RecordResult::Skipped(SkipReason::MissingFeedRecord(
            customer_number,
        )));
    };
    let Some(tax_identifier) =
        validate_csv_input("NATINSNO", feed_row, &mut container, true, None, None, None)
    else {
        return Ok(RecordResult::Skipped(SkipReason::MissingTaxIdentifier(
            customer_number,
        )));
    };
    let Some(mut employee) = ctx.store.get_employee_by_tax_identifier(&tax_identifier)? else {
        return Ok(RecordResult::Skipped(SkipReason::EmployeeNotFound(
            customer_number,
        )));
    };

    // Employee resolved: the claim may persist now.
    claim.employee_id = Some(employee.employee_id.clone());
    if claim_is_new {
        ctx.store.insert_claim(&claim)?;
    } else {
        ctx.store.update_claim(&claim)?;
    }

    apply_employee_fields(feed_row, &mut employee, &customer_number, &mut container);
    reconcile_address(ctx, feed_row, &mut employee, &mut container)?;
    ctx.store.update_employee(&employee)?;
    reconcile_eft(ctx, feed_row, &employee, &mut container)?;

    // Linkage bookkeeping and the claimant-flow transition happen once
    // per employee per reference file; later sightings in the same run
    // are deliberate no-ops.
    if ctx
        .store
        .employee_reference_file_exists(&employee.employee_id, &data.reference_file_id)?
    {
        log::info!(
            "employee for case {case_number} already linked to this extract, skipping bookkeeping"
        );
    } else {
        ctx.store
            .insert_employee_reference_file(&employee.employee_id, &data.reference_file_id)?;

        let engine = StateLogEngine::new(ctx.registry);
        let (end_state, message) = if container.has_validation_issues() {
            (
                State::ClaimantAddToErrorReport,
                "Claimant has validation issues",
            )
        } else {
            (State::ClaimantExtracted, "Claimant extracted from FINEOS")
        };
        engine.create_finished_state_log(
            ctx.store,
            &AssociatedEntity::Employee(employee.employee_id.clone()),
            end_state,
            &build_outcome(message, Some(&container)),
            Some(ctx.import_log_id),
            ctx.now,
            None,
        )?;
    }

    if container.has_validation_issues() {
        Ok(RecordResult::Flagged)
    } else {
        Ok(RecordResult::Extracted)
    }
}

// ── Claim fields ─────────────────────────────────────────────────────────────

fn apply_absence_fields(
    row: &std::collections::HashMap<String, String>,
    claim: &mut ClaimRow,
    container: &mut ValidationContainer,
) {
    if let Some(notification_id) = validate_csv_input(
        "NOTIFICATION_CASENUMBER",
        row,
        container,
        true,
        None,
        None,
        None,
    ) {
        claim.fineos_notification_id = Some(notification_id);
    }

    let status_validator = lookup_validator(VALID_ABSENCE_STATUSES, &[]);
    if let Some(status) = validate_csv_input(
        "ABSENCE_CASESTATUS",
        row,
        container,
        true,
        None,
        None,
        Some(&status_validator),
    ) {
        claim.fineos_absence_status_id = AbsenceStatus::from_description(&status).map(|s| s.id());
    }

    let claim_type_validator = lookup_validator(VALID_CLAIM_TYPES, &[]);
    if let Some(coverage) = validate_csv_input(
        "ABSENCEREASON_COVERAGE",
        row,
        container,
        true,
        None,
        None,
        Some(&claim_type_validator),
    ) {
        claim.claim_type_id = ClaimType::from_description(&coverage).map(|c| c.id());
    }

    claim.absence_period_start_date =
        validated_date("ABSENCEPERIOD_START", row, container).or(claim.absence_period_start_date);
    claim.absence_period_end_date =
        validated_date("ABSENCEPERIOD_END", row, container).or(claim.absence_period_end_date);

    let evidence = validate_csv_input(
        "LEAVEREQUEST_EVIDENCERESULTTYPE",
        row,
        container,
        false,
        None,
        None,
        None,
    );
    claim.is_id_proofed = evidence.as_deref() == Some(EVIDENCE_SATISFIED);
}

fn validated_date(
    key: &str,
    row: &std::collections::HashMap<String, String>,
    container: &mut ValidationContainer,
) -> Option<NaiveDate> {
    let raw = validate_csv_input(key, row, container, true, None, None, None)?;
    match parse_extract_date(&raw) {
        Some(date) => Some(date),
        None => {
            container.add_validation_issue(ValidationReason::InvalidValue, format!("{key}: {raw}"));
            None
        }
    }
}

/// FINEOS writes dates as either "2021-02-01 00:00:00" or "2021-02-01".
fn parse_extract_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(ts) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.date());
    }
    raw.parse::<NaiveDate>().ok()
}

// ── Employee fields ──────────────────────────────────────────────────────────

fn apply_employee_fields(
    feed_row: &std::collections::HashMap<String, String>,
    employee: &mut EmployeeRow,
    customer_number: &str,
    container: &mut ValidationContainer,
) {
    if let Some(dob) = validate_csv_input("DATEOFBIRTH", feed_row, container, false, None, None, None)
    {
        match parse_extract_date(&dob) {
            Some(date) => employee.date_of_birth = Some(date),
            None => container
                .add_validation_issue(ValidationReason::InvalidValue, format!("DATEOFBIRTH: {dob}")),
        }
    }
    if let Some(first) =
        validate_csv_input("FIRSTNAMES", feed_row, container, false, None, None, None)
    {
        employee.first_name = Some(first);
    }
    if let Some(last) = validate_csv_input("LASTNAME", feed_row, container, false, None, None, None)
    {
        employee.last_name = Some(last);
    }
    employee.fineos_customer_number = Some(customer_number.to_string());
}

// ── Address ──────────────────────────────────────────────────────────────────

fn reconcile_address(
    ctx: &StepContext<'_>,
    feed_row: &std::collections::HashMap<String, String>,
    employee: &mut EmployeeRow,
    container: &mut ValidationContainer,
) -> EtlResult<()> {
    let line_one = validate_csv_input("ADDRESS1", feed_row, container, true, None, None, None);
    let city = validate_csv_input("ADDRESS4", feed_row, container, true, None, None, None);
    let geo_state = validate_csv_input("ADDRESS6", feed_row, container, true, None, None, None);
    let zip_code = validate_csv_input("POSTCODE", feed_row, container, true, None, None, None);
    let line_two = validate_csv_input("ADDRESS2", feed_row, container, false, None, None, None);

    let (Some(line_one), Some(city), Some(geo_state), Some(zip_code)) =
        (line_one, city, geo_state, zip_code)
    else {
        // Required pieces missing; issues are already recorded.
        return Ok(());
    };

    let candidate = AddressRow {
        address_id: Uuid::new_v4().to_string(),
        address_line_one: Some(line_one),
        address_line_two: line_two,
        city: Some(city),
        zip_code: Some(zip_code),
        geo_state: Some(geo_state),
        country: Some("USA".to_string()),
    };

    if let Some(current) = ctx.store.current_address_for_employee(&employee.employee_id)? {
        if addresses_equal(&current, &candidate) {
            return Ok(());
        }
    }

    // Changed or first-ever address: append, never overwrite history.
    ctx.store.insert_address(&candidate)?;
    let pair_id = Uuid::new_v4().to_string();
    ctx.store
        .insert_address_pair(&pair_id, &employee.employee_id, &candidate.address_id)?;
    employee.current_address_pair_id = Some(pair_id);
    Ok(())
}

/// Field-by-field equality, case-insensitive and trim-insensitive;
/// a missing field equals an empty one.
pub fn addresses_equal(a: &AddressRow, b: &AddressRow) -> bool {
    fn norm(value: &Option<String>) -> String {
        value.as_deref().unwrap_or("").trim().to_lowercase()
    }
    norm(&a.address_line_one) == norm(&b.address_line_one)
        && norm(&a.address_line_two) == norm(&b.address_line_two)
        && norm(&a.city) == norm(&b.city)
        && norm(&a.zip_code) == norm(&b.zip_code)
        && norm(&a.geo_state) == norm(&b.geo_state)
        && norm(&a.country) == norm(&b.country)
}

// ── EFT ──────────────────────────────────────────────────────────────────────

fn reconcile_eft(
    ctx: &StepContext<'_>,
    feed_row: &std::collections::HashMap<String, String>,
    employee: &EmployeeRow,
    container: &mut ValidationContainer,
) -> EtlResult<()> {
    let method_validator = lookup_validator(VALID_PAYMENT_METHODS, UNSUPPORTED_PAYMENT_METHODS);
    let method = validate_csv_input(
        "PAYMENTMETHOD",
        feed_row,
        container,
        true,
        None,
        None,
        Some(&method_validator),
    );
    if method.as_deref() != Some(PaymentMethod::Ach.description()) {
        return Ok(());
    }

    let digits = |value: &str| {
        if value.chars().all(|c| c.is_ascii_digit()) {
            None
        } else {
            Some(ValidationReason::InvalidValue)
        }
    };
    let routing = validate_csv_input(
        "SORTCODE",
        feed_row,
        container,
        true,
        Some(ROUTING_NUMBER_LENGTH),
        Some(ROUTING_NUMBER_LENGTH),
        Some(&digits),
    );
    let account = validate_csv_input(
        "ACCOUNTNO",
        feed_row,
        container,
        true,
        None,
        Some(ACCOUNT_NUMBER_MAX_LENGTH),
        None,
    );
    let type_validator = lookup_validator(VALID_ACCOUNT_TYPES, &[]);
    let account_type = validate_csv_input(
        "ACCOUNTTYPE",
        feed_row,
        container,
        true,
        None,
        None,
        Some(&type_validator),
    )
    .and_then(|t| BankAccountType::from_description(&t));

    let (Some(routing), Some(account), Some(account_type)) = (routing, account, account_type)
    else {
        return Ok(());
    };

    // Exact-field match against the employee's existing EFT records.
    let existing = ctx.store.get_employee_efts(&employee.employee_id)?;
    if let Some(matched) = existing.iter().find(|eft| {
        eft.routing_nbr == routing
            && eft.account_nbr == account
            && eft.bank_account_type_id == account_type.id()
    }) {
        if matched.prenote_state_id == PrenoteState::Rejected.id() {
            // Never silently reuse rejected banking details.
            container.add_validation_issue(
                ValidationReason::EftPrenoteRejected,
                format!("SORTCODE: {routing}"),
            );
        }
        return Ok(());
    }

    let eft = PubEftRow {
        pub_eft_id: Uuid::new_v4().to_string(),
        routing_nbr: routing,
        account_nbr: account,
        bank_account_type_id: account_type.id(),
        prenote_state_id: PrenoteState::PendingPrePub.id(),
        prenote_sent_at: None,
    };
    ctx.store.insert_pub_eft(&eft)?;
    ctx.store
        .link_employee_pub_eft(&employee.employee_id, &eft.pub_eft_id)?;

    let engine = StateLogEngine::new(ctx.registry);
    engine.create_finished_state_log(
        ctx.store,
        &AssociatedEntity::Employee(employee.employee_id.clone()),
        State::EftRequestReceived,
        &build_outcome("EFT information requires prenote", None),
        Some(ctx.import_log_id),
        ctx.now,
        None,
    )?;
    Ok(())
}

fn expect_extract<'a>(data: &'a ExtractData, logical_name: &str) -> EtlResult<&'a Extract> {
    data.extract(logical_name).ok_or_else(|| {
        crate::error::EtlError::Other(anyhow::anyhow!(
            "extract {logical_name} missing from indexed date-group"
        ))
    })
}
