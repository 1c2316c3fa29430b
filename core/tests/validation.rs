//! Integration tests for the validation primitives:
//! 1. Field validator required/length/custom behavior
//! 2. Absent-value handling (empty string and the "Unknown" literal)
//! 3. Failed checks never return the parsed value
//! 4. Outcome JSON shape and round-trip

use std::collections::HashMap;

use pfml_core::validation::{
    build_outcome, lookup_validator, validate_csv_input, Outcome, ValidationContainer,
    ValidationReason,
};

fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Field validator
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn too_short_routing_number_records_issue_and_returns_none() {
    let mut container = ValidationContainer::new("rec");
    let result = validate_csv_input(
        "SORTCODE",
        &row(&[("SORTCODE", "12345678")]),
        &mut container,
        true,
        Some(9),
        Some(9),
        None,
    );

    assert_eq!(result, None);
    assert_eq!(container.validation_issues.len(), 1);
    assert_eq!(
        container.validation_issues[0].reason,
        ValidationReason::FieldTooShort
    );
    assert_eq!(container.validation_issues[0].details, "SORTCODE: 12345678");
}

#[test]
fn missing_required_field_records_missing_field() {
    let mut container = ValidationContainer::new("rec");
    let result = validate_csv_input("NATINSNO", &row(&[]), &mut container, true, None, None, None);

    assert_eq!(result, None);
    assert_eq!(container.validation_issues.len(), 1);
    assert_eq!(
        container.validation_issues[0].reason,
        ValidationReason::MissingField
    );
    assert_eq!(container.validation_issues[0].details, "NATINSNO");
}

#[test]
fn unknown_literal_counts_as_absent() {
    let mut container = ValidationContainer::new("rec");
    let result = validate_csv_input(
        "DATEOFBIRTH",
        &row(&[("DATEOFBIRTH", "Unknown")]),
        &mut container,
        true,
        None,
        None,
        None,
    );

    assert_eq!(result, None);
    assert_eq!(
        container.validation_issues[0].reason,
        ValidationReason::MissingField
    );
}

#[test]
fn absent_optional_field_is_silent() {
    let mut container = ValidationContainer::new("rec");
    let result = validate_csv_input("ADDRESS2", &row(&[]), &mut container, false, None, None, None);

    assert_eq!(result, None);
    assert!(!container.has_validation_issues());
}

#[test]
fn too_long_value_is_withheld_from_caller() {
    // A merely-too-long value is still not returned; the caller must
    // treat the field as absent.
    let mut container = ValidationContainer::new("rec");
    let long = "9".repeat(41);
    let result = validate_csv_input(
        "ACCOUNTNO",
        &row(&[("ACCOUNTNO", &long)]),
        &mut container,
        true,
        None,
        Some(40),
        None,
    );

    assert_eq!(result, None);
    assert_eq!(
        container.validation_issues[0].reason,
        ValidationReason::FieldTooLong
    );
    assert_eq!(
        container.validation_issues[0].details,
        format!("ACCOUNTNO: {long}")
    );
}

#[test]
fn valid_value_is_returned_with_no_issues() {
    let mut container = ValidationContainer::new("rec");
    let result = validate_csv_input(
        "SORTCODE",
        &row(&[("SORTCODE", "123456789")]),
        &mut container,
        true,
        Some(9),
        Some(9),
        None,
    );

    assert_eq!(result, Some("123456789".to_string()));
    assert!(!container.has_validation_issues());
}

#[test]
fn multiple_checks_can_fail_independently() {
    let digits = |value: &str| {
        if value.chars().all(|c| c.is_ascii_digit()) {
            None
        } else {
            Some(ValidationReason::InvalidValue)
        }
    };
    let mut container = ValidationContainer::new("rec");
    let result = validate_csv_input(
        "SORTCODE",
        &row(&[("SORTCODE", "12AB")]),
        &mut container,
        true,
        Some(9),
        Some(9),
        Some(&digits),
    );

    assert_eq!(result, None);
    let reasons: Vec<ValidationReason> = container
        .validation_issues
        .iter()
        .map(|i| i.reason)
        .collect();
    assert_eq!(
        reasons,
        vec![
            ValidationReason::FieldTooShort,
            ValidationReason::InvalidValue
        ]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Lookup validator
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn lookup_validator_distinguishes_invalid_from_unsupported() {
    let validator = lookup_validator(&["Check", "Elec Funds Transfer", "Debit"], &["Debit"]);

    assert_eq!(validator("Check"), None);
    assert_eq!(validator("Debit"), Some(ValidationReason::ValueNotSupported));
    assert_eq!(
        validator("Bitcoin"),
        Some(ValidationReason::InvalidLookupValue)
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcome JSON contract
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn outcome_json_shape_is_exact() {
    let mut container = ValidationContainer::new("NTN-1-ABS-1");
    container.add_validation_issue(ValidationReason::MissingField, "NATINSNO");
    container.add_validation_issue(ValidationReason::FieldTooShort, "SORTCODE: 12345678");

    let outcome = build_outcome("Claimant has validation issues", Some(&container));
    let json = serde_json::to_string(&outcome).unwrap();

    assert_eq!(
        json,
        "{\"message\":\"Claimant has validation issues\",\
         \"validation_container\":{\"record_key\":\"NTN-1-ABS-1\",\
         \"validation_issues\":[\
         {\"reason\":\"MISSING_FIELD\",\"details\":\"NATINSNO\"},\
         {\"reason\":\"FIELD_TOO_SHORT\",\"details\":\"SORTCODE: 12345678\"}]}}"
    );
}

#[test]
fn outcome_without_container_omits_the_key() {
    let outcome = build_outcome("Extract transformed", None);
    let json = serde_json::to_string(&outcome).unwrap();
    assert_eq!(json, "{\"message\":\"Extract transformed\"}");
}

#[test]
fn outcome_round_trips_record_key_and_ordered_issues() {
    let mut container = ValidationContainer::new("rec-key");
    container.add_validation_issue(ValidationReason::InvalidLookupValue, "ACCOUNTTYPE: Bond");
    container.add_validation_issue(ValidationReason::EftPrenoteRejected, "SORTCODE: 123456789");

    let serialized =
        serde_json::to_string(&build_outcome("issues", Some(&container))).unwrap();
    let parsed: Outcome = serde_json::from_str(&serialized).unwrap();

    let parsed_container = parsed.validation_container.unwrap();
    assert_eq!(parsed_container.record_key, "rec-key");
    let pairs: Vec<(ValidationReason, String)> = parsed_container
        .validation_issues
        .iter()
        .map(|i| (i.reason, i.details.clone()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (
                ValidationReason::InvalidLookupValue,
                "ACCOUNTTYPE: Bond".to_string()
            ),
            (
                ValidationReason::EftPrenoteRejected,
                "SORTCODE: 123456789".to_string()
            ),
        ]
    );
}
