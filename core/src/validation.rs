//! Per-record validation accumulation and the CSV field validator.
//!
//! RULE: record-level validation failures are captured as data, never
//! raised as errors. A container's contents are serialized verbatim into
//! a state log's outcome JSON; that JSON shape is an external contract
//! consumed by error-report generation and must not change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Reasons ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationReason {
    MissingField,
    FieldTooShort,
    FieldTooLong,
    InvalidLookupValue,
    InvalidValue,
    ValueNotSupported,
    MissingInDb,
    EftPrenoteRejected,
    MissingDataset,
    MultipleValuesFound,
}

impl ValidationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingField => "MISSING_FIELD",
            Self::FieldTooShort => "FIELD_TOO_SHORT",
            Self::FieldTooLong => "FIELD_TOO_LONG",
            Self::InvalidLookupValue => "INVALID_LOOKUP_VALUE",
            Self::InvalidValue => "INVALID_VALUE",
            Self::ValueNotSupported => "VALUE_NOT_SUPPORTED",
            Self::MissingInDb => "MISSING_IN_DB",
            Self::EftPrenoteRejected => "EFT_PRENOTE_REJECTED",
            Self::MissingDataset => "MISSING_DATASET",
            Self::MultipleValuesFound => "MULTIPLE_VALUES_FOUND",
        }
    }
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Container ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub reason: ValidationReason,
    pub details: String,
}

/// Ordered accumulation of validation failures for one logical record,
/// keyed by a human-meaningful record key (absence case number, customer
/// number, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationContainer {
    pub record_key: String,
    pub validation_issues: Vec<ValidationIssue>,
}

impl ValidationContainer {
    pub fn new(record_key: impl Into<String>) -> Self {
        Self {
            record_key: record_key.into(),
            validation_issues: Vec::new(),
        }
    }

    pub fn add_validation_issue(&mut self, reason: ValidationReason, details: impl Into<String>) {
        self.validation_issues.push(ValidationIssue {
            reason,
            details: details.into(),
        });
    }

    pub fn has_validation_issues(&self) -> bool {
        !self.validation_issues.is_empty()
    }
}

// ── Outcome JSON ─────────────────────────────────────────────────────────────

/// The persisted state-log outcome. Field order and key names are part of
/// the external contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_container: Option<ValidationContainer>,
}

pub fn build_outcome(message: &str, container: Option<&ValidationContainer>) -> Outcome {
    Outcome {
        message: message.to_string(),
        validation_container: container.cloned(),
    }
}

// ── CSV field validator ──────────────────────────────────────────────────────

/// A custom per-field check run after the length checks. Returns the
/// reason to record when the value fails.
pub type CustomValidator<'a> = &'a dyn Fn(&str) -> Option<ValidationReason>;

/// Pull `key` out of a parsed row and apply required/length/custom checks,
/// feeding failures into `container`.
///
/// Empty string and the literal "Unknown" both count as absent. If any
/// check fails the parsed value is NOT returned — callers must treat the
/// field as absent even when it was merely too long. Issue details carry
/// the raw value ("{key}: {value}"); this is an accepted
/// PII-in-error-report tradeoff.
pub fn validate_csv_input(
    key: &str,
    row: &HashMap<String, String>,
    container: &mut ValidationContainer,
    required: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    custom_validator: Option<CustomValidator<'_>>,
) -> Option<String> {
    let value = row.get(key).map(String::as_str).unwrap_or("");

    if value.is_empty() || value == "Unknown" {
        if required {
            container.add_validation_issue(ValidationReason::MissingField, key);
        }
        return None;
    }

    let mut failed = false;

    if let Some(min) = min_length {
        if value.len() < min {
            failed = true;
            container
                .add_validation_issue(ValidationReason::FieldTooShort, format!("{key}: {value}"));
        }
    }
    if let Some(max) = max_length {
        if value.len() > max {
            failed = true;
            container
                .add_validation_issue(ValidationReason::FieldTooLong, format!("{key}: {value}"));
        }
    }
    if let Some(validator) = custom_validator {
        if let Some(reason) = validator(value) {
            failed = true;
            container.add_validation_issue(reason, format!("{key}: {value}"));
        }
    }

    if failed {
        return None;
    }
    Some(value.to_string())
}

/// Build a membership check over a lookup domain's descriptions, with an
/// optional disallow-list for values valid as a type but unusable in this
/// context (e.g. "Debit" payment method in the claimant EFT flow).
pub fn lookup_validator(
    valid: &'static [&'static str],
    disallowed: &'static [&'static str],
) -> impl Fn(&str) -> Option<ValidationReason> {
    move |value: &str| {
        if disallowed.contains(&value) {
            return Some(ValidationReason::ValueNotSupported);
        }
        if !valid.contains(&value) {
            return Some(ValidationReason::InvalidLookupValue);
        }
        None
    }
}
