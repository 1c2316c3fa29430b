//! In-memory index of one date-group's worth of raw CSV rows.
//!
//! Transient: rebuilt every run from the downloaded files, never
//! persisted. Owned by the step engine and passed immutably into
//! reconciliation.

use std::collections::HashMap;

use crate::error::EtlResult;
use crate::lookups::ReferenceFileType;
use crate::types::{DateGroup, EntityId};

// ── Pipeline descriptors ─────────────────────────────────────────────────────

/// How one file type is keyed into its index.
#[derive(Debug, Clone, Copy)]
pub enum IndexKey {
    Single(&'static str),
    /// Composite key (e.g. the FINEOS C/I index), joined with ','.
    Composite(&'static [&'static str]),
}

/// Pick-one-row-per-key policy applied while indexing, not afterward.
#[derive(Debug, Clone, Copy)]
pub struct RowFilter {
    pub column: &'static str,
    pub equals: &'static str,
}

/// Which staging table a file's raw rows land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingTable {
    EmployeeFeed,
    RequestedAbsence,
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractConfig {
    /// Logical filename, e.g. "Employee_feed.csv". Physical files carry a
    /// date-group prefix in front of this name.
    pub logical_name: &'static str,
    pub index_key: IndexKey,
    pub row_filter: Option<RowFilter>,
    pub staging_table: StagingTable,
    /// Lower-cased staging columns this pipeline's schema knows about.
    pub known_columns: &'static [&'static str],
}

/// One extract pipeline: a reference-file type plus the complete set of
/// files a date-group must contain.
#[derive(Debug, Clone, Copy)]
pub struct ExtractPipeline {
    pub reference_file_type: ReferenceFileType,
    pub expected_files: &'static [ExtractConfig],
}

pub const REQUESTED_ABSENCE_SOM: &str = "VBI_REQUESTEDABSENCE_SOM.csv";
pub const EMPLOYEE_FEED: &str = "Employee_feed.csv";

const REQUESTED_ABSENCE_COLUMNS: &[&str] = &[
    "absence_casenumber",
    "notification_casenumber",
    "absence_casestatus",
    "absencereason_coverage",
    "absenceperiod_classid",
    "absenceperiod_indexid",
    "absenceperiod_start",
    "absenceperiod_end",
    "employee_customerno",
    "leaverequest_evidenceresulttype",
];

const EMPLOYEE_FEED_COLUMNS: &[&str] = &[
    "c",
    "i",
    "defpaymentpref",
    "customerno",
    "natinsno",
    "dateofbirth",
    "firstnames",
    "lastname",
    "paymentmethod",
    "address1",
    "address2",
    "address4",
    "address6",
    "postcode",
    "sortcode",
    "accountno",
    "accounttype",
];

pub static CLAIMANT_EXTRACT_PIPELINE: ExtractPipeline = ExtractPipeline {
    reference_file_type: ReferenceFileType::FineosClaimantExtract,
    expected_files: &[
        ExtractConfig {
            logical_name: REQUESTED_ABSENCE_SOM,
            index_key: IndexKey::Single("ABSENCE_CASENUMBER"),
            row_filter: None,
            staging_table: StagingTable::RequestedAbsence,
            known_columns: REQUESTED_ABSENCE_COLUMNS,
        },
        ExtractConfig {
            logical_name: EMPLOYEE_FEED,
            index_key: IndexKey::Single("CUSTOMERNO"),
            // FINEOS emits one feed row per payment preference; only the
            // default preference row describes the claimant.
            row_filter: Some(RowFilter {
                column: "DEFPAYMENTPREF",
                equals: "Y",
            }),
            staging_table: StagingTable::EmployeeFeed,
            known_columns: EMPLOYEE_FEED_COLUMNS,
        },
    ],
};

// ── Index ────────────────────────────────────────────────────────────────────

/// One CSV file's parsed, key-indexed contents for a single date-group.
/// Last write wins on duplicate keys, except where a row filter selects
/// the one row that counts.
#[derive(Debug, Clone)]
pub struct Extract {
    pub file_location: String,
    pub indexed_data: HashMap<String, HashMap<String, String>>,
}

impl Extract {
    pub fn from_csv_bytes(
        file_location: &str,
        bytes: &[u8],
        config: &ExtractConfig,
    ) -> EtlResult<Self> {
        let rows = parse_csv_rows(bytes)?;
        Ok(Self::from_rows(file_location, &rows, config))
    }

    /// Index already-parsed rows, applying the pick-one-row filter while
    /// indexing rather than afterward.
    pub fn from_rows(
        file_location: &str,
        rows: &[HashMap<String, String>],
        config: &ExtractConfig,
    ) -> Self {
        let mut indexed_data = HashMap::new();
        for row in rows {
            if let Some(filter) = &config.row_filter {
                let value = row.get(filter.column).map(String::as_str).unwrap_or("");
                if value != filter.equals {
                    continue;
                }
            }

            let Some(key) = index_key_for(row, &config.index_key) else {
                log::warn!(
                    "{}: row without index key {:?} dropped",
                    config.logical_name,
                    config.index_key
                );
                continue;
            };
            indexed_data.insert(key, row.clone());
        }

        Self {
            file_location: file_location.to_string(),
            indexed_data,
        }
    }
}

/// Parse a whole CSV file into header-keyed rows, headers trimmed.
pub fn parse_csv_rows(bytes: &[u8]) -> EtlResult<Vec<HashMap<String, String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = HashMap::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            row.insert(
                header.clone(),
                record.get(i).unwrap_or_default().to_string(),
            );
        }
        rows.push(row);
    }
    Ok(rows)
}

fn index_key_for(row: &HashMap<String, String>, key: &IndexKey) -> Option<String> {
    match key {
        IndexKey::Single(column) => {
            let value = row.get(*column)?;
            if value.is_empty() {
                return None;
            }
            Some(value.clone())
        }
        IndexKey::Composite(columns) => {
            let mut parts = Vec::with_capacity(columns.len());
            for column in *columns {
                let value = row.get(*column)?;
                if value.is_empty() {
                    return None;
                }
                parts.push(value.as_str());
            }
            Some(parts.join(","))
        }
    }
}

/// All of one date-group's indexed extracts, keyed by logical filename.
#[derive(Debug)]
pub struct ExtractData {
    pub date_group: DateGroup,
    pub reference_file_id: EntityId,
    extracts: HashMap<&'static str, Extract>,
}

impl ExtractData {
    pub fn new(date_group: DateGroup, reference_file_id: EntityId) -> Self {
        Self {
            date_group,
            reference_file_id,
            extracts: HashMap::new(),
        }
    }

    pub fn insert(&mut self, logical_name: &'static str, extract: Extract) {
        self.extracts.insert(logical_name, extract);
    }

    pub fn extract(&self, logical_name: &str) -> Option<&Extract> {
        self.extracts.get(logical_name)
    }
}

// ── Staging column mapper ────────────────────────────────────────────────────

/// Upstream headers our staging schema does not know about. Warned once
/// per file, never fatal: the extract schema evolves independently.
pub fn unknown_columns(headers: &HashMap<String, String>, known: &[&str]) -> Vec<String> {
    let mut unknown: Vec<String> = headers
        .keys()
        .filter(|h| !known.contains(&h.to_lowercase().as_str()))
        .cloned()
        .collect();
    unknown.sort();
    unknown
}

/// Lower-case a raw row's keys and drop anything the staging schema does
/// not know about.
pub fn filter_known_columns(
    row: &HashMap<String, String>,
    known: &[&str],
) -> HashMap<String, String> {
    row.iter()
        .filter_map(|(k, v)| {
            let lowered = k.to_lowercase();
            known
                .contains(&lowered.as_str())
                .then(|| (lowered, v.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn absence_config() -> ExtractConfig {
        CLAIMANT_EXTRACT_PIPELINE.expected_files[0]
    }

    fn feed_config() -> ExtractConfig {
        CLAIMANT_EXTRACT_PIPELINE.expected_files[1]
    }

    #[test]
    fn indexes_rows_by_single_key_last_write_wins() {
        let csv = b"ABSENCE_CASENUMBER,ABSENCE_CASESTATUS\nNTN-1-ABS-1,Adjudication\nNTN-1-ABS-1,Approved\nNTN-2-ABS-1,Closed\n";
        let extract = Extract::from_csv_bytes("x.csv", csv, &absence_config()).unwrap();
        assert_eq!(extract.indexed_data.len(), 2);
        assert_eq!(
            extract.indexed_data["NTN-1-ABS-1"]["ABSENCE_CASESTATUS"],
            "Approved"
        );
    }

    #[test]
    fn default_preference_filter_selects_one_row_per_key() {
        let csv = b"CUSTOMERNO,DEFPAYMENTPREF,PAYMENTMETHOD\n100,N,Check\n100,Y,Elec Funds Transfer\n100,N,Debit\n";
        let extract = Extract::from_csv_bytes("x.csv", csv, &feed_config()).unwrap();
        assert_eq!(extract.indexed_data.len(), 1);
        assert_eq!(
            extract.indexed_data["100"]["PAYMENTMETHOD"],
            "Elec Funds Transfer"
        );
    }

    #[test]
    fn composite_key_joins_columns() {
        let config = ExtractConfig {
            logical_name: "vpei.csv",
            index_key: IndexKey::Composite(&["C", "I"]),
            row_filter: None,
            staging_table: StagingTable::RequestedAbsence,
            known_columns: &[],
        };
        let csv = b"C,I,AMOUNT\n7326,249,100.00\n";
        let extract = Extract::from_csv_bytes("x.csv", csv, &config).unwrap();
        assert!(extract.indexed_data.contains_key("7326,249"));
    }

    #[test]
    fn rows_without_index_key_are_dropped() {
        let csv = b"ABSENCE_CASENUMBER,ABSENCE_CASESTATUS\n,Adjudication\nNTN-9-ABS-1,Closed\n";
        let extract = Extract::from_csv_bytes("x.csv", csv, &absence_config()).unwrap();
        assert_eq!(extract.indexed_data.len(), 1);
    }

    #[test]
    fn staging_mapper_lowercases_and_drops_unknown() {
        let mut row = HashMap::new();
        row.insert("CUSTOMERNO".to_string(), "100".to_string());
        row.insert("BRANDNEWCOLUMN".to_string(), "x".to_string());
        let filtered = filter_known_columns(&row, EMPLOYEE_FEED_COLUMNS);
        assert_eq!(filtered.get("customerno").map(String::as_str), Some("100"));
        assert!(!filtered.contains_key("brandnewcolumn"));
        assert_eq!(
            unknown_columns(&row, EMPLOYEE_FEED_COLUMNS),
            vec!["BRANDNEWCOLUMN".to_string()]
        );
    }
}
