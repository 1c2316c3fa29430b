//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database. Pipeline code calls store
//! methods — it never executes SQL directly.
//!
//! Transactions are explicit: one spans an entire date-group's
//! reconciliation (begin_group / commit_group / rollback_group); store
//! methods never open their own.

mod claim;
mod eft;
mod employee;
mod reference_file;
mod staging;
mod state_log;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};

use crate::error::EtlResult;
use crate::types::ImportLogId;

pub struct EtlStore {
    conn: Connection,
    path: Option<String>,
}

impl EtlStore {
    pub fn open(path: &str) -> EtlResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only applies to real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EtlResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EtlResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_employees.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_claims.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_eft_payments.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/005_state_logs.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/006_staging.sql"))?;
        Ok(())
    }

    // ── Date-group transaction ─────────────────────────────────

    pub fn begin_group(&self) -> EtlResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    pub fn commit_group(&self) -> EtlResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    pub fn rollback_group(&self) -> EtlResult<()> {
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }

    // ── Import log ─────────────────────────────────────────────

    pub fn create_import_log(&self, job_name: &str, now: DateTime<Utc>) -> EtlResult<ImportLogId> {
        self.conn.execute(
            "INSERT INTO import_log (job_name, status, started_at) VALUES (?1, 'in_progress', ?2)",
            params![job_name, ts_to_sql(now)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn finish_import_log(
        &self,
        import_log_id: ImportLogId,
        status: &str,
        report: &str,
        now: DateTime<Utc>,
    ) -> EtlResult<()> {
        self.conn.execute(
            "UPDATE import_log SET status = ?1, report = ?2, completed_at = ?3
             WHERE import_log_id = ?4",
            params![status, report, ts_to_sql(now), import_log_id],
        )?;
        Ok(())
    }

    pub fn get_import_log(&self, import_log_id: ImportLogId) -> EtlResult<Option<ImportLogRow>> {
        use rusqlite::OptionalExtension;
        let row = self
            .conn
            .query_row(
                "SELECT import_log_id, job_name, status, report, started_at, completed_at
                 FROM import_log WHERE import_log_id = ?1",
                params![import_log_id],
                |row| {
                    Ok(ImportLogRow {
                        import_log_id: row.get(0)?,
                        job_name: row.get(1)?,
                        status: row.get(2)?,
                        report: row.get(3)?,
                        started_at: sql_to_ts(&row.get::<_, String>(4)?)?,
                        completed_at: row
                            .get::<_, Option<String>>(5)?
                            .map(|s| sql_to_ts(&s))
                            .transpose()?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── SQL ↔ chrono helpers ─────────────────────────────────────────────────────

pub(crate) fn ts_to_sql(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

pub(crate) fn sql_to_ts(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

pub(crate) fn date_to_sql(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.to_string())
}

pub(crate) fn sql_to_date(s: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    s.map(|s| {
        s.parse::<NaiveDate>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    })
    .transpose()
}

// ── Row types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ImportLogRow {
    pub import_log_id: ImportLogId,
    pub job_name: String,
    pub status: String,
    pub report: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ReferenceFileRow {
    pub reference_file_id: String,
    pub file_location: String,
    pub reference_file_type_id: i64,
}

#[derive(Debug, Clone)]
pub struct EmployeeRow {
    pub employee_id: String,
    pub tax_identifier: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub fineos_customer_number: Option<String>,
    pub current_address_pair_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AddressRow {
    pub address_id: String,
    pub address_line_one: Option<String>,
    pub address_line_two: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub geo_state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClaimRow {
    pub claim_id: String,
    pub employee_id: Option<String>,
    pub fineos_absence_id: String,
    pub fineos_notification_id: Option<String>,
    pub claim_type_id: Option<i64>,
    pub fineos_absence_status_id: Option<i64>,
    pub absence_period_start_date: Option<NaiveDate>,
    pub absence_period_end_date: Option<NaiveDate>,
    pub is_id_proofed: bool,
}

#[derive(Debug, Clone)]
pub struct PubEftRow {
    pub pub_eft_id: String,
    pub routing_nbr: String,
    pub account_nbr: String,
    pub bank_account_type_id: i64,
    pub prenote_state_id: i64,
    pub prenote_sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PaymentRow {
    pub payment_id: String,
    pub claim_id: Option<String>,
    pub fineos_pei_c_value: Option<String>,
    pub fineos_pei_i_value: Option<String>,
    pub amount: Option<f64>,
    pub period_start_date: Option<NaiveDate>,
    pub period_end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct StateLogRow {
    pub state_log_id: i64,
    pub associated_type: String,
    pub employee_id: Option<String>,
    pub claim_id: Option<String>,
    pub payment_id: Option<String>,
    pub reference_file_id: Option<String>,
    pub start_state_id: Option<i64>,
    pub end_state_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub outcome: Option<String>,
    pub prev_state_log_id: Option<i64>,
    pub import_log_id: Option<i64>,
}

/// Insert payload for a state_log row; the id comes back from SQLite.
#[derive(Debug, Clone)]
pub struct StateLogInsert {
    pub associated_type: String,
    pub employee_id: Option<String>,
    pub claim_id: Option<String>,
    pub payment_id: Option<String>,
    pub reference_file_id: Option<String>,
    pub start_state_id: Option<i64>,
    pub end_state_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub outcome: Option<String>,
    pub prev_state_log_id: Option<i64>,
    pub import_log_id: Option<i64>,
}
