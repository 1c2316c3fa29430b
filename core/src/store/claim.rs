use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{date_to_sql, sql_to_date, ts_to_sql, ClaimRow, EtlStore};
use crate::error::EtlResult;

impl EtlStore {
    pub fn get_claim_by_absence_id(
        &self,
        fineos_absence_id: &str,
    ) -> EtlResult<Option<ClaimRow>> {
        let row = self
            .conn()
            .query_row(
                "SELECT claim_id, employee_id, fineos_absence_id, fineos_notification_id,
                        claim_type_id, fineos_absence_status_id,
                        absence_period_start_date, absence_period_end_date, is_id_proofed
                 FROM claim WHERE fineos_absence_id = ?1",
                params![fineos_absence_id],
                Self::map_claim_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn insert_claim(&self, claim: &ClaimRow) -> EtlResult<()> {
        let now = ts_to_sql(Utc::now());
        self.conn().execute(
            "INSERT INTO claim
                 (claim_id, employee_id, fineos_absence_id, fineos_notification_id,
                  claim_type_id, fineos_absence_status_id,
                  absence_period_start_date, absence_period_end_date, is_id_proofed,
                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                claim.claim_id,
                claim.employee_id,
                claim.fineos_absence_id,
                claim.fineos_notification_id,
                claim.claim_type_id,
                claim.fineos_absence_status_id,
                date_to_sql(claim.absence_period_start_date),
                date_to_sql(claim.absence_period_end_date),
                claim.is_id_proofed as i64,
                now,
            ],
        )?;
        Ok(())
    }

    /// Last-extract-wins overwrite; no merging of old and new fields.
    pub fn update_claim(&self, claim: &ClaimRow) -> EtlResult<()> {
        self.conn().execute(
            "UPDATE claim
             SET employee_id = ?1, fineos_notification_id = ?2, claim_type_id = ?3,
                 fineos_absence_status_id = ?4, absence_period_start_date = ?5,
                 absence_period_end_date = ?6, is_id_proofed = ?7, updated_at = ?8
             WHERE claim_id = ?9",
            params![
                claim.employee_id,
                claim.fineos_notification_id,
                claim.claim_type_id,
                claim.fineos_absence_status_id,
                date_to_sql(claim.absence_period_start_date),
                date_to_sql(claim.absence_period_end_date),
                claim.is_id_proofed as i64,
                ts_to_sql(Utc::now()),
                claim.claim_id,
            ],
        )?;
        Ok(())
    }

    pub fn claim_count(&self) -> EtlResult<i64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM claim", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_claim_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClaimRow> {
        Ok(ClaimRow {
            claim_id: row.get(0)?,
            employee_id: row.get(1)?,
            fineos_absence_id: row.get(2)?,
            fineos_notification_id: row.get(3)?,
            claim_type_id: row.get(4)?,
            fineos_absence_status_id: row.get(5)?,
            absence_period_start_date: sql_to_date(row.get(6)?)?,
            absence_period_end_date: sql_to_date(row.get(7)?)?,
            is_id_proofed: row.get::<_, i64>(8)? != 0,
        })
    }
}
