use rusqlite::{params, OptionalExtension};

use super::{sql_to_ts, ts_to_sql, EtlStore, StateLogInsert, StateLogRow};
use crate::error::EtlResult;

const STATE_LOG_COLUMNS: &str = "state_log_id, associated_type, employee_id, claim_id, \
     payment_id, reference_file_id, start_state_id, end_state_id, started_at, ended_at, \
     outcome, prev_state_log_id, import_log_id";

impl EtlStore {
    pub fn insert_state_log(&self, insert: &StateLogInsert) -> EtlResult<i64> {
        self.conn().execute(
            "INSERT INTO state_log
                 (associated_type, employee_id, claim_id, payment_id, reference_file_id,
                  start_state_id, end_state_id, started_at, ended_at, outcome,
                  prev_state_log_id, import_log_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                insert.associated_type,
                insert.employee_id,
                insert.claim_id,
                insert.payment_id,
                insert.reference_file_id,
                insert.start_state_id,
                insert.end_state_id,
                ts_to_sql(insert.started_at),
                ts_to_sql(insert.ended_at),
                insert.outcome,
                insert.prev_state_log_id,
                insert.import_log_id,
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    pub fn get_state_log(&self, state_log_id: i64) -> EtlResult<Option<StateLogRow>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {STATE_LOG_COLUMNS} FROM state_log WHERE state_log_id = ?1"),
                params![state_log_id],
                Self::map_state_log_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All latest-pointer rows for one (entity, flow). The engine treats
    /// more than one row as a hard error; the partial unique indexes
    /// should make that impossible.
    pub fn latest_state_log_refs(
        &self,
        entity_column: &'static str,
        entity_id: &str,
        flow_id: i64,
    ) -> EtlResult<Vec<(i64, i64)>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT latest_state_log_id, state_log_id FROM latest_state_log
             WHERE {entity_column} = ?1 AND flow_id = ?2"
        ))?;
        let rows = stmt
            .query_map(params![entity_id, flow_id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Point (entity, flow) at a new state log, creating the pointer row
    /// on first transition.
    pub fn upsert_latest_state_log(
        &self,
        entity_column: &'static str,
        entity_id: &str,
        flow_id: i64,
        state_log_id: i64,
    ) -> EtlResult<()> {
        let updated = self.conn().execute(
            &format!(
                "UPDATE latest_state_log SET state_log_id = ?1
                 WHERE {entity_column} = ?2 AND flow_id = ?3"
            ),
            params![state_log_id, entity_id, flow_id],
        )?;
        if updated == 0 {
            self.conn().execute(
                &format!(
                    "INSERT INTO latest_state_log (state_log_id, flow_id, {entity_column})
                     VALUES (?1, ?2, ?3)"
                ),
                params![state_log_id, flow_id, entity_id],
            )?;
        }
        Ok(())
    }

    /// State logs that are some entity's CURRENT state and have the given
    /// end state. Historical passes-through do not appear here.
    pub fn latest_state_logs_with_end_state(
        &self,
        entity_column: &'static str,
        end_state_id: i64,
    ) -> EtlResult<Vec<StateLogRow>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {STATE_LOG_COLUMNS}
             FROM state_log
             WHERE state_log_id IN
                   (SELECT state_log_id FROM latest_state_log
                    WHERE {entity_column} IS NOT NULL)
               AND end_state_id = ?1
             ORDER BY state_log_id ASC"
        ))?;
        let rows = stmt
            .query_map(params![end_state_id], Self::map_state_log_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Current-state distribution across every tracked entity.
    pub fn state_counts(&self) -> EtlResult<Vec<(i64, i64)>> {
        let mut stmt = self.conn().prepare(
            "SELECT s.end_state_id, COUNT(*)
             FROM latest_state_log l
             JOIN state_log s ON s.state_log_id = l.state_log_id
             GROUP BY s.end_state_id
             ORDER BY s.end_state_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn state_log_count(&self) -> EtlResult<i64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM state_log", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn latest_state_log_count(&self) -> EtlResult<i64> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM latest_state_log", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_state_log_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StateLogRow> {
        Ok(StateLogRow {
            state_log_id: row.get(0)?,
            associated_type: row.get(1)?,
            employee_id: row.get(2)?,
            claim_id: row.get(3)?,
            payment_id: row.get(4)?,
            reference_file_id: row.get(5)?,
            start_state_id: row.get(6)?,
            end_state_id: row.get(7)?,
            started_at: sql_to_ts(&row.get::<_, String>(8)?)?,
            ended_at: sql_to_ts(&row.get::<_, String>(9)?)?,
            outcome: row.get(10)?,
            prev_state_log_id: row.get(11)?,
            import_log_id: row.get(12)?,
        })
    }
}
