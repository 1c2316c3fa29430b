use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{ts_to_sql, EtlStore, ReferenceFileRow};
use crate::error::EtlResult;

impl EtlStore {
    pub fn insert_reference_file(&self, file: &ReferenceFileRow) -> EtlResult<()> {
        let now = ts_to_sql(Utc::now());
        self.conn().execute(
            "INSERT INTO reference_file
                 (reference_file_id, file_location, reference_file_type_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                file.reference_file_id,
                file.file_location,
                file.reference_file_type_id,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn get_reference_file_by_location(
        &self,
        file_location: &str,
    ) -> EtlResult<Option<ReferenceFileRow>> {
        let row = self
            .conn()
            .query_row(
                "SELECT reference_file_id, file_location, reference_file_type_id
                 FROM reference_file WHERE file_location = ?1",
                params![file_location],
                |row| {
                    Ok(ReferenceFileRow {
                        reference_file_id: row.get(0)?,
                        file_location: row.get(1)?,
                        reference_file_type_id: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// The underlying files moved; the row follows them.
    pub fn update_reference_file_location(
        &self,
        reference_file_id: &str,
        file_location: &str,
    ) -> EtlResult<()> {
        self.conn().execute(
            "UPDATE reference_file SET file_location = ?1, updated_at = ?2
             WHERE reference_file_id = ?3",
            params![file_location, ts_to_sql(Utc::now()), reference_file_id],
        )?;
        Ok(())
    }

    pub fn reference_file_count(&self) -> EtlResult<i64> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM reference_file", [], |row| row.get(0))?;
        Ok(count)
    }
}
