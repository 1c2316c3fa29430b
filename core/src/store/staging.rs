//! Raw-row staging inserts. Rows arrive already lower-cased and filtered
//! to the known columns (see extract::filter_known_columns).

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::params;

use super::{ts_to_sql, EtlStore};
use crate::error::EtlResult;
use crate::types::ImportLogId;

impl EtlStore {
    pub fn insert_employee_feed_staging(
        &self,
        reference_file_id: &str,
        import_log_id: ImportLogId,
        row: &HashMap<String, String>,
    ) -> EtlResult<()> {
        let get = |k: &str| row.get(k).cloned();
        self.conn().execute(
            "INSERT INTO fineos_extract_employee_feed
                 (reference_file_id, import_log_id, c, i, defpaymentpref, customerno,
                  natinsno, dateofbirth, firstnames, lastname, paymentmethod,
                  address1, address2, address4, address6, postcode,
                  sortcode, accountno, accounttype, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                     ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                reference_file_id,
                import_log_id,
                get("c"),
                get("i"),
                get("defpaymentpref"),
                get("customerno"),
                get("natinsno"),
                get("dateofbirth"),
                get("firstnames"),
                get("lastname"),
                get("paymentmethod"),
                get("address1"),
                get("address2"),
                get("address4"),
                get("address6"),
                get("postcode"),
                get("sortcode"),
                get("accountno"),
                get("accounttype"),
                ts_to_sql(Utc::now()),
            ],
        )?;
        Ok(())
    }

    pub fn insert_requested_absence_staging(
        &self,
        reference_file_id: &str,
        import_log_id: ImportLogId,
        row: &HashMap<String, String>,
    ) -> EtlResult<()> {
        let get = |k: &str| row.get(k).cloned();
        self.conn().execute(
            "INSERT INTO fineos_extract_vbi_requested_absence_som
                 (reference_file_id, import_log_id, absence_casenumber,
                  notification_casenumber, absence_casestatus, absencereason_coverage,
                  absenceperiod_classid, absenceperiod_indexid,
                  absenceperiod_start, absenceperiod_end,
                  employee_customerno, leaverequest_evidenceresulttype, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                reference_file_id,
                import_log_id,
                get("absence_casenumber"),
                get("notification_casenumber"),
                get("absence_casestatus"),
                get("absencereason_coverage"),
                get("absenceperiod_classid"),
                get("absenceperiod_indexid"),
                get("absenceperiod_start"),
                get("absenceperiod_end"),
                get("employee_customerno"),
                get("leaverequest_evidenceresulttype"),
                ts_to_sql(Utc::now()),
            ],
        )?;
        Ok(())
    }

    pub fn employee_feed_staging_count(&self) -> EtlResult<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM fineos_extract_employee_feed",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn requested_absence_staging_count(&self) -> EtlResult<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM fineos_extract_vbi_requested_absence_som",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
