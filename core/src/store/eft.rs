use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{date_to_sql, sql_to_ts, ts_to_sql, EtlStore, PaymentRow, PubEftRow};
use crate::error::EtlResult;
use crate::lookups::PrenoteState;

impl EtlStore {
    /// All EFT records linked to an employee, oldest first.
    pub fn get_employee_efts(&self, employee_id: &str) -> EtlResult<Vec<PubEftRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT e.pub_eft_id, e.routing_nbr, e.account_nbr, e.bank_account_type_id,
                    e.prenote_state_id, e.prenote_sent_at
             FROM pub_eft e
             JOIN employee_pub_eft link ON link.pub_eft_id = e.pub_eft_id
             WHERE link.employee_id = ?1
             ORDER BY e.created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![employee_id], |row| {
                Ok(PubEftRow {
                    pub_eft_id: row.get(0)?,
                    routing_nbr: row.get(1)?,
                    account_nbr: row.get(2)?,
                    bank_account_type_id: row.get(3)?,
                    prenote_state_id: row.get(4)?,
                    prenote_sent_at: row
                        .get::<_, Option<String>>(5)?
                        .map(|s| sql_to_ts(&s))
                        .transpose()?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn insert_pub_eft(&self, eft: &PubEftRow) -> EtlResult<()> {
        let now = ts_to_sql(Utc::now());
        self.conn().execute(
            "INSERT INTO pub_eft
                 (pub_eft_id, routing_nbr, account_nbr, bank_account_type_id,
                  prenote_state_id, prenote_sent_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                eft.pub_eft_id,
                eft.routing_nbr,
                eft.account_nbr,
                eft.bank_account_type_id,
                eft.prenote_state_id,
                eft.prenote_sent_at.map(ts_to_sql),
                now,
            ],
        )?;
        Ok(())
    }

    pub fn link_employee_pub_eft(&self, employee_id: &str, pub_eft_id: &str) -> EtlResult<()> {
        self.conn().execute(
            "INSERT INTO employee_pub_eft (employee_id, pub_eft_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![employee_id, pub_eft_id, ts_to_sql(Utc::now())],
        )?;
        Ok(())
    }

    /// Prenote lifecycle transition, recorded by the prenote-response job.
    pub fn update_prenote_state(
        &self,
        pub_eft_id: &str,
        state: PrenoteState,
        sent_at: Option<DateTime<Utc>>,
    ) -> EtlResult<()> {
        self.conn().execute(
            "UPDATE pub_eft
             SET prenote_state_id = ?1, prenote_sent_at = COALESCE(?2, prenote_sent_at),
                 updated_at = ?3
             WHERE pub_eft_id = ?4",
            params![
                state.id(),
                sent_at.map(ts_to_sql),
                ts_to_sql(Utc::now()),
                pub_eft_id,
            ],
        )?;
        Ok(())
    }

    pub fn pub_eft_count(&self) -> EtlResult<i64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM pub_eft", [], |row| row.get(0))?;
        Ok(count)
    }

    // ── Payments ───────────────────────────────────────────────

    pub fn insert_payment(&self, payment: &PaymentRow) -> EtlResult<()> {
        let now = ts_to_sql(Utc::now());
        self.conn().execute(
            "INSERT INTO payment
                 (payment_id, claim_id, fineos_pei_c_value, fineos_pei_i_value,
                  amount, period_start_date, period_end_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                payment.payment_id,
                payment.claim_id,
                payment.fineos_pei_c_value,
                payment.fineos_pei_i_value,
                payment.amount,
                date_to_sql(payment.period_start_date),
                date_to_sql(payment.period_end_date),
                now,
            ],
        )?;
        Ok(())
    }
}
