use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{date_to_sql, sql_to_date, ts_to_sql, AddressRow, EmployeeRow, EtlStore};
use crate::error::EtlResult;

impl EtlStore {
    /// Employees are only ever looked up by tax identifier in this
    /// pipeline — it never creates them.
    pub fn get_employee_by_tax_identifier(
        &self,
        tax_identifier: &str,
    ) -> EtlResult<Option<EmployeeRow>> {
        let row = self
            .conn()
            .query_row(
                "SELECT employee_id, tax_identifier, first_name, last_name, date_of_birth,
                        fineos_customer_number, current_address_pair_id
                 FROM employee WHERE tax_identifier = ?1",
                params![tax_identifier],
                Self::map_employee_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_employee(&self, employee_id: &str) -> EtlResult<Option<EmployeeRow>> {
        let row = self
            .conn()
            .query_row(
                "SELECT employee_id, tax_identifier, first_name, last_name, date_of_birth,
                        fineos_customer_number, current_address_pair_id
                 FROM employee WHERE employee_id = ?1",
                params![employee_id],
                Self::map_employee_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Seeding path for the employer/employee import job and for tests.
    pub fn insert_employee(&self, employee: &EmployeeRow) -> EtlResult<()> {
        let now = ts_to_sql(Utc::now());
        self.conn().execute(
            "INSERT INTO employee
                 (employee_id, tax_identifier, first_name, last_name, date_of_birth,
                  fineos_customer_number, current_address_pair_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                employee.employee_id,
                employee.tax_identifier,
                employee.first_name,
                employee.last_name,
                date_to_sql(employee.date_of_birth),
                employee.fineos_customer_number,
                employee.current_address_pair_id,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn update_employee(&self, employee: &EmployeeRow) -> EtlResult<()> {
        self.conn().execute(
            "UPDATE employee
             SET first_name = ?1, last_name = ?2, date_of_birth = ?3,
                 fineos_customer_number = ?4, current_address_pair_id = ?5,
                 updated_at = ?6
             WHERE employee_id = ?7",
            params![
                employee.first_name,
                employee.last_name,
                date_to_sql(employee.date_of_birth),
                employee.fineos_customer_number,
                employee.current_address_pair_id,
                ts_to_sql(Utc::now()),
                employee.employee_id,
            ],
        )?;
        Ok(())
    }

    // ── Address history ────────────────────────────────────────

    pub fn insert_address(&self, address: &AddressRow) -> EtlResult<()> {
        self.conn().execute(
            "INSERT INTO address
                 (address_id, address_line_one, address_line_two, city, zip_code,
                  geo_state, country, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                address.address_id,
                address.address_line_one,
                address.address_line_two,
                address.city,
                address.zip_code,
                address.geo_state,
                address.country,
                ts_to_sql(Utc::now()),
            ],
        )?;
        Ok(())
    }

    pub fn insert_address_pair(
        &self,
        pair_id: &str,
        employee_id: &str,
        address_id: &str,
    ) -> EtlResult<()> {
        self.conn().execute(
            "INSERT INTO employee_address_pair (pair_id, employee_id, address_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![pair_id, employee_id, address_id, ts_to_sql(Utc::now())],
        )?;
        Ok(())
    }

    /// The address the employee's current pair points at, if any.
    pub fn current_address_for_employee(
        &self,
        employee_id: &str,
    ) -> EtlResult<Option<AddressRow>> {
        let row = self
            .conn()
            .query_row(
                "SELECT a.address_id, a.address_line_one, a.address_line_two, a.city,
                        a.zip_code, a.geo_state, a.country
                 FROM employee e
                 JOIN employee_address_pair p ON p.pair_id = e.current_address_pair_id
                 JOIN address a ON a.address_id = p.address_id
                 WHERE e.employee_id = ?1",
                params![employee_id],
                |row| {
                    Ok(AddressRow {
                        address_id: row.get(0)?,
                        address_line_one: row.get(1)?,
                        address_line_two: row.get(2)?,
                        city: row.get(3)?,
                        zip_code: row.get(4)?,
                        geo_state: row.get(5)?,
                        country: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn address_pair_count(&self, employee_id: &str) -> EtlResult<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM employee_address_pair WHERE employee_id = ?1",
            params![employee_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── Per-run linkage bookkeeping ────────────────────────────

    pub fn employee_reference_file_exists(
        &self,
        employee_id: &str,
        reference_file_id: &str,
    ) -> EtlResult<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM employee_reference_file
             WHERE employee_id = ?1 AND reference_file_id = ?2",
            params![employee_id, reference_file_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn insert_employee_reference_file(
        &self,
        employee_id: &str,
        reference_file_id: &str,
    ) -> EtlResult<()> {
        self.conn().execute(
            "INSERT INTO employee_reference_file (employee_id, reference_file_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![employee_id, reference_file_id, ts_to_sql(Utc::now())],
        )?;
        Ok(())
    }

    fn map_employee_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EmployeeRow> {
        Ok(EmployeeRow {
            employee_id: row.get(0)?,
            tax_identifier: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            date_of_birth: sql_to_date(row.get(4)?)?,
            fineos_customer_number: row.get(5)?,
            current_address_pair_id: row.get(6)?,
        })
    }
}
