//! Persistence capabilities and roster loading.
//!
//! The engine never talks to a concrete backend.  Drafts go through
//! the [`KvStore`] capability (get/set/delete on string keys, the
//! shape of a browser's local storage), and saved payroll runs go
//! through [`PayrollStore`].  Both are injected into the
//! reconciliation engine so tests and embedders can substitute
//! in-memory fakes.  JSON roster loading helpers are provided for the
//! demo binary and any file-backed deployment.

use crate::models::{AttendanceRecord, Employee, PayPeriod, SavedRow};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Failure talking to a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or its lock was poisoned.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Key-value persistence for local drafts.
pub trait KvStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-memory [`KvStore`], the default for tests and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: HashMap<String, String>,
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Persistence for saved payroll runs, keyed by pay period.
///
/// A save replaces the whole run for its period as a single unit; the
/// core never assumes partial success.
pub trait PayrollStore: Send {
    /// Rows previously saved for the period; empty when none exist.
    fn load(&self, period: PayPeriod) -> Result<Vec<SavedRow>, StoreError>;
    fn save(&mut self, period: PayPeriod, rows: &[SavedRow]) -> Result<(), StoreError>;
}

/// In-memory [`PayrollStore`].
#[derive(Debug, Default)]
pub struct MemoryPayrollStore {
    runs: HashMap<PayPeriod, Vec<SavedRow>>,
}

impl PayrollStore for MemoryPayrollStore {
    fn load(&self, period: PayPeriod) -> Result<Vec<SavedRow>, StoreError> {
        Ok(self.runs.get(&period).cloned().unwrap_or_default())
    }

    fn save(&mut self, period: PayPeriod, rows: &[SavedRow]) -> Result<(), StoreError> {
        self.runs.insert(period, rows.to_vec());
        Ok(())
    }
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Loads an employee roster from a JSON array file.
pub fn load_employees_from_file(path: &Path) -> Result<Vec<Employee>, StoreError> {
    read_json_file(path)
}

/// Loads attendance records from a JSON array file.
pub fn load_attendance_from_file(path: &Path) -> Result<Vec<AttendanceRecord>, StoreError> {
    read_json_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmployeeType, PaymentMethod, PayrollRow};

    fn saved(id: &str, cash: bool) -> SavedRow {
        SavedRow {
            row: PayrollRow {
                employee_id: id.into(),
                name: "Test".into(),
                designation: String::new(),
                paid_days: 1,
                deduction_days: 0,
                absent_days: None,
                effective_deduction_days: None,
                deduction_amount: 0.0,
                rate_per_hour: 0.0,
                salary_before_ot: None,
                ot_hours: None,
                ot_pay: None,
                net_salary: 100.0,
            },
            is_cash: cash,
            payment_method: if cash {
                PaymentMethod::Cash
            } else {
                PaymentMethod::BankTransfer
            },
        }
    }

    #[test]
    fn memory_kv_store_round_trip() {
        let mut store = MemoryKvStore::default();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        // Deleting a missing key is not an error.
        store.delete("k").unwrap();
    }

    #[test]
    fn payroll_store_keys_runs_by_period() {
        let mut store = MemoryPayrollStore::default();
        let july = PayPeriod::new(EmployeeType::Labour, 2025, 7);
        let august = PayPeriod::new(EmployeeType::Labour, 2025, 8);
        store.save(july, &[saved("1", true)]).unwrap();

        assert_eq!(store.load(july).unwrap().len(), 1);
        assert!(store.load(august).unwrap().is_empty());

        // A second save replaces the run wholesale.
        store.save(july, &[saved("2", false), saved("3", false)]).unwrap();
        let rows = store.load(july).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| !r.is_cash));
    }

    #[test]
    fn saved_row_serialises_flat() {
        let raw = serde_json::to_value(saved("9", true)).unwrap();
        assert_eq!(raw.get("employeeId").and_then(|v| v.as_str()), Some("9"));
        assert_eq!(raw.get("isCash").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(
            raw.get("paymentMethod").and_then(|v| v.as_str()),
            Some("Cash")
        );
    }
}
