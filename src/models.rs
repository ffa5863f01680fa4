//! Data models for the payroll engine.
//!
//! The `models` module defines the serialisable structs and enums
//! representing employees, attendance records, pay periods and payroll
//! result rows.  These data types derive `Serialize` and `Deserialize`
//! so that they can be persisted or transmitted as-is; field names on
//! the wire are camelCase to match the tabular store that feeds the
//! engine.  Identifier and numeric fields deserialise leniently because
//! the upstream store is a spreadsheet: ids may arrive as strings or
//! numbers, and rates may arrive as numeric strings or be missing
//! entirely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Whether an employee belongs to the labour or staff payroll.
///
/// The two partitions are calculated differently: labour pay includes
/// overtime and an absence penalty, staff pay includes a fixed
/// externally maintained deduction instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeType {
    Labour,
    Staff,
}

impl fmt::Display for EmployeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmployeeType::Labour => f.write_str("labour"),
            EmployeeType::Staff => f.write_str("staff"),
        }
    }
}

/// Error returned when parsing an [`EmployeeType`] from a string fails.
#[derive(Debug, thiserror::Error)]
#[error("unknown employee type: {0:?} (expected \"labour\" or \"staff\")")]
pub struct ParseEmployeeTypeError(String);

impl FromStr for EmployeeType {
    type Err = ParseEmployeeTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "labour" => Ok(EmployeeType::Labour),
            "staff" => Ok(EmployeeType::Staff),
            other => Err(ParseEmployeeTypeError(other.to_string())),
        }
    }
}

/// Represents an employee as maintained by the employees module.
///
/// Read-only input to the payroll core; creation and editing happen in
/// an external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    /// Unique identifier within a type partition.  The store may hold
    /// it as a number or a string; it is normalised to a string here.
    #[serde(deserialize_with = "de::id_string")]
    pub employee_id: String,
    /// The employee's full name.
    pub name: String,
    /// Job title, free text.
    #[serde(default)]
    pub designation: String,
    /// Which payroll partition the employee belongs to.
    #[serde(rename = "type")]
    pub employee_type: EmployeeType,
    /// Daily pay rate in currency units.  Missing or non-numeric
    /// values resolve to zero.
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub rate_per_day: f64,
    /// Overtime hours accumulated this period.  Labour only; reset per
    /// period by the month-end module.
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub ot_hours: f64,
    /// Fixed deduction amount maintained outside attendance.  Staff only.
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub deductions: f64,
}

/// One employee's attendance for a period: a sparse mapping from
/// day-of-month (1..=31) to a free-text status cell.
///
/// Unrecognised statuses are valid input; the classifier treats them as
/// neutral.  Day keys beyond the period's day count are ignored when
/// tallying.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(default, deserialize_with = "de::id_string")]
    pub employee_id: String,
    #[serde(default)]
    pub name: String,
    /// Partition tag carried by the store row; the matcher does not
    /// consult it because records are already fetched per partition.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub employee_type: Option<EmployeeType>,
    /// Day-of-month to status cell.  Serialises as a JSON object with
    /// string keys, the shape the tabular store produces.
    #[serde(default)]
    pub days: HashMap<u8, String>,
}

/// Identifies one payroll run: a type partition plus a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPeriod {
    #[serde(rename = "type")]
    pub employee_type: EmployeeType,
    pub year: i32,
    /// Calendar month, 1..=12.
    pub month: u32,
}

impl PayPeriod {
    pub fn new(employee_type: EmployeeType, year: i32, month: u32) -> Self {
        Self { employee_type, year, month }
    }

    /// Namespaced key under which this period's local draft is stored.
    pub fn draft_key(&self) -> String {
        format!("payroll_draft_{}_{}_{}", self.employee_type, self.year, self.month)
    }
}

impl fmt::Display for PayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}-{:02}", self.employee_type, self.year, self.month)
    }
}

/// One computed payroll result row.
///
/// A single struct covers both partitions; the labour-only fields
/// (absences, overtime, salary before OT) are `None` on staff rows and
/// omitted from serialised output.  `deduction_amount` is reported but
/// not subtracted from `net_salary` in either variant; consumers that
/// want deductions applied do so themselves from the two independent
/// fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRow {
    #[serde(deserialize_with = "de::id_string")]
    pub employee_id: String,
    pub name: String,
    #[serde(default)]
    pub designation: String,
    pub paid_days: u32,
    /// Raw deduction-day count, before the absence penalty.
    pub deduction_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absent_days: Option<u32>,
    /// Deduction days after the absence penalty.  Labour only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_deduction_days: Option<u32>,
    pub deduction_amount: f64,
    pub rate_per_hour: f64,
    #[serde(
        rename = "salaryBeforeOT",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub salary_before_ot: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ot_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ot_pay: Option<f64>,
    pub net_salary: f64,
}

/// Names a [`PayrollRow`] field that can carry a user override.
///
/// Unit variants so the enum can key a JSON map; the wire names match
/// the row's serialised field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayField {
    PaidDays,
    DeductionDays,
    AbsentDays,
    EffectiveDeductionDays,
    DeductionAmount,
    RatePerHour,
    #[serde(rename = "salaryBeforeOT")]
    SalaryBeforeOt,
    OtHours,
    OtPay,
    NetSalary,
}

/// Per-employee field overrides, keyed by [`PayField`].
pub type FieldOverrides = HashMap<PayField, f64>;

/// Sparse override layer: canonical employee id to field overrides.
/// Absence of a key means "use the computed value"; an override equal
/// to the computed value is still an override.
pub type OverrideMap = HashMap<String, FieldOverrides>;

impl PayrollRow {
    /// Reads the named field as a float.  Labour-only fields read as
    /// zero on rows where they are absent.
    pub fn field(&self, field: PayField) -> f64 {
        match field {
            PayField::PaidDays => self.paid_days as f64,
            PayField::DeductionDays => self.deduction_days as f64,
            PayField::AbsentDays => self.absent_days.unwrap_or(0) as f64,
            PayField::EffectiveDeductionDays => {
                self.effective_deduction_days.unwrap_or(0) as f64
            }
            PayField::DeductionAmount => self.deduction_amount,
            PayField::RatePerHour => self.rate_per_hour,
            PayField::SalaryBeforeOt => self.salary_before_ot.unwrap_or(0.0),
            PayField::OtHours => self.ot_hours.unwrap_or(0.0),
            PayField::OtPay => self.ot_pay.unwrap_or(0.0),
            PayField::NetSalary => self.net_salary,
        }
    }

    /// Writes the named field.  Day-count fields round to the nearest
    /// whole day and clamp at zero.
    pub fn set_field(&mut self, field: PayField, value: f64) {
        let days = value.max(0.0).round() as u32;
        match field {
            PayField::PaidDays => self.paid_days = days,
            PayField::DeductionDays => self.deduction_days = days,
            PayField::AbsentDays => self.absent_days = Some(days),
            PayField::EffectiveDeductionDays => self.effective_deduction_days = Some(days),
            PayField::DeductionAmount => self.deduction_amount = value,
            PayField::RatePerHour => self.rate_per_hour = value,
            PayField::SalaryBeforeOt => self.salary_before_ot = Some(value),
            PayField::OtHours => self.ot_hours = Some(value),
            PayField::OtPay => self.ot_pay = Some(value),
            PayField::NetSalary => self.net_salary = value,
        }
    }

    /// Returns a copy of this row with the given overrides applied.
    /// Pure and total: `None` or an empty map yields an identical copy,
    /// and the receiver is never mutated.
    pub fn with_overrides(&self, overrides: Option<&FieldOverrides>) -> PayrollRow {
        let mut merged = self.clone();
        if let Some(fields) = overrides {
            for (field, value) in fields {
                merged.set_field(*field, *value);
            }
        }
        merged
    }
}

/// How a saved payroll row is paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
}

impl PaymentMethod {
    pub fn is_cash(self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

/// A payroll row annotated for persistence: the display row plus its
/// cash/bank classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRow {
    #[serde(flatten)]
    pub row: PayrollRow,
    pub is_cash: bool,
    pub payment_method: PaymentMethod,
}

/// Schema version written into every draft.  A stored draft whose
/// version differs is treated as absent; no migration is attempted.
pub const DRAFT_SCHEMA_VERSION: u32 = 1;

/// Locally persisted snapshot of unsaved edits for one pay period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    #[serde(default)]
    pub overrides: OverrideMap,
    #[serde(default)]
    pub selected_ids: Vec<String>,
    #[serde(default)]
    pub cash_employee_ids: Vec<String>,
    pub saved_at: DateTime<Utc>,
    pub version: u32,
}

/// Canonical string form of an employee id.  Applied at every set and
/// map boundary so that numeric and string ids from different sources
/// compare equal.
pub fn canonical_id(raw: &str) -> String {
    raw.trim().to_string()
}

/// Rounds a currency amount to two decimals, the precision every
/// emitted monetary field carries.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

mod de {
    //! Lenient deserialisers for spreadsheet-sourced values.

    use serde::de::{Deserializer, Error, Visitor};
    use std::fmt;

    /// Accepts a JSON string or number and yields its string form.
    pub fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = String;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or numeric identifier")
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<String, E> {
                Ok(v.to_string())
            }

            fn visit_u64<E: Error>(self, v: u64) -> Result<String, E> {
                Ok(v.to_string())
            }

            fn visit_i64<E: Error>(self, v: i64) -> Result<String, E> {
                Ok(v.to_string())
            }

            fn visit_f64<E: Error>(self, v: f64) -> Result<String, E> {
                Ok(v.to_string())
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }

    /// Accepts a number, a numeric string, or null; anything that does
    /// not parse resolves to zero.
    pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NumVisitor;

        impl<'de> Visitor<'de> for NumVisitor {
            type Value = f64;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number, numeric string, or null")
            }

            fn visit_f64<E: Error>(self, v: f64) -> Result<f64, E> {
                Ok(v)
            }

            fn visit_u64<E: Error>(self, v: u64) -> Result<f64, E> {
                Ok(v as f64)
            }

            fn visit_i64<E: Error>(self, v: i64) -> Result<f64, E> {
                Ok(v as f64)
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<f64, E> {
                Ok(v.trim().parse().unwrap_or(0.0))
            }

            fn visit_unit<E: Error>(self) -> Result<f64, E> {
                Ok(0.0)
            }

            fn visit_none<E: Error>(self) -> Result<f64, E> {
                Ok(0.0)
            }
        }

        deserializer.deserialize_any(NumVisitor)
    }
}
