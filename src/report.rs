//! Payment-method partition and payroll totals.
//!
//! Classification into cash and bank rows is a lookup against the
//! cash-flag set with ids canonicalised on both sides; totals are a
//! plain reduction over display rows and tolerate an empty set.

use crate::models::{canonical_id, PayrollRow};
use serde::Serialize;
use std::collections::HashSet;

/// Narrowing of a row set by payout channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentFilter {
    All,
    Bank,
    Cash,
}

/// Aggregates over a set of display rows, including the bank/cash
/// salary split used by the payout reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollTotals {
    pub count: usize,
    pub paid_days: u32,
    pub deduction_amount: f64,
    #[serde(rename = "salaryBeforeOT")]
    pub salary_before_ot: f64,
    pub ot_pay: f64,
    pub net_salary: f64,
    pub bank_salary: f64,
    pub cash_salary: f64,
    pub bank_count: usize,
    pub cash_count: usize,
}

/// Whether the row belongs to the cash partition.  Ids are
/// canonicalised before the lookup so numeric and string forms from
/// different sources agree.
pub fn is_cash_member(cash_ids: &HashSet<String>, employee_id: &str) -> bool {
    cash_ids.contains(&canonical_id(employee_id))
}

/// Reduces a row set to its totals.  Labour-only fields read as zero
/// on staff rows; an empty row set yields zero totals.
pub fn summarize(rows: &[PayrollRow], cash_ids: &HashSet<String>) -> PayrollTotals {
    let mut totals = PayrollTotals::default();
    for row in rows {
        totals.count += 1;
        totals.paid_days += row.paid_days;
        totals.deduction_amount += row.deduction_amount;
        totals.salary_before_ot += row.salary_before_ot.unwrap_or(0.0);
        totals.ot_pay += row.ot_pay.unwrap_or(0.0);
        totals.net_salary += row.net_salary;
        if is_cash_member(cash_ids, &row.employee_id) {
            totals.cash_salary += row.net_salary;
            totals.cash_count += 1;
        } else {
            totals.bank_salary += row.net_salary;
            totals.bank_count += 1;
        }
    }
    totals
}

/// Narrows rows to one payout channel.  `All` passes through.
pub fn filter_rows(
    rows: Vec<PayrollRow>,
    cash_ids: &HashSet<String>,
    filter: PaymentFilter,
) -> Vec<PayrollRow> {
    match filter {
        PaymentFilter::All => rows,
        PaymentFilter::Cash => rows
            .into_iter()
            .filter(|row| is_cash_member(cash_ids, &row.employee_id))
            .collect(),
        PaymentFilter::Bank => rows
            .into_iter()
            .filter(|row| !is_cash_member(cash_ids, &row.employee_id))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, net: f64, ot_pay: Option<f64>) -> PayrollRow {
        PayrollRow {
            employee_id: id.into(),
            name: format!("Employee {id}"),
            designation: String::new(),
            paid_days: 25,
            deduction_days: 1,
            absent_days: None,
            effective_deduction_days: None,
            deduction_amount: 100.0,
            rate_per_hour: 10.0,
            salary_before_ot: ot_pay.map(|_| net),
            ot_hours: None,
            ot_pay,
            net_salary: net,
        }
    }

    fn cash(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_row_set_yields_zero_totals() {
        assert_eq!(summarize(&[], &cash(&[])), PayrollTotals::default());
    }

    #[test]
    fn totals_split_net_salary_by_payout_channel() {
        let rows = vec![
            row("1", 2000.0, Some(50.0)),
            row("2", 3000.0, None),
            row("3", 1000.0, None),
        ];
        let totals = summarize(&rows, &cash(&["2"]));
        assert_eq!(totals.count, 3);
        assert_eq!(totals.paid_days, 75);
        assert_eq!(totals.deduction_amount, 300.0);
        assert_eq!(totals.ot_pay, 50.0);
        assert_eq!(totals.net_salary, 6000.0);
        assert_eq!(totals.cash_salary, 3000.0);
        assert_eq!(totals.bank_salary, 3000.0);
        assert_eq!(totals.cash_count, 1);
        assert_eq!(totals.bank_count, 2);
    }

    #[test]
    fn membership_lookup_normalises_ids() {
        let flags = cash(&["42"]);
        assert!(is_cash_member(&flags, " 42 "));
        assert!(!is_cash_member(&flags, "421"));
    }

    #[test]
    fn filter_partitions_rows() {
        let rows = vec![row("1", 1.0, None), row("2", 2.0, None)];
        let flags = cash(&["1"]);
        assert_eq!(filter_rows(rows.clone(), &flags, PaymentFilter::All).len(), 2);
        let cash_rows = filter_rows(rows.clone(), &flags, PaymentFilter::Cash);
        assert_eq!(cash_rows.len(), 1);
        assert_eq!(cash_rows[0].employee_id, "1");
        let bank_rows = filter_rows(rows, &flags, PaymentFilter::Bank);
        assert_eq!(bank_rows.len(), 1);
        assert_eq!(bank_rows[0].employee_id, "2");
    }
}
