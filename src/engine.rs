//! Payroll computation engine.
//!
//! The `engine` module turns a roster of employees plus their matched
//! attendance records into payroll result rows.  It uses the [`rayon`]
//! crate to parallelise per-employee calculations across CPU cores;
//! each row is a pure function of one employee and one attendance
//! record, so the parallel map is deterministic and order preserving.
//!
//! Two calculator variants exist.  Labour pay carries overtime and an
//! absence penalty; staff pay carries a fixed externally maintained
//! deduction instead.  In both variants the deduction amount is
//! reported alongside the net salary rather than subtracted from it,
//! matching the approval workflow downstream.

use crate::attendance::tally_days;
use crate::models::{canonical_id, round2, AttendanceRecord, Employee, EmployeeType, PayrollRow};
use rayon::prelude::*;

/// Working hours assumed per paid day when deriving the hourly rate.
const HOURS_PER_DAY: f64 = 8.0;

/// Overtime premium applied on top of the hourly rate.
const OT_RATE_MULTIPLIER: f64 = 1.25;

/// Absences above this count are each charged as two deduction days.
const ABSENCE_PENALTY_THRESHOLD: u32 = 3;

/// Fixed period length for the staff calculator.
const STAFF_DAYS_IN_MONTH: u8 = 30;

/// Resolves the attendance record belonging to an employee.
///
/// First pass matches on canonical id equality across all records;
/// only when no id matches does a second pass fall back to trimmed,
/// case-insensitive name equality.  Blank names never match.  There is
/// no fuzzy matching beyond this.
pub fn match_attendance<'a>(
    employee: &Employee,
    attendance: &'a [AttendanceRecord],
) -> Option<&'a AttendanceRecord> {
    let id = canonical_id(&employee.employee_id);
    if let Some(found) = attendance
        .iter()
        .find(|rec| canonical_id(&rec.employee_id) == id)
    {
        return Some(found);
    }
    let name = employee.name.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }
    attendance.iter().find(|rec| {
        let rec_name = rec.name.trim();
        !rec_name.is_empty() && rec_name.to_lowercase() == name
    })
}

/// Runs the calculator matching the given partition.
pub fn calculate(
    employee_type: EmployeeType,
    employees: &[Employee],
    attendance: &[AttendanceRecord],
) -> Vec<PayrollRow> {
    match employee_type {
        EmployeeType::Labour => calculate_labour(employees, attendance),
        EmployeeType::Staff => calculate_staff(employees, attendance),
    }
}

/// Labour payroll: overtime pay plus the absence penalty rule.
///
/// Emits exactly one row per input employee, in input order.  An
/// employee with no matching attendance record still gets a row with
/// all numeric fields zero, preserving row-for-row correspondence with
/// the employee list.
pub fn calculate_labour(
    employees: &[Employee],
    attendance: &[AttendanceRecord],
) -> Vec<PayrollRow> {
    employees
        .par_iter()
        .map(|emp| labour_row(emp, attendance))
        .collect()
}

fn labour_row(emp: &Employee, attendance: &[AttendanceRecord]) -> PayrollRow {
    let Some(record) = match_attendance(emp, attendance) else {
        return zero_row(emp, EmployeeType::Labour);
    };

    let days_in_month = record.days_in_month();
    let tally = tally_days(record, days_in_month);

    let rate_per_day = emp.rate_per_day;
    let rate_per_hour = rate_per_day / HOURS_PER_DAY;
    let salary_before_ot = rate_per_day * tally.paid as f64;

    // Past the threshold every absent day is charged double; at or
    // below it the raw deduction count stands.
    let effective_deduction_days = if tally.absent > ABSENCE_PENALTY_THRESHOLD {
        (tally.deduction - tally.absent) + tally.absent * 2
    } else {
        tally.deduction
    };
    let deduction_amount = rate_per_day * effective_deduction_days as f64;

    let ot_hours = emp.ot_hours;
    let ot_pay = ot_hours * rate_per_hour * OT_RATE_MULTIPLIER;
    let net_salary = salary_before_ot + ot_pay;

    PayrollRow {
        employee_id: emp.employee_id.clone(),
        name: emp.name.clone(),
        designation: emp.designation.clone(),
        paid_days: tally.paid,
        deduction_days: tally.deduction,
        absent_days: Some(tally.absent),
        effective_deduction_days: Some(effective_deduction_days),
        deduction_amount: round2(deduction_amount),
        rate_per_hour: round2(rate_per_hour),
        salary_before_ot: Some(round2(salary_before_ot)),
        ot_hours: Some(round2(ot_hours)),
        ot_pay: Some(round2(ot_pay)),
        net_salary: round2(net_salary),
    }
}

/// Staff payroll: no overtime, no absence penalty, fixed 30-day month.
///
/// The employee's externally maintained `deductions` figure is folded
/// into the reported deduction amount and subtracted from net pay; the
/// attendance-based deduction is reported only.
pub fn calculate_staff(
    employees: &[Employee],
    attendance: &[AttendanceRecord],
) -> Vec<PayrollRow> {
    employees
        .par_iter()
        .map(|emp| staff_row(emp, attendance))
        .collect()
}

fn staff_row(emp: &Employee, attendance: &[AttendanceRecord]) -> PayrollRow {
    let Some(record) = match_attendance(emp, attendance) else {
        return zero_row(emp, EmployeeType::Staff);
    };

    let tally = tally_days(record, STAFF_DAYS_IN_MONTH);

    let rate_per_day = emp.rate_per_day;
    let rate_per_hour = rate_per_day / HOURS_PER_DAY;
    let gross_salary = rate_per_day * tally.paid as f64;
    let attendance_deduction = rate_per_day * tally.deduction as f64;
    let other_deductions = emp.deductions;
    let net_salary = gross_salary - other_deductions;

    PayrollRow {
        employee_id: emp.employee_id.clone(),
        name: emp.name.clone(),
        designation: emp.designation.clone(),
        paid_days: tally.paid,
        deduction_days: tally.deduction,
        absent_days: None,
        effective_deduction_days: None,
        deduction_amount: round2(attendance_deduction + other_deductions),
        rate_per_hour: round2(rate_per_hour),
        salary_before_ot: None,
        ot_hours: None,
        ot_pay: None,
        net_salary: round2(net_salary),
    }
}

/// Row emitted for an employee with no attendance record: identity
/// fields carried over, every numeric field zero.
fn zero_row(emp: &Employee, employee_type: EmployeeType) -> PayrollRow {
    let labour = employee_type == EmployeeType::Labour;
    PayrollRow {
        employee_id: emp.employee_id.clone(),
        name: emp.name.clone(),
        designation: emp.designation.clone(),
        paid_days: 0,
        deduction_days: 0,
        absent_days: labour.then_some(0),
        effective_deduction_days: labour.then_some(0),
        deduction_amount: 0.0,
        rate_per_hour: 0.0,
        salary_before_ot: labour.then_some(0.0),
        ot_hours: labour.then_some(0.0),
        ot_pay: labour.then_some(0.0),
        net_salary: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn employee(id: &str, name: &str, rate: f64) -> Employee {
        Employee {
            employee_id: id.into(),
            name: name.into(),
            designation: "Mason".into(),
            employee_type: EmployeeType::Labour,
            rate_per_day: rate,
            ot_hours: 0.0,
            deductions: 0.0,
        }
    }

    fn attendance(id: &str, name: &str, days: &[(u8, &str)]) -> AttendanceRecord {
        AttendanceRecord {
            employee_id: id.into(),
            name: name.into(),
            employee_type: None,
            days: days
                .iter()
                .map(|(d, s)| (*d, s.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    /// Appends `count` consecutive days of `status` starting at `from`.
    fn fill(days: &mut Vec<(u8, String)>, from: u8, count: u8, status: &str) {
        for day in from..from + count {
            days.push((day, status.to_string()));
        }
    }

    fn month(segments: &[(u8, &str)]) -> AttendanceRecord {
        let mut days = Vec::new();
        let mut next = 1u8;
        for (count, status) in segments {
            fill(&mut days, next, *count, status);
            next += count;
        }
        AttendanceRecord {
            employee_id: "1".into(),
            name: "Arun".into(),
            employee_type: None,
            days: days.into_iter().collect(),
        }
    }

    #[test]
    fn matcher_prefers_id_over_name() {
        let emp = employee("7", "Arun", 100.0);
        let by_name = attendance("99", "arun", &[(1, "Present")]);
        let by_id = attendance("7", "someone else", &[(1, "Absent")]);
        let records = vec![by_name, by_id];
        let found = match_attendance(&emp, &records).unwrap();
        assert_eq!(found.employee_id, "7");
    }

    #[test]
    fn matcher_falls_back_to_trimmed_case_insensitive_name() {
        let emp = employee("7", "  Arun Kumar ", 100.0);
        let records = vec![attendance("x-1", "arun kumar", &[(1, "Present")])];
        assert!(match_attendance(&emp, &records).is_some());
    }

    #[test]
    fn matcher_normalises_id_whitespace() {
        let emp = employee(" 7", "Arun", 100.0);
        let records = vec![attendance("7 ", "other", &[])];
        assert!(match_attendance(&emp, &records).is_some());
    }

    #[test]
    fn matcher_ignores_blank_names_and_near_misses() {
        let emp = employee("7", "", 100.0);
        let records = vec![attendance("8", "", &[]), attendance("9", "Aron", &[])];
        assert!(match_attendance(&emp, &records).is_none());
    }

    #[test]
    fn unmatched_employee_still_emits_zero_row_in_place() {
        let employees = vec![
            employee("1", "Arun", 100.0),
            employee("2", "Noor", 120.0),
            employee("3", "Sami", 90.0),
        ];
        let records = vec![
            attendance("1", "Arun", &[(1, "Present")]),
            attendance("3", "Sami", &[(1, "Present")]),
        ];
        let rows = calculate_labour(&employees, &records);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].employee_id, "2");
        assert_eq!(rows[1].paid_days, 0);
        assert_eq!(rows[1].deduction_days, 0);
        assert_eq!(rows[1].net_salary, 0.0);
        assert_eq!(rows[1].ot_pay, Some(0.0));
    }

    #[test]
    fn penalty_holds_off_at_exactly_three_absences() {
        // 5 deduction days of which 3 absent: no penalty.
        let rec = month(&[(22, "Present"), (2, "Leave"), (3, "Absent")]);
        let rows = calculate_labour(&[employee("1", "Arun", 100.0)], &[rec]);
        assert_eq!(rows[0].deduction_days, 5);
        assert_eq!(rows[0].absent_days, Some(3));
        assert_eq!(rows[0].effective_deduction_days, Some(5));
    }

    #[test]
    fn penalty_doubles_absences_past_three() {
        // 5 deduction days of which 4 absent: (5-4) + 4*2 = 9.
        let rec = month(&[(21, "Present"), (1, "Leave"), (4, "Absent")]);
        let rows = calculate_labour(&[employee("1", "Arun", 100.0)], &[rec]);
        assert_eq!(rows[0].deduction_days, 5);
        assert_eq!(rows[0].absent_days, Some(4));
        assert_eq!(rows[0].effective_deduction_days, Some(9));
        assert_eq!(rows[0].deduction_amount, 900.0);
    }

    #[test]
    fn ot_pay_uses_a_quarter_premium_on_the_hourly_rate() {
        let mut emp = employee("1", "Arun", 80.0);
        emp.ot_hours = 4.0;
        let rec = month(&[(30, "Present")]);
        let rows = calculate_labour(&[emp], &[rec]);
        assert_eq!(rows[0].rate_per_hour, 10.0);
        assert_eq!(rows[0].ot_pay, Some(50.0));
    }

    #[test]
    fn labour_month_end_to_end() {
        // 30-day month: 22 Present, 3 Off, 2 Absent, 3 blank.
        let mut emp = employee("1", "Arun", 100.0);
        emp.ot_hours = 10.0;
        let rec = month(&[(22, "Present"), (3, "Off"), (2, "Absent"), (3, "")]);
        let rows = calculate_labour(&[emp], &[rec]);
        let row = &rows[0];
        assert_eq!(row.paid_days, 25);
        assert_eq!(row.deduction_days, 2);
        assert_eq!(row.absent_days, Some(2));
        assert_eq!(row.effective_deduction_days, Some(2));
        assert_eq!(row.deduction_amount, 200.0);
        assert_eq!(row.salary_before_ot, Some(2500.0));
        assert_eq!(row.ot_pay, Some(156.25));
        assert_eq!(row.net_salary, 2656.25);
    }

    #[test]
    fn labour_month_with_heavy_absence_pays_the_penalty() {
        let rec = month(&[(19, "Present"), (3, "Off"), (5, "Absent"), (3, "")]);
        let rows = calculate_labour(&[employee("1", "Arun", 100.0)], &[rec]);
        let row = &rows[0];
        assert_eq!(row.paid_days, 22);
        assert_eq!(row.absent_days, Some(5));
        // (5 - 5) + 5*2 = 10 effective deduction days.
        assert_eq!(row.effective_deduction_days, Some(10));
        assert_eq!(row.deduction_amount, 1000.0);
        // Net still ignores deductions.
        assert_eq!(row.net_salary, 2200.0);
    }

    #[test]
    fn labour_uses_day_31_when_the_cell_is_populated() {
        let mut rec = month(&[(30, "Present")]);
        rec.days.insert(31, "Present".into());
        let rows = calculate_labour(&[employee("1", "Arun", 100.0)], &[rec]);
        assert_eq!(rows[0].paid_days, 31);
    }

    #[test]
    fn staff_month_end_to_end() {
        // 27 paid days, 2 deduction days, fixed deductions 300.
        let mut emp = employee("5", "Noor", 150.0);
        emp.employee_type = EmployeeType::Staff;
        emp.deductions = 300.0;
        let mut rec = month(&[(27, "Present"), (2, "Leave"), (1, "")]);
        rec.employee_id = "5".into();
        let rows = calculate_staff(&[emp], &[rec]);
        let row = &rows[0];
        assert_eq!(row.paid_days, 27);
        assert_eq!(row.deduction_days, 2);
        // Reported deductions fold attendance (300) and fixed (300).
        assert_eq!(row.deduction_amount, 600.0);
        // Net subtracts only the fixed deductions: 4050 - 300.
        assert_eq!(row.net_salary, 3750.0);
        assert_eq!(row.ot_pay, None);
        assert_eq!(row.salary_before_ot, None);
    }

    #[test]
    fn staff_never_counts_day_31() {
        let mut rec = month(&[(30, "Present")]);
        rec.days.insert(31, "Present".into());
        rec.employee_id = "5".into();
        let mut emp = employee("5", "Noor", 150.0);
        emp.employee_type = EmployeeType::Staff;
        let rows = calculate_staff(&[emp], &[rec]);
        assert_eq!(rows[0].paid_days, 30);
    }

    #[test]
    fn zero_rate_produces_zero_amounts_without_error() {
        let rec = month(&[(30, "Present")]);
        let rows = calculate_labour(&[employee("1", "Arun", 0.0)], &[rec]);
        assert_eq!(rows[0].paid_days, 30);
        assert_eq!(rows[0].net_salary, 0.0);
    }

    #[test]
    fn dispatch_selects_the_partition_calculator() {
        let emp = employee("1", "Arun", 100.0);
        let rec = month(&[(30, "Present")]);
        let labour = calculate(EmployeeType::Labour, &[emp.clone()], &[rec.clone()]);
        assert!(labour[0].ot_pay.is_some());
        let staff = calculate(EmployeeType::Staff, &[emp], &[rec]);
        assert!(staff[0].ot_pay.is_none());
    }
}
