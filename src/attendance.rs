//! Attendance cell classification.
//!
//! Attendance arrives as free-text cells, one per employee per day.
//! The classifier maps each cell to a [`DayKind`] that decides whether
//! the day counts toward pay, toward deductions, or toward the absence
//! tally that drives the penalty rule.  Unrecognised text is a valid,
//! silent neutral so that ad-hoc statuses in the sheet never break a
//! payroll run.

use crate::models::AttendanceRecord;

/// Classification of a single attendance cell.
///
/// `Absent` is a strict subset of deduction: an absent day counts in
/// the deduction tally and additionally in the absence tally that
/// feeds the penalty rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    Paid,
    Deduction,
    Absent,
    Neutral,
}

impl DayKind {
    /// The day counts toward gross salary.
    pub fn is_paid(self) -> bool {
        matches!(self, DayKind::Paid)
    }

    /// The day counts toward the deduction tally.  True for `Absent`
    /// as well: every absent day is also a deduction day.
    pub fn is_deduction(self) -> bool {
        matches!(self, DayKind::Deduction | DayKind::Absent)
    }

    /// The day counts toward the absence tally.
    pub fn is_absent(self) -> bool {
        matches!(self, DayKind::Absent)
    }
}

/// Classifies one attendance cell.  Total over arbitrary input:
/// matching is trimmed and case-insensitive, and anything outside the
/// recognised vocabulary is `Neutral`.
pub fn classify(status: &str) -> DayKind {
    match status.trim().to_lowercase().as_str() {
        "present" | "off" | "sick" | "p" => DayKind::Paid,
        "absent" => DayKind::Absent,
        "leave" | "joined" => DayKind::Deduction,
        _ => DayKind::Neutral,
    }
}

/// Day counts produced by walking one attendance record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayTally {
    pub paid: u32,
    pub deduction: u32,
    pub absent: u32,
}

/// Tallies days `1..=days_in_month` of a record.  Cells beyond the
/// period's day count are ignored; missing cells are neutral.
pub fn tally_days(record: &AttendanceRecord, days_in_month: u8) -> DayTally {
    let mut tally = DayTally::default();
    for day in 1..=days_in_month {
        let kind = record
            .days
            .get(&day)
            .map(|cell| classify(cell))
            .unwrap_or(DayKind::Neutral);
        if kind.is_paid() {
            tally.paid += 1;
        }
        if kind.is_deduction() {
            tally.deduction += 1;
        }
        if kind.is_absent() {
            tally.absent += 1;
        }
    }
    tally
}

impl AttendanceRecord {
    /// Number of days this record covers: 31 when the day-31 cell is
    /// present and non-blank, otherwise 30.  Inferred from the data
    /// rather than the calendar; February is not special-cased.
    pub fn days_in_month(&self) -> u8 {
        match self.days.get(&31) {
            Some(cell) if !cell.trim().is_empty() => 31,
            _ => 30,
        }
    }

    /// The raw status cell for a day, if one exists.
    pub fn status(&self, day: u8) -> Option<&str> {
        self.days.get(&day).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(days: &[(u8, &str)]) -> AttendanceRecord {
        AttendanceRecord {
            employee_id: "1".into(),
            name: "Test".into(),
            employee_type: None,
            days: days
                .iter()
                .map(|(d, s)| (*d, s.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn paid_statuses_are_case_insensitive_and_trimmed() {
        for cell in ["Present", "present", " PRESENT ", "Off", "sick", "P", "p"] {
            assert!(classify(cell).is_paid(), "{cell:?} should be paid");
        }
    }

    #[test]
    fn absent_counts_as_both_deduction_and_absent() {
        for cell in ["absent", "ABSENT", " Absent "] {
            let kind = classify(cell);
            assert!(kind.is_deduction());
            assert!(kind.is_absent());
            assert!(!kind.is_paid());
        }
        assert_eq!(classify("ABSENT"), classify("absent"));
    }

    #[test]
    fn leave_and_joined_deduct_without_counting_absent() {
        for cell in ["Leave", "joined"] {
            let kind = classify(cell);
            assert!(kind.is_deduction());
            assert!(!kind.is_absent());
        }
    }

    #[test]
    fn anything_else_is_neutral() {
        for cell in ["", "  ", "WFH", "half-day", "présent", "??", "0"] {
            let kind = classify(cell);
            assert!(!kind.is_paid());
            assert!(!kind.is_deduction());
            assert!(!kind.is_absent());
        }
    }

    #[test]
    fn day_31_heuristic() {
        assert_eq!(record(&[(31, "Present")]).days_in_month(), 31);
        assert_eq!(record(&[(31, "x")]).days_in_month(), 31);
        assert_eq!(record(&[(31, "   ")]).days_in_month(), 30);
        assert_eq!(record(&[(1, "Present")]).days_in_month(), 30);
    }

    #[test]
    fn tally_ignores_days_beyond_the_period() {
        let rec = record(&[(1, "Present"), (2, "Absent"), (3, "Leave"), (31, "Present")]);
        let tally = tally_days(&rec, 30);
        assert_eq!(tally, DayTally { paid: 1, deduction: 2, absent: 1 });
        let tally31 = tally_days(&rec, 31);
        assert_eq!(tally31.paid, 2);
    }

    #[test]
    fn tally_of_empty_record_is_zero() {
        assert_eq!(tally_days(&record(&[]), 30), DayTally::default());
    }
}
