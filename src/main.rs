//! Entry point for the payroll engine binary.
//!
//! Running this binary computes one payroll run from a JSON roster on
//! disk and prints the result rows plus totals as JSON.  The directory
//! containing `employees.json` and `attendance.json` may be specified
//! via the `PAYROLL_DATA_DIR` environment variable (default `data`),
//! and the partition to calculate via `PAYROLL_TYPE` (`labour` or
//! `staff`, default `labour`).

use anyhow::{Context, Result};
use payroll_engine::models::EmployeeType;
use payroll_engine::{engine, report, store};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let data_dir = PathBuf::from(
        std::env::var("PAYROLL_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
    );
    let employee_type: EmployeeType = std::env::var("PAYROLL_TYPE")
        .unwrap_or_else(|_| "labour".to_string())
        .parse()?;

    let employees = store::load_employees_from_file(&data_dir.join("employees.json"))
        .with_context(|| format!("loading employees from {}", data_dir.display()))?;
    let attendance = store::load_attendance_from_file(&data_dir.join("attendance.json"))
        .with_context(|| format!("loading attendance from {}", data_dir.display()))?;
    info!(
        employees = employees.len(),
        attendance = attendance.len(),
        %employee_type,
        "roster loaded"
    );

    let rows = engine::calculate(employee_type, &employees, &attendance);
    let totals = report::summarize(&rows, &HashSet::new());

    println!("{}", serde_json::to_string_pretty(&rows)?);
    println!("{}", serde_json::to_string_pretty(&totals)?);
    info!(rows = rows.len(), net_salary = totals.net_salary, "payroll computed");
    Ok(())
}
