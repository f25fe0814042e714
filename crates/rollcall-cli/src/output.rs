//! Terminal rendering for reports, listings, and session announcements.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::NaiveDate;
use clap::ValueEnum;

use rollcall_core::config::UiConfig;
use rollcall_core::csv;
use rollcall_core::types::{AttendanceEvent, AttendanceStatus, Employee, EventKind};
use rollcall_core::MonthlyReport;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Terminal bell, printed after a recorded event when `ui.bell` is set.
pub const BELL: &str = "\x07";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns for the terminal.
    Table,
    /// One header row plus one row per employee.
    Csv,
    /// The full report object, pretty-printed.
    Json,
}

/// Render a monthly report in the requested format.
///
/// Every format ends with a trailing newline so the result can be written
/// to a terminal or a file as-is.
pub fn render_report(report: &MonthlyReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Table => Ok(report_table(report)),
        OutputFormat::Csv => Ok(report_csv(report)),
        OutputFormat::Json => {
            let mut text = serde_json::to_string_pretty(report)?;
            text.push('\n');
            Ok(text)
        }
    }
}

fn report_table(report: &MonthlyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "attendance {}-{:02}: {} employees, {} events across {} days",
        report.year,
        report.month,
        report.rows.len(),
        report.events,
        report.days_with_records,
    );
    out.push('\n');

    let id_w = column_width("ID", report.rows.iter().map(|r| r.employee_id.as_str()));
    let name_w = column_width(
        "NAME",
        report.rows.iter().map(|r| r.name.as_deref().unwrap_or("-")),
    );
    let _ = writeln!(
        out,
        "{:<id_w$}  {:<name_w$}  {:>4}  {:>4}  AVG CHECK-IN",
        "ID", "NAME", "DAYS", "LATE",
    );
    for row in &report.rows {
        let mean = row
            .mean_check_in
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<id_w$}  {:<name_w$}  {:>4}  {:>4}  {}",
            row.employee_id,
            row.name.as_deref().unwrap_or("-"),
            row.days_present,
            row.late_count,
            mean,
        );
    }
    out
}

fn report_csv(report: &MonthlyReport) -> String {
    let mut out = String::new();
    out.push_str("employee_id,name,days_present,late_count,mean_check_in\n");
    for row in &report.rows {
        let days = row.days_present.to_string();
        let late = row.late_count.to_string();
        let mean = row
            .mean_check_in
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        let line = csv::format_row(&[
            &row.employee_id,
            row.name.as_deref().unwrap_or(""),
            &days,
            &late,
            &mean,
        ]);
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Render one day of raw events, joined with roster names.
pub fn render_day(
    date: NaiveDate,
    events: &[AttendanceEvent],
    names: &HashMap<String, String>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "records for {date}: {} events", events.len());
    out.push('\n');

    let id_w = column_width("ID", events.iter().map(|e| e.employee_id.as_str()));
    let name_w = column_width(
        "NAME",
        events
            .iter()
            .map(|e| names.get(&e.employee_id).map(String::as_str).unwrap_or("-")),
    );
    let _ = writeln!(
        out,
        "{:<8}  {:<id_w$}  {:<name_w$}  {:<9}  STATUS",
        "TIME", "ID", "NAME", "KIND",
    );
    for event in events {
        let name = names
            .get(&event.employee_id)
            .map(String::as_str)
            .unwrap_or("-");
        let _ = writeln!(
            out,
            "{:<8}  {:<id_w$}  {:<name_w$}  {:<9}  {}",
            event.time.format("%H:%M:%S").to_string(),
            event.employee_id,
            name,
            event.kind.as_str(),
            event.status.as_str(),
        );
    }
    out
}

/// Render the registered roster, sorted the way the roster returns it.
pub fn render_employees(employees: &[Employee]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} registered", employees.len());
    out.push('\n');

    let id_w = column_width("ID", employees.iter().map(|e| e.id.as_str()));
    let name_w = column_width("NAME", employees.iter().map(|e| e.name.as_str()));
    let _ = writeln!(out, "{:<id_w$}  {:<name_w$}  REGISTERED", "ID", "NAME");
    for employee in employees {
        let _ = writeln!(
            out,
            "{:<id_w$}  {:<name_w$}  {}",
            employee.id,
            employee.name,
            employee.registered_at.format("%Y-%m-%d %H:%M"),
        );
    }
    out
}

/// Wrap a session announcement in a status color when color is enabled.
pub fn paint_status(text: &str, status: AttendanceStatus, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    let code = match status {
        AttendanceStatus::OnTime => GREEN,
        AttendanceStatus::Late => YELLOW,
    };
    format!("{code}{text}{RESET}")
}

/// Operator-facing label for the current mode.
pub fn mode_label(kind: EventKind, ui: &UiConfig) -> &str {
    match kind {
        EventKind::CheckIn => &ui.checkin_label,
        EventKind::CheckOut => &ui.checkout_label,
    }
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(str::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(header.len())
}
