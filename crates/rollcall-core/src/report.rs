//! Monthly report aggregation over daily record files.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::Serialize;
use thiserror::Error;

use crate::roster::{Roster, RosterError};
use crate::store::{RecordStore, StoreError};
use crate::types::{AttendanceStatus, EventKind};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("invalid report period {year}-{month:02}")]
    InvalidPeriod { year: i32, month: u32 },
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// Aggregated month of attendance for one employee.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberSummary {
    pub employee_id: String,
    /// Display name from the roster; `None` when events reference an id
    /// that was never registered (kept rather than dropped).
    pub name: Option<String>,
    pub days_present: u32,
    pub late_count: u32,
    /// Mean check-in time (integer seconds since midnight, floored);
    /// `None` when the employee has no check-ins in the month.
    pub mean_check_in: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    /// One row per employee, sorted by id. Registered employees always
    /// appear, absentees with zero counts.
    pub rows: Vec<MemberSummary>,
    /// Number of daily record files found in the month.
    pub days_with_records: u32,
    /// Total events parsed across those files.
    pub events: u32,
}

#[derive(Default)]
struct Acc {
    name: Option<String>,
    check_ins: u32,
    late: u32,
    total_seconds: u64,
    days: BTreeSet<NaiveDate>,
}

/// Fold one month of daily record files into per-employee totals.
///
/// By default `days_present` counts check-in events, so a duplicate
/// same-day check-in counts twice, exactly what the stored files say.
/// With `distinct_days` it counts distinct dates with at least one
/// check-in instead. `late_count` and `mean_check_in` always use every
/// check-in event; check-out events never contribute to any total.
///
/// Missing day files are skipped; any other storage failure aborts.
/// Deterministic for a fixed set of files: rerunning without writes
/// produces an identical report.
pub fn generate(
    store: &RecordStore,
    roster: &Roster,
    year: i32,
    month: u32,
    distinct_days: bool,
) -> Result<MonthlyReport, ReportError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(ReportError::InvalidPeriod { year, month })?;

    // Seed with the roster so absentees get zero rows.
    let mut acc: BTreeMap<String, Acc> = BTreeMap::new();
    for employee in roster.list()? {
        acc.insert(
            employee.id,
            Acc {
                name: Some(employee.name),
                ..Acc::default()
            },
        );
    }

    let mut days_with_records = 0u32;
    let mut events_total = 0u32;

    for day in first.iter_days().take_while(|d| d.month() == month) {
        let events = match store.read(day) {
            Ok(events) => events,
            Err(StoreError::NotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        days_with_records += 1;

        for event in events {
            events_total += 1;
            if event.kind != EventKind::CheckIn {
                continue;
            }
            let entry = acc.entry(event.employee_id).or_default();
            entry.check_ins += 1;
            entry.days.insert(event.date);
            entry.total_seconds += u64::from(event.time.num_seconds_from_midnight());
            if event.status == AttendanceStatus::Late {
                entry.late += 1;
            }
        }
    }

    let rows = acc
        .into_iter()
        .map(|(employee_id, a)| {
            let days_present = if distinct_days {
                a.days.len() as u32
            } else {
                a.check_ins
            };
            let mean_check_in = if a.check_ins > 0 {
                let secs = (a.total_seconds / u64::from(a.check_ins)) as u32;
                NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)
            } else {
                None
            };
            MemberSummary {
                employee_id,
                name: a.name,
                days_present,
                late_count: a.late,
                mean_check_in,
            }
        })
        .collect();

    Ok(MonthlyReport {
        year,
        month,
        rows,
        days_with_records,
        events: events_total,
    })
}
