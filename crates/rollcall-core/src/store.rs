//! Per-day CSV record store.
//!
//! One file per calendar day under the records directory, e.g.
//! `attendance_2026-08-25.csv`. Rows are append-only and written through
//! a scoped handle: open, append, sync, close on every call. No locking;
//! the kiosk is the single writer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::csv;
use crate::types::{AttendanceEvent, AttendanceStatus, EventKind};

/// Column header written at the top of every daily record file.
pub const HEADER: &str = "employee_id,date,time,kind,status";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no records for {0}")]
    NotFound(NaiveDate),
    #[error("record store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Handle to the records directory.
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the daily record file for `date`.
    pub fn daily_path(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(format!("attendance_{}.csv", date.format(DATE_FORMAT)))
    }

    /// Append one event to its day file, creating directory and file as
    /// needed. The header row is written when the file is empty. The data
    /// is synced before the handle closes.
    pub fn append(&self, event: &AttendanceEvent) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;

        let path = self.daily_path(event.date);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;

        let empty = file.metadata().map_err(|e| io_err(&path, e))?.len() == 0;

        let mut buf = String::new();
        if empty {
            buf.push_str(HEADER);
            buf.push('\n');
        }
        buf.push_str(&format_event(event));
        buf.push('\n');

        file.write_all(buf.as_bytes()).map_err(|e| io_err(&path, e))?;
        file.sync_all().map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    /// Read all events for `date` in file order.
    ///
    /// A missing file is [`StoreError::NotFound`]; callers that treat a
    /// day without records as empty match on it. Malformed rows (wrong
    /// column count, unparseable field) are skipped with a warning so one
    /// corrupt line cannot sink a whole report.
    pub fn read(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>, StoreError> {
        let path = self.daily_path(date);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(date));
            }
            Err(e) => return Err(io_err(&path, e)),
        };

        let reader = BufReader::new(file);
        let mut events = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| io_err(&path, e))?;
            if idx == 0 && line == HEADER {
                continue;
            }
            if line.is_empty() {
                continue;
            }
            match parse_event(&line) {
                Ok(event) => events.push(event),
                Err(reason) => tracing::warn!(
                    path = %path.display(),
                    line = idx + 1,
                    reason = %reason,
                    "skipping malformed record row"
                ),
            }
        }

        Ok(events)
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn format_event(event: &AttendanceEvent) -> String {
    let date = event.date.format(DATE_FORMAT).to_string();
    let time = event.time.format(TIME_FORMAT).to_string();
    csv::format_row(&[
        &event.employee_id,
        &date,
        &time,
        event.kind.as_str(),
        event.status.as_str(),
    ])
}

fn parse_event(line: &str) -> Result<AttendanceEvent, String> {
    let fields = csv::split_row(line);
    if fields.len() != 5 {
        return Err(format!("expected 5 columns, got {}", fields.len()));
    }
    if fields[0].is_empty() {
        return Err("empty employee id".to_string());
    }
    let date = NaiveDate::parse_from_str(&fields[1], DATE_FORMAT)
        .map_err(|_| format!("bad date {:?}", fields[1]))?;
    let time = NaiveTime::parse_from_str(&fields[2], TIME_FORMAT)
        .map_err(|_| format!("bad time {:?}", fields[2]))?;
    let kind =
        EventKind::parse(&fields[3]).ok_or_else(|| format!("bad kind {:?}", fields[3]))?;
    let status =
        AttendanceStatus::parse(&fields[4]).ok_or_else(|| format!("bad status {:?}", fields[4]))?;

    Ok(AttendanceEvent {
        employee_id: fields[0].clone(),
        date,
        time,
        kind,
        status,
    })
}
