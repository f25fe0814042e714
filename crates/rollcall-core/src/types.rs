use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// The two kinds of attendance event, toggled by the kiosk operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    CheckIn,
    CheckOut,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CheckIn => "check-in",
            EventKind::CheckOut => "check-out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "check-in" => Some(EventKind::CheckIn),
            "check-out" => Some(EventKind::CheckOut),
            _ => None,
        }
    }

    /// The opposite mode (operator toggle).
    pub fn toggled(self) -> Self {
        match self {
            EventKind::CheckIn => EventKind::CheckOut,
            EventKind::CheckOut => EventKind::CheckIn,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lateness verdict assigned by the policy at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    OnTime,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::OnTime => "on-time",
            AttendanceStatus::Late => "late",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "on-time" => Some(AttendanceStatus::OnTime),
            "late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded attendance event.
///
/// Append-only: status is fixed at capture time by [`crate::policy::classify`]
/// and never rewritten, even if the schedule configuration changes later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub employee_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub kind: EventKind,
    pub status: AttendanceStatus,
}

impl AttendanceEvent {
    /// Build an event, truncating the time to whole seconds.
    ///
    /// Daily record rows carry second precision; truncating here keeps a
    /// written event byte-identical to the same event read back.
    pub fn new(
        employee_id: impl Into<String>,
        date: NaiveDate,
        time: NaiveTime,
        kind: EventKind,
        status: AttendanceStatus,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            date,
            time: time.with_nanosecond(0).unwrap_or(time),
            kind,
            status,
        }
    }
}

/// A registered employee.
///
/// Immutable once stored: there is no update or delete path, only
/// registration. The face image lives next to this metadata in the
/// employee directory and is indexed by the external recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub registered_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_round_trip() {
        assert_eq!(EventKind::parse("check-in"), Some(EventKind::CheckIn));
        assert_eq!(EventKind::parse("check-out"), Some(EventKind::CheckOut));
        assert_eq!(EventKind::parse("checkin"), None);
        assert_eq!(EventKind::CheckIn.to_string(), "check-in");
    }

    #[test]
    fn test_event_kind_toggle() {
        assert_eq!(EventKind::CheckIn.toggled(), EventKind::CheckOut);
        assert_eq!(EventKind::CheckOut.toggled(), EventKind::CheckIn);
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(AttendanceStatus::parse("late"), Some(AttendanceStatus::Late));
        assert_eq!(AttendanceStatus::parse("on-time"), Some(AttendanceStatus::OnTime));
        assert_eq!(AttendanceStatus::parse("Late"), None);
        assert_eq!(AttendanceStatus::Late.to_string(), "late");
    }

    #[test]
    fn test_event_new_truncates_subsecond() {
        let time = NaiveTime::from_hms_nano_opt(9, 3, 27, 501_000_000).unwrap();
        let event = AttendanceEvent::new(
            "emp-001",
            NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(),
            time,
            EventKind::CheckIn,
            AttendanceStatus::OnTime,
        );
        assert_eq!(event.time, NaiveTime::from_hms_opt(9, 3, 27).unwrap());
    }
}
