//! Lateness policy: pure classification of a wall-clock time against the
//! configured schedule. No state is held between calls.

use chrono::{NaiveTime, TimeDelta};

use crate::types::{AttendanceStatus, EventKind};

/// Working-hours schedule consumed by [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub work_start: NaiveTime,
    /// Scheduled end of day. Displayed on the kiosk banner; lateness never
    /// looks at it (check-out carries no verdict in this design).
    pub work_end: NaiveTime,
    /// Minutes after `work_start` during which a check-in is still on time.
    pub grace_minutes: u32,
}

impl Schedule {
    /// Latest time a check-in is still on time. Strictly after this is late.
    pub fn late_cutoff(&self) -> NaiveTime {
        self.work_start + TimeDelta::minutes(i64::from(self.grace_minutes))
    }
}

/// Classify an event captured at `now` under the operator's current `mode`.
///
/// Late iff the mode is check-in and `now` is strictly later than
/// `work_start + grace`. Check-out events are never late: the original
/// system only graded arrivals, and that asymmetry is kept as-is rather
/// than inventing an early-leave verdict.
pub fn classify(
    now: NaiveTime,
    mode: EventKind,
    schedule: &Schedule,
) -> (EventKind, AttendanceStatus) {
    let status = match mode {
        EventKind::CheckIn if now > schedule.late_cutoff() => AttendanceStatus::Late,
        _ => AttendanceStatus::OnTime,
    };
    (mode, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nine_to_five() -> Schedule {
        Schedule {
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            work_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            grace_minutes: 10,
        }
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_check_in_within_grace_is_on_time() {
        let (kind, status) = classify(at(9, 9), EventKind::CheckIn, &nine_to_five());
        assert_eq!(kind, EventKind::CheckIn);
        assert_eq!(status, AttendanceStatus::OnTime);
    }

    #[test]
    fn test_check_in_at_exact_cutoff_is_on_time() {
        // Late means strictly after start + grace.
        let (_, status) = classify(at(9, 10), EventKind::CheckIn, &nine_to_five());
        assert_eq!(status, AttendanceStatus::OnTime);
    }

    #[test]
    fn test_check_in_past_grace_is_late() {
        let (_, status) = classify(at(9, 11), EventKind::CheckIn, &nine_to_five());
        assert_eq!(status, AttendanceStatus::Late);
    }

    #[test]
    fn test_check_in_one_second_past_cutoff_is_late() {
        let now = NaiveTime::from_hms_opt(9, 10, 1).unwrap();
        let (_, status) = classify(now, EventKind::CheckIn, &nine_to_five());
        assert_eq!(status, AttendanceStatus::Late);
    }

    #[test]
    fn test_check_out_is_never_late() {
        let schedule = nine_to_five();
        for now in [at(8, 0), at(9, 11), at(18, 30), at(23, 59)] {
            let (kind, status) = classify(now, EventKind::CheckOut, &schedule);
            assert_eq!(kind, EventKind::CheckOut);
            assert_eq!(status, AttendanceStatus::OnTime);
        }
    }

    #[test]
    fn test_zero_grace_late_immediately_after_start() {
        let mut schedule = nine_to_five();
        schedule.grace_minutes = 0;
        let (_, at_start) = classify(at(9, 0), EventKind::CheckIn, &schedule);
        assert_eq!(at_start, AttendanceStatus::OnTime);
        let (_, after) = classify(
            NaiveTime::from_hms_opt(9, 0, 1).unwrap(),
            EventKind::CheckIn,
            &schedule,
        );
        assert_eq!(after, AttendanceStatus::Late);
    }
}
