use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::config::WorkSchedule;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Leave,
    Sick,
    Permission,
}

impl AttendanceStatus {
    /// Status written by an approved request rather than by checking in.
    pub fn is_excused(self) -> bool {
        matches!(self, Self::Leave | Self::Sick | Self::Permission)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    #[schema(example = "PRESENT")]
    pub status: String,
    pub check_in: Option<NaiveTime>,
    pub check_in_latitude: Option<f64>,
    pub check_in_longitude: Option<f64>,
    pub check_in_office_id: Option<u64>,
    pub check_in_distance_m: Option<f64>,
    pub check_out: Option<NaiveTime>,
    pub check_out_latitude: Option<f64>,
    pub check_out_longitude: Option<f64>,
    pub check_out_office_id: Option<u64>,
    pub notes: Option<String>,
}

pub const ATTENDANCE_COLUMNS: &str = r#"
    id, user_id, date, status, check_in, check_in_latitude, check_in_longitude,
    check_in_office_id, check_in_distance_m, check_out, check_out_latitude,
    check_out_longitude, check_out_office_id, notes
"#;

/// Last minute that still counts as on time.
pub fn late_after(schedule: &WorkSchedule) -> NaiveTime {
    schedule.work_start + Duration::minutes(schedule.late_tolerance_minutes.max(0))
}

/// Status for a check-in at `local_time`. An approved late-arrival permission
/// turns a late check-in into `PERMISSION`.
pub fn derive_check_in_status(
    local_time: NaiveTime,
    schedule: &WorkSchedule,
    has_late_permission: bool,
) -> AttendanceStatus {
    if local_time <= late_after(schedule) {
        AttendanceStatus::Present
    } else if has_late_permission {
        AttendanceStatus::Permission
    } else {
        AttendanceStatus::Late
    }
}

/// Minutes past the on-time deadline, zero when on time.
pub fn minutes_late(local_time: NaiveTime, schedule: &WorkSchedule) -> i64 {
    (local_time - late_after(schedule)).num_minutes().max(0)
}

/// Message for a check-in attempt when a record for today already exists.
pub fn existing_record_message(status: &str) -> &'static str {
    match status.parse::<AttendanceStatus>() {
        Ok(AttendanceStatus::Leave) => "Anda tercatat sedang cuti hari ini",
        Ok(AttendanceStatus::Sick) => "Anda tercatat sedang cuti sakit hari ini",
        Ok(AttendanceStatus::Permission) => "Anda tercatat izin tidak masuk hari ini",
        Ok(AttendanceStatus::Absent) => "Hari ini sudah ditutup dan Anda tercatat tidak hadir",
        _ => "Anda sudah melakukan check-in hari ini",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn schedule() -> WorkSchedule {
        WorkSchedule {
            timezone: FixedOffset::east_opt(7 * 3600).unwrap(),
            work_start: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            work_end: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            late_tolerance_minutes: 15,
            check_in_opens: NaiveTime::from_hms_opt(5, 0, 0).unwrap(),
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn on_time_within_tolerance() {
        let s = schedule();
        assert_eq!(derive_check_in_status(at(7, 0, 0), &s, false), AttendanceStatus::Present);
        assert_eq!(derive_check_in_status(at(7, 45, 0), &s, false), AttendanceStatus::Present);
    }

    #[test]
    fn late_after_tolerance() {
        let s = schedule();
        assert_eq!(derive_check_in_status(at(7, 45, 1), &s, false), AttendanceStatus::Late);
        assert_eq!(minutes_late(at(8, 15, 0), &s), 30);
        assert_eq!(minutes_late(at(7, 10, 0), &s), 0);
    }

    #[test]
    fn late_permission_excuses_lateness() {
        let s = schedule();
        assert_eq!(
            derive_check_in_status(at(9, 0, 0), &s, true),
            AttendanceStatus::Permission
        );
        assert_eq!(derive_check_in_status(at(7, 0, 0), &s, true), AttendanceStatus::Present);
    }

    #[test]
    fn status_strings_match_storage() {
        assert_eq!(AttendanceStatus::Permission.to_string(), "PERMISSION");
        assert_eq!("SICK".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Sick);
        assert!(AttendanceStatus::Leave.is_excused());
        assert!(!AttendanceStatus::Late.is_excused());
    }

    #[test]
    fn existing_record_messages() {
        assert_eq!(existing_record_message("LEAVE"), "Anda tercatat sedang cuti hari ini");
        assert_eq!(existing_record_message("LATE"), "Anda sudah melakukan check-in hari ini");
    }
}
