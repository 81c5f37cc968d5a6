use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::attendance::AttendanceStatus;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    Annual,
    Sick,
    Maternity,
    ImportantReason,
    Unpaid,
}

impl LeaveType {
    /// Attendance status written for each day of an approved leave.
    pub fn attendance_status(self) -> AttendanceStatus {
        match self {
            Self::Sick => AttendanceStatus::Sick,
            _ => AttendanceStatus::Leave,
        }
    }

    /// Sick leave may be filed after the fact.
    pub fn allows_backdating(self) -> bool {
        matches!(self, Self::Sick)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "ANNUAL")]
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub attachment_url: Option<String>,
    #[schema(example = "PENDING")]
    pub status: String,
    pub current_step: u32,
    pub pending_role_code: Option<String>,
    pub created_at: NaiveDateTime,
}

pub const LEAVE_COLUMNS: &str = r#"
    id, user_id, leave_type, start_date, end_date, reason, attachment_url,
    status, current_step, pending_role_code, created_at
"#;

/// Number of calendar days in `start..=end`.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Days of `start..=end` falling inside `year`.
pub fn days_in_year(start: NaiveDate, end: NaiveDate, year: i32) -> i64 {
    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return 0;
    };
    let from = start.max(first);
    let to = end.min(last);
    if from > to { 0 } else { inclusive_days(from, to) }
}

/// Date checks that need no database access.
pub fn validate_dates(
    leave_type: LeaveType,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Result<(), &'static str> {
    if start > end {
        return Err("Tanggal mulai tidak boleh setelah tanggal selesai");
    }
    if start < today && !leave_type.allows_backdating() {
        return Err("Tanggal mulai cuti tidak boleh sebelum hari ini");
    }
    if end.year() > today.year() + 1 {
        return Err("Cuti hanya dapat diajukan sampai tahun depan");
    }
    Ok(())
}

/// Checks the annual quota given the days already taken or pending this year.
pub fn check_annual_quota(
    already_used: i64,
    requested: i64,
    quota: i64,
) -> Result<(), String> {
    let remaining = quota - already_used;
    if requested > remaining {
        return Err(format!(
            "Sisa cuti tahunan {} hari, pengajuan {} hari",
            remaining.max(0),
            requested
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn counts_days_inclusively() {
        assert_eq!(inclusive_days(d(2026, 3, 2), d(2026, 3, 2)), 1);
        assert_eq!(inclusive_days(d(2026, 2, 27), d(2026, 3, 2)), 4);
    }

    #[test]
    fn splits_days_across_years() {
        assert_eq!(days_in_year(d(2026, 12, 30), d(2027, 1, 2), 2026), 2);
        assert_eq!(days_in_year(d(2026, 12, 30), d(2027, 1, 2), 2027), 2);
        assert_eq!(days_in_year(d(2026, 5, 1), d(2026, 5, 3), 2025), 0);
    }

    #[test]
    fn rejects_inverted_and_backdated_ranges() {
        let today = d(2026, 10, 15);
        assert!(validate_dates(LeaveType::Annual, d(2026, 10, 20), d(2026, 10, 18), today).is_err());
        assert!(validate_dates(LeaveType::Annual, d(2026, 10, 14), d(2026, 10, 16), today).is_err());
        assert!(validate_dates(LeaveType::Sick, d(2026, 10, 14), d(2026, 10, 16), today).is_ok());
        assert!(validate_dates(LeaveType::Annual, d(2026, 10, 15), d(2026, 10, 15), today).is_ok());
    }

    #[test]
    fn annual_quota() {
        assert!(check_annual_quota(10, 2, 12).is_ok());
        let err = check_annual_quota(11, 2, 12).unwrap_err();
        assert!(err.contains("Sisa cuti tahunan 1 hari"));
    }

    #[test]
    fn sick_leave_marks_sick() {
        assert_eq!(LeaveType::Sick.attendance_status(), AttendanceStatus::Sick);
        assert_eq!(LeaveType::Maternity.attendance_status(), AttendanceStatus::Leave);
        assert_eq!(LeaveType::ImportantReason.to_string(), "IMPORTANT_REASON");
    }
}
