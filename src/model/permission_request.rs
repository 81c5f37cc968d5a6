use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    /// Arrives after the on-time deadline.
    LateArrival,
    /// Leaves before the end of office hours.
    EarlyDeparture,
    /// Absent for the whole day.
    FullDay,
    /// Leaves the office temporarily during the day.
    OutOfOffice,
}

impl PermissionType {
    pub fn needs_time(self) -> bool {
        !matches!(self, Self::FullDay)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PermissionRequest {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "LATE_ARRIVAL")]
    pub permission_type: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: String,
    #[schema(example = "PENDING")]
    pub status: String,
    pub current_step: u32,
    pub pending_role_code: Option<String>,
    pub created_at: NaiveDateTime,
}

pub const PERMISSION_COLUMNS: &str = r#"
    id, user_id, permission_type, date, start_time, end_time, reason,
    status, current_step, pending_role_code, created_at
"#;

pub fn validate(
    permission_type: PermissionType,
    date: NaiveDate,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    today: NaiveDate,
) -> Result<(), &'static str> {
    if date < today {
        return Err("Tanggal izin tidak boleh sebelum hari ini");
    }
    if permission_type.needs_time() && start_time.is_none() {
        return Err("Jam mulai izin wajib diisi");
    }
    if let (Some(start), Some(end)) = (start_time, end_time) {
        if start >= end {
            return Err("Jam mulai harus lebih awal dari jam selesai");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    fn t(h: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, 0, 0)
    }

    #[test]
    fn full_day_needs_no_times() {
        assert!(validate(PermissionType::FullDay, d(16), None, None, d(15)).is_ok());
    }

    #[test]
    fn partial_day_needs_start_time() {
        assert_eq!(
            validate(PermissionType::LateArrival, d(16), None, None, d(15)),
            Err("Jam mulai izin wajib diisi")
        );
        assert!(validate(PermissionType::LateArrival, d(16), t(8), None, d(15)).is_ok());
    }

    #[test]
    fn times_must_be_ordered() {
        assert!(validate(PermissionType::OutOfOffice, d(15), t(13), t(11), d(15)).is_err());
        assert!(validate(PermissionType::OutOfOffice, d(15), t(10), t(11), d(15)).is_ok());
    }

    #[test]
    fn past_dates_rejected() {
        assert!(validate(PermissionType::FullDay, d(14), None, None, d(15)).is_err());
    }
}
