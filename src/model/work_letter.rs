use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Surat tugas: an official assignment away from the office.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct WorkLetter {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "015/ST/2026")]
    pub letter_number: Option<String>,
    pub destination: String,
    pub purpose: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[schema(example = "PENDING")]
    pub status: String,
    pub current_step: u32,
    pub pending_role_code: Option<String>,
    pub created_at: NaiveDateTime,
}

pub const WORK_LETTER_COLUMNS: &str = r#"
    id, user_id, letter_number, destination, purpose, start_date, end_date,
    status, current_step, pending_role_code, created_at
"#;

pub fn letter_number(id: u64, year: i32) -> String {
    format!("{id:03}/ST/{year}")
}

pub fn validate(
    destination: &str,
    purpose: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), &'static str> {
    if destination.trim().is_empty() {
        return Err("Tujuan tugas wajib diisi");
    }
    if purpose.trim().is_empty() {
        return Err("Maksud tugas wajib diisi");
    }
    if start > end {
        return Err("Tanggal mulai tidak boleh setelah tanggal selesai");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(letter_number(7, 2026), "007/ST/2026");
        assert_eq!(letter_number(1234, 2026), "1234/ST/2026");
    }

    #[test]
    fn requires_text_and_ordered_dates() {
        let a = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 11, 4).unwrap();
        assert!(validate("Bandung", "Rapat koordinasi", a, b).is_ok());
        assert!(validate("  ", "Rapat koordinasi", a, b).is_err());
        assert!(validate("Bandung", "Rapat koordinasi", b, a).is_err());
    }
}
