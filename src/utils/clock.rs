use chrono::{Datelike, DateTime, Days, FixedOffset, Months, NaiveDate, NaiveDateTime, Utc};

/// Current wall-clock time in the office's timezone.
pub fn office_now(tz: &FixedOffset) -> NaiveDateTime {
    to_office_time(Utc::now(), tz)
}

pub fn to_office_time(instant: DateTime<Utc>, tz: &FixedOffset) -> NaiveDateTime {
    instant.with_timezone(tz).naive_local()
}

pub fn office_today(tz: &FixedOffset) -> NaiveDate {
    office_now(tz).date()
}

/// Every date in `start..=end`.
pub fn each_day(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(start), |d| d.checked_add_days(Days::new(1)))
        .take_while(move |d| *d <= end)
}

pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day0(0).unwrap_or(day);
    let next_month = first.checked_add_months(Months::new(1)).unwrap_or(first);
    let last = next_month.pred_opt().unwrap_or(day);
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn converts_to_wib() {
        let wib = FixedOffset::east_opt(7 * 3600).unwrap();
        let utc = Utc.with_ymd_and_hms(2026, 10, 14, 20, 30, 0).unwrap();
        let local = to_office_time(utc, &wib);
        assert_eq!(local.date(), d(2026, 10, 15));
        assert_eq!(local.time().to_string(), "03:30:00");
    }

    #[test]
    fn iterates_days_inclusively() {
        let days: Vec<_> = each_day(d(2026, 2, 27), d(2026, 3, 1)).collect();
        assert_eq!(days, vec![d(2026, 2, 27), d(2026, 2, 28), d(2026, 3, 1)]);
        assert_eq!(each_day(d(2026, 3, 2), d(2026, 3, 1)).count(), 0);
    }

    #[test]
    fn month_bounds_handle_short_months() {
        assert_eq!(month_bounds(d(2026, 2, 14)), (d(2026, 2, 1), d(2026, 2, 28)));
        assert_eq!(month_bounds(d(2026, 12, 31)), (d(2026, 12, 1), d(2026, 12, 31)));
    }
}
