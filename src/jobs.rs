use chrono::{Days, FixedOffset, NaiveDate};
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::api::attendance::{close_day, is_working_day};
use crate::utils::clock::{each_day, office_today};

const CLOSER_PERIOD: Duration = Duration::from_secs(15 * 60);

/// How far back the closer reaches after downtime.
const MAX_CATCH_UP_DAYS: u64 = 7;

/// Days the closer should settle when running on `today`, oldest first.
/// Weekends are returned too so the caller can move past them.
fn days_to_close(today: NaiveDate, last_closed: Option<NaiveDate>) -> Vec<NaiveDate> {
    let Some(yesterday) = today.checked_sub_days(Days::new(1)) else {
        return Vec::new();
    };
    let earliest = yesterday
        .checked_sub_days(Days::new(MAX_CATCH_UP_DAYS - 1))
        .unwrap_or(yesterday);
    let from = match last_closed.and_then(|d| d.succ_opt()) {
        Some(next) => next.max(earliest),
        None => yesterday,
    };
    each_day(from, yesterday).collect()
}

/// Most recent day already closed, judging by stored `ABSENT` rows.
async fn last_closed_day(pool: &MySqlPool) -> Result<Option<NaiveDate>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<NaiveDate>>(
        "SELECT MAX(date) FROM attendances WHERE status = 'ABSENT'",
    )
    .fetch_one(pool)
    .await
}

/// Marks users with no attendance row on past working days as `ABSENT`,
/// catching up on days missed while the service was down.
/// Runs forever; a failed pass is retried on the next tick.
pub async fn run_absence_closer(pool: MySqlPool, timezone: FixedOffset) {
    info!(period_secs = CLOSER_PERIOD.as_secs(), "Absence closer started");

    let mut interval = tokio::time::interval(CLOSER_PERIOD);
    let mut last_closed = match last_closed_day(&pool).await {
        Ok(day) => day,
        Err(e) => {
            error!(error = %e, "Failed to read last closed day");
            None
        }
    };

    loop {
        interval.tick().await;

        let days = days_to_close(office_today(&timezone), last_closed);
        if days.is_empty() {
            debug!("Absence closer: nothing to close");
            continue;
        }

        for date in days {
            if !is_working_day(date) {
                last_closed = Some(date);
                continue;
            }
            match close_day(&pool, date).await {
                Ok(marked) => {
                    info!(date = %date, marked, "Day closed");
                    last_closed = Some(date);
                }
                Err(e) => {
                    error!(date = %date, error = %e, "Failed to close day");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    fn working(days: Vec<NaiveDate>) -> Vec<NaiveDate> {
        days.into_iter().filter(|d| is_working_day(*d)).collect()
    }

    #[test]
    fn closes_previous_working_day_once() {
        // 2026-10-15 is a Thursday.
        assert_eq!(days_to_close(d(15), None), vec![d(14)]);
        assert_eq!(days_to_close(d(15), Some(d(14))), Vec::<NaiveDate>::new());
    }

    #[test]
    fn weekends_are_skipped() {
        // Sunday 18th looks at Saturday 17th, Monday 19th at Sunday 18th.
        assert!(working(days_to_close(d(18), None)).is_empty());
        assert!(working(days_to_close(d(19), Some(d(17)))).is_empty());
        assert_eq!(working(days_to_close(d(17), None)), vec![d(16)]);
    }

    #[test]
    fn catches_up_after_downtime() {
        // Last close was Thursday 15th; the service was down until Monday 19th.
        assert_eq!(
            days_to_close(d(19), Some(d(15))),
            vec![d(16), d(17), d(18)]
        );
        assert_eq!(working(days_to_close(d(19), Some(d(15)))), vec![d(16)]);
    }

    #[test]
    fn catch_up_is_bounded() {
        let days = days_to_close(d(30), Some(d(1)));
        assert_eq!(days.len() as u64, MAX_CATCH_UP_DAYS);
        assert_eq!(days.first(), Some(&d(23)));
        assert_eq!(days.last(), Some(&d(29)));
    }
}
