use crate::{
    api::{attendance::record_for, notification::unread_total},
    auth::auth::AuthUser,
    config::Config,
    error::ApiResult,
    model::{attendance::Attendance, leave_request::days_in_year},
    utils::clock::{month_bounds, office_today},
    workflow::store,
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sqlx::MySqlPool;
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct OfficeSummary {
    pub active_users: i64,
    /// Today's records per attendance status
    pub today_by_status: BTreeMap<String, i64>,
    /// Active users with no record yet today
    pub not_recorded: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub today: Option<Attendance>,
    /// This month's own records per attendance status
    pub month_by_status: BTreeMap<String, i64>,
    pub annual_leave_remaining: i64,
    pub my_pending_requests: i64,
    pub unread_notifications: i64,
    /// Requests waiting on the caller; absent for roles that approve nothing
    pub approval_inbox: Option<i64>,
    /// Office-wide figures, admins only
    pub office: Option<OfficeSummary>,
}

async fn status_counts(
    pool: &MySqlPool,
    user_id: Option<u64>,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<BTreeMap<String, i64>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT status, COUNT(*) FROM attendances
        WHERE date BETWEEN ? AND ? AND (? IS NULL OR user_id = ?)
        GROUP BY status
        "#,
    )
    .bind(from)
    .bind(to)
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

async fn own_pending(pool: &MySqlPool, user_id: u64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM leave_requests WHERE user_id = ? AND status = 'PENDING')
          + (SELECT COUNT(*) FROM permission_requests WHERE user_id = ? AND status = 'PENDING')
          + (SELECT COUNT(*) FROM work_letters WHERE user_id = ? AND status = 'PENDING')
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

async fn annual_leave_used(pool: &MySqlPool, user_id: u64, year: i32) -> Result<i64, sqlx::Error> {
    let ranges = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
        r#"
        SELECT start_date, end_date FROM leave_requests
        WHERE user_id = ? AND leave_type = 'ANNUAL' AND status IN ('PENDING', 'APPROVED')
          AND YEAR(start_date) <= ? AND YEAR(end_date) >= ?
        "#,
    )
    .bind(user_id)
    .bind(year)
    .bind(year)
    .fetch_all(pool)
    .await?;
    Ok(ranges.iter().map(|(s, e)| days_in_year(*s, *e, year)).sum())
}

async fn approves_anything(pool: &MySqlPool, role_code: &str) -> Result<bool, sqlx::Error> {
    let steps = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM approval_workflows WHERE role_code = ?",
    )
    .bind(role_code)
    .fetch_one(pool)
    .await?;
    Ok(steps > 0)
}

async fn office_summary(pool: &MySqlPool, today: NaiveDate) -> Result<OfficeSummary, sqlx::Error> {
    let active_users =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE is_active = TRUE")
            .fetch_one(pool)
            .await?;
    let today_by_status = status_counts(pool, None, today, today).await?;
    let recorded: i64 = today_by_status.values().sum();
    Ok(OfficeSummary {
        active_users,
        not_recorded: (active_users - recorded).max(0),
        today_by_status,
    })
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Figures for the caller's home screen", body = Dashboard)
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let pool = pool.get_ref();
    let date = office_today(&config.schedule.timezone);
    let (month_start, month_end) = month_bounds(date);

    let approver = store::current_approver(pool, auth.user_id).await?;
    let approval_inbox = if approves_anything(pool, &approver.role_code).await? {
        Some(store::inbox_count(pool, &approver).await?)
    } else {
        None
    };

    let office = if auth.is_admin() {
        Some(office_summary(pool, date).await?)
    } else {
        None
    };

    let used = annual_leave_used(pool, auth.user_id, date.year()).await?;

    Ok(HttpResponse::Ok().json(Dashboard {
        date,
        today: record_for(pool, auth.user_id, date).await?,
        month_by_status: status_counts(pool, Some(auth.user_id), month_start, month_end).await?,
        annual_leave_remaining: (config.annual_leave_quota_days - used).max(0),
        my_pending_requests: own_pending(pool, auth.user_id).await?,
        unread_notifications: unread_total(pool, auth.user_id).await?,
        approval_inbox,
        office,
    }))
}
