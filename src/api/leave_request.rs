use crate::{
    api::RequestListQuery,
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    model::{
        approval::RequestKind,
        leave_request::{
            LEAVE_COLUMNS, LeaveRequest, LeaveType, check_annual_quota, days_in_year,
            validate_dates,
        },
    },
    notify::NotificationHub,
    utils::{clock::office_today, db_utils::fetch_page},
    validation::{check_length, required_text},
    workflow::store::{self, Submission},
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    pub leave_type: LeaveType,
    #[schema(example = "2026-11-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-11-04", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Acara keluarga di luar kota")]
    pub reason: String,
    /// Link to a supporting document, e.g. a doctor's note
    pub attachment_url: Option<String>,
}

fn check_attachment(url: &str) -> ApiResult<()> {
    check_length("attachment_url", url, 1, 500)?;
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ApiError::bad_request("Lampiran harus berupa tautan http(s)"));
    }
    Ok(())
}

/// Days of pending/approved annual leave per year, for the years `start..=end` touches.
async fn annual_days_used(
    pool: &MySqlPool,
    user_id: u64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(i32, i64)>, sqlx::Error> {
    let existing = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
        r#"
        SELECT start_date, end_date FROM leave_requests
        WHERE user_id = ? AND leave_type = 'ANNUAL' AND status IN ('PENDING', 'APPROVED')
          AND YEAR(end_date) >= ? AND YEAR(start_date) <= ?
        "#,
    )
    .bind(user_id)
    .bind(start.year())
    .bind(end.year())
    .fetch_all(pool)
    .await?;

    Ok((start.year()..=end.year())
        .map(|year| {
            let used = existing
                .iter()
                .map(|(s, e)| days_in_year(*s, *e, year))
                .sum();
            (year, used)
        })
        .collect())
}

#[utoipa::path(
    post,
    path = "/api/leave",
    request_body = CreateLeave,
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Invalid dates, reason or annual quota exceeded"),
        (status = 409, description = "Overlaps another pending or approved leave"),
        (status = 422, description = "No approval workflow configured for leave")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    hub: web::Data<NotificationHub>,
    payload: web::Json<CreateLeave>,
) -> ApiResult<HttpResponse> {
    let pool = pool.get_ref();
    let today = office_today(&config.schedule.timezone);

    validate_dates(payload.leave_type, payload.start_date, payload.end_date, today)
        .map_err(ApiError::bad_request)?;
    required_text("reason", &payload.reason, 1000)?;
    let attachment = payload
        .attachment_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    if let Some(url) = attachment {
        check_attachment(url)?;
    }

    let overlapping = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM leave_requests
        WHERE user_id = ? AND status IN ('PENDING', 'APPROVED')
          AND start_date <= ? AND end_date >= ?
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.end_date)
    .bind(payload.start_date)
    .fetch_one(pool)
    .await?;
    if overlapping > 0 {
        return Err(ApiError::conflict(
            "Tanggal cuti bertabrakan dengan pengajuan cuti lain",
        ));
    }

    if payload.leave_type == LeaveType::Annual {
        for (year, used) in annual_days_used(pool, auth.user_id, payload.start_date, payload.end_date).await? {
            let requested = days_in_year(payload.start_date, payload.end_date, year);
            check_annual_quota(used, requested, config.annual_leave_quota_days)
                .map_err(ApiError::BadRequest)?;
        }
    }

    let route = store::route_for_submission(pool, RequestKind::Leave).await?;
    let submission = Submission::from_route(&route);

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (user_id, leave_type, start_date, end_date, reason, attachment_url,
             approval_steps, pending_role_code, pending_same_department)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.leave_type.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.reason.trim())
    .bind(attachment)
    .bind(&submission.approval_steps)
    .bind(&submission.pending_role_code)
    .bind(submission.pending_same_department)
    .execute(pool)
    .await?;
    let id = result.last_insert_id();

    info!(user_id = auth.user_id, leave_id = id, leave_type = %payload.leave_type, "Leave request submitted");
    store::announce_submission(pool, &hub, RequestKind::Leave, id, auth.user_id, &route).await;

    let leave = fetch_leave(pool, id).await?;
    Ok(HttpResponse::Created().json(leave))
}

async fn fetch_leave(pool: &MySqlPool, id: u64) -> ApiResult<LeaveRequest> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
    sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Pengajuan cuti tidak ditemukan"))
}

#[utoipa::path(
    get,
    path = "/api/leave",
    params(RequestListQuery),
    responses(
        (status = 200, description = "Own leave requests, newest first", body = PaginatedLeave)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RequestListQuery>,
) -> ApiResult<HttpResponse> {
    let filter = query.filter(auth.user_id)?;
    let select = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests");
    let page = fetch_page::<LeaveRequest>(
        pool.get_ref(),
        &select,
        "SELECT COUNT(*) FROM leave_requests",
        &filter,
        "created_at DESC",
        &query.page(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/leave/{id}",
    params(("id", Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Leave request", body = LeaveRequest),
        (status = 403, description = "Not the requester, an approver on its route, or an admin"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    store::authorize_view(pool.get_ref(), RequestKind::Leave, id, &auth).await?;
    let leave = fetch_leave(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    post,
    path = "/api/leave/{id}/cancel",
    params(("id", Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Request withdrawn", body = Object, example = json!({
            "message": "Pengajuan cuti dibatalkan"
        })),
        (status = 403, description = "Not the requester"),
        (status = 409, description = "Already decided or cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    store::cancel(pool.get_ref(), RequestKind::Leave, id, auth.user_id).await?;
    info!(user_id = auth.user_id, leave_id = id, "Leave request cancelled");
    Ok(HttpResponse::Ok().json(json!({ "message": "Pengajuan cuti dibatalkan" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachments_must_be_links() {
        assert!(check_attachment("https://drive.dinas.go.id/surat-dokter.pdf").is_ok());
        assert!(check_attachment("surat-dokter.pdf").is_err());
        assert!(check_attachment(&format!("https://{}", "a".repeat(600))).is_err());
    }

    #[test]
    fn leave_types_parse_from_json() {
        let req: CreateLeave = serde_json::from_value(json!({
            "leave_type": "IMPORTANT_REASON",
            "start_date": "2026-11-02",
            "end_date": "2026-11-03",
            "reason": "Orang tua sakit"
        }))
        .unwrap();
        assert_eq!(req.leave_type, LeaveType::ImportantReason);
        assert!(req.attachment_url.is_none());
    }
}
