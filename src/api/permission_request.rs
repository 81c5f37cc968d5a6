use crate::{
    api::RequestListQuery,
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    model::{
        approval::RequestKind,
        permission_request::{PERMISSION_COLUMNS, PermissionRequest, PermissionType, validate},
    },
    notify::NotificationHub,
    utils::{clock::office_today, db_utils::fetch_page},
    validation::required_text,
    workflow::store::{self, Submission},
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreatePermission {
    pub permission_type: PermissionType,
    #[schema(example = "2026-10-20", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// Required for every type except FULL_DAY
    #[schema(example = "09:00:00", value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(example = "11:00:00", value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    #[schema(example = "Mengantar anak ke rumah sakit")]
    pub reason: String,
}

#[utoipa::path(
    post,
    path = "/api/permissions",
    request_body = CreatePermission,
    responses(
        (status = 201, description = "Permission request submitted", body = PermissionRequest),
        (status = 400, description = "Invalid date, times or reason"),
        (status = 409, description = "Same permission already pending or approved for that date"),
        (status = 422, description = "No approval workflow configured for permissions")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn create_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    hub: web::Data<NotificationHub>,
    payload: web::Json<CreatePermission>,
) -> ApiResult<HttpResponse> {
    let pool = pool.get_ref();
    let today = office_today(&config.schedule.timezone);

    validate(
        payload.permission_type,
        payload.date,
        payload.start_time,
        payload.end_time,
        today,
    )
    .map_err(ApiError::bad_request)?;
    required_text("reason", &payload.reason, 1000)?;

    let duplicates = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM permission_requests
        WHERE user_id = ? AND date = ? AND permission_type = ? AND status IN ('PENDING', 'APPROVED')
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.date)
    .bind(payload.permission_type.as_ref())
    .fetch_one(pool)
    .await?;
    if duplicates > 0 {
        return Err(ApiError::conflict(
            "Izin yang sama sudah diajukan untuk tanggal tersebut",
        ));
    }

    let route = store::route_for_submission(pool, RequestKind::Permission).await?;
    let submission = Submission::from_route(&route);

    let result = sqlx::query(
        r#"
        INSERT INTO permission_requests
            (user_id, permission_type, date, start_time, end_time, reason,
             approval_steps, pending_role_code, pending_same_department)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.permission_type.as_ref())
    .bind(payload.date)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.reason.trim())
    .bind(&submission.approval_steps)
    .bind(&submission.pending_role_code)
    .bind(submission.pending_same_department)
    .execute(pool)
    .await?;
    let id = result.last_insert_id();

    info!(
        user_id = auth.user_id,
        permission_id = id,
        permission_type = %payload.permission_type,
        "Permission request submitted"
    );
    store::announce_submission(pool, &hub, RequestKind::Permission, id, auth.user_id, &route).await;

    let permission = fetch_permission(pool, id).await?;
    Ok(HttpResponse::Created().json(permission))
}

async fn fetch_permission(pool: &MySqlPool, id: u64) -> ApiResult<PermissionRequest> {
    let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permission_requests WHERE id = ?");
    sqlx::query_as::<_, PermissionRequest>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Pengajuan izin tidak ditemukan"))
}

#[utoipa::path(
    get,
    path = "/api/permissions",
    params(RequestListQuery),
    responses(
        (status = 200, description = "Own permission requests, newest first", body = PaginatedPermission)
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn permission_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RequestListQuery>,
) -> ApiResult<HttpResponse> {
    let filter = query.filter(auth.user_id)?;
    let select = format!("SELECT {PERMISSION_COLUMNS} FROM permission_requests");
    let page = fetch_page::<PermissionRequest>(
        pool.get_ref(),
        &select,
        "SELECT COUNT(*) FROM permission_requests",
        &filter,
        "created_at DESC",
        &query.page(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/permissions/{id}",
    params(("id", Path, description = "Permission request id")),
    responses(
        (status = 200, description = "Permission request", body = PermissionRequest),
        (status = 403, description = "No access"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn get_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    store::authorize_view(pool.get_ref(), RequestKind::Permission, id, &auth).await?;
    Ok(HttpResponse::Ok().json(fetch_permission(pool.get_ref(), id).await?))
}

#[utoipa::path(
    post,
    path = "/api/permissions/{id}/cancel",
    params(("id", Path, description = "Permission request id")),
    responses(
        (status = 200, description = "Request withdrawn"),
        (status = 403, description = "Not the requester"),
        (status = 409, description = "Already decided or cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn cancel_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    store::cancel(pool.get_ref(), RequestKind::Permission, id, auth.user_id).await?;
    info!(user_id = auth.user_id, permission_id = id, "Permission request cancelled");
    Ok(HttpResponse::Ok().json(json!({ "message": "Pengajuan izin dibatalkan" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_are_optional_in_json() {
        let req: CreatePermission = serde_json::from_value(json!({
            "permission_type": "FULL_DAY",
            "date": "2026-10-20",
            "reason": "Urusan keluarga"
        }))
        .unwrap();
        assert_eq!(req.permission_type, PermissionType::FullDay);
        assert!(req.start_time.is_none());

        let req: CreatePermission = serde_json::from_value(json!({
            "permission_type": "LATE_ARRIVAL",
            "date": "2026-10-20",
            "start_time": "07:30:00",
            "end_time": "09:00:00",
            "reason": "Kontrol ke dokter"
        }))
        .unwrap();
        assert_eq!(req.start_time, NaiveTime::from_hms_opt(7, 30, 0));
    }

    #[test]
    fn unknown_types_fail_to_parse() {
        let parsed = serde_json::from_value::<CreatePermission>(json!({
            "permission_type": "HALF_DAY",
            "date": "2026-10-20",
            "reason": "x"
        }));
        assert!(parsed.is_err());
    }
}
