use crate::{
    api::RequestListQuery,
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::{
        approval::RequestKind,
        work_letter::{WORK_LETTER_COLUMNS, WorkLetter, validate},
    },
    notify::NotificationHub,
    utils::db_utils::fetch_page,
    validation::check_length,
    workflow::store::{self, Submission},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateWorkLetter {
    #[schema(example = "Kantor Gubernur, Bandung")]
    pub destination: String,
    #[schema(example = "Rapat koordinasi program pelayanan publik")]
    pub purpose: String,
    #[schema(example = "2026-10-21", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-10-22", format = "date", value_type = String)]
    pub end_date: NaiveDate,
}

#[utoipa::path(
    post,
    path = "/api/work-letters",
    request_body = CreateWorkLetter,
    responses(
        (status = 201, description = "Work letter submitted", body = WorkLetter),
        (status = 400, description = "Missing destination or purpose, or invalid dates"),
        (status = 422, description = "No approval workflow configured for work letters")
    ),
    security(("bearer_auth" = [])),
    tag = "Work Letter"
)]
pub async fn create_work_letter(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
    payload: web::Json<CreateWorkLetter>,
) -> ApiResult<HttpResponse> {
    let pool = pool.get_ref();

    validate(&payload.destination, &payload.purpose, payload.start_date, payload.end_date)
        .map_err(ApiError::bad_request)?;
    check_length("destination", payload.destination.trim(), 1, 255)?;
    check_length("purpose", payload.purpose.trim(), 1, 2000)?;

    let route = store::route_for_submission(pool, RequestKind::WorkLetter).await?;
    let submission = Submission::from_route(&route);

    let result = sqlx::query(
        r#"
        INSERT INTO work_letters
            (user_id, destination, purpose, start_date, end_date,
             approval_steps, pending_role_code, pending_same_department)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.destination.trim())
    .bind(payload.purpose.trim())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(&submission.approval_steps)
    .bind(&submission.pending_role_code)
    .bind(submission.pending_same_department)
    .execute(pool)
    .await?;
    let id = result.last_insert_id();

    info!(user_id = auth.user_id, work_letter_id = id, "Work letter submitted");
    store::announce_submission(pool, &hub, RequestKind::WorkLetter, id, auth.user_id, &route).await;

    Ok(HttpResponse::Created().json(fetch_work_letter(pool, id).await?))
}

async fn fetch_work_letter(pool: &MySqlPool, id: u64) -> ApiResult<WorkLetter> {
    let sql = format!("SELECT {WORK_LETTER_COLUMNS} FROM work_letters WHERE id = ?");
    sqlx::query_as::<_, WorkLetter>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Surat tugas tidak ditemukan"))
}

#[utoipa::path(
    get,
    path = "/api/work-letters",
    params(RequestListQuery),
    responses(
        (status = 200, description = "Own work letters, newest first", body = PaginatedWorkLetter)
    ),
    security(("bearer_auth" = [])),
    tag = "Work Letter"
)]
pub async fn work_letter_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RequestListQuery>,
) -> ApiResult<HttpResponse> {
    let filter = query.filter(auth.user_id)?;
    let select = format!("SELECT {WORK_LETTER_COLUMNS} FROM work_letters");
    let page = fetch_page::<WorkLetter>(
        pool.get_ref(),
        &select,
        "SELECT COUNT(*) FROM work_letters",
        &filter,
        "created_at DESC",
        &query.page(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/work-letters/{id}",
    params(("id", Path, description = "Work letter id")),
    responses(
        (status = 200, description = "Work letter; `letter_number` is set once approved", body = WorkLetter),
        (status = 403, description = "No access"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Work Letter"
)]
pub async fn get_work_letter(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    store::authorize_view(pool.get_ref(), RequestKind::WorkLetter, id, &auth).await?;
    Ok(HttpResponse::Ok().json(fetch_work_letter(pool.get_ref(), id).await?))
}

#[utoipa::path(
    post,
    path = "/api/work-letters/{id}/cancel",
    params(("id", Path, description = "Work letter id")),
    responses(
        (status = 200, description = "Request withdrawn"),
        (status = 403, description = "Not the requester"),
        (status = 409, description = "Already decided or cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Work Letter"
)]
pub async fn cancel_work_letter(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    store::cancel(pool.get_ref(), RequestKind::WorkLetter, id, auth.user_id).await?;
    info!(user_id = auth.user_id, work_letter_id = id, "Work letter cancelled");
    Ok(HttpResponse::Ok().json(json!({ "message": "Surat tugas dibatalkan" })))
}
