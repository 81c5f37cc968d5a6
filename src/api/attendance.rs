use crate::{
    auth::auth::AuthUser,
    config::{Config, WorkSchedule},
    error::{ApiError, ApiResult, is_duplicate},
    model::attendance::{
        ATTENDANCE_COLUMNS, Attendance, AttendanceStatus, derive_check_in_status,
        existing_record_message, minutes_late,
    },
    utils::{
        clock::office_now,
        db_utils::{PageQuery, WhereBuilder, fetch_page},
        geo::{Coordinate, GeofenceError, GeofenceMatch, GeofenceVerdict, evaluate},
        location_cache,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

impl From<GeofenceError> for ApiError {
    fn from(err: GeofenceError) -> Self {
        match err {
            GeofenceError::NoOffices => ApiError::Unprocessable(err.to_string()),
            GeofenceError::InaccurateFix { .. } | GeofenceError::Outside(_) => {
                ApiError::Forbidden(err.to_string())
            }
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LocationReq {
    #[schema(example = -6.2001)]
    pub latitude: f64,
    #[schema(example = 106.8166)]
    pub longitude: f64,
    /// Reported GPS accuracy radius in metres
    #[schema(example = 12.5)]
    pub accuracy: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub message: String,
    pub attendance: Attendance,
    pub minutes_late: i64,
    /// Nearest office at the time of the action
    pub office: Option<GeofenceMatch>,
    /// True when an approved work letter waived the geofence
    pub exempt: bool,
}

fn ensure_check_in_open(now: NaiveTime, schedule: &WorkSchedule) -> ApiResult<()> {
    if now < schedule.check_in_opens {
        return Err(ApiError::bad_request(format!(
            "Check-in baru dibuka pukul {}",
            schedule.check_in_opens.format("%H:%M")
        )));
    }
    Ok(())
}

async fn ensure_active(pool: &MySqlPool, user_id: u64) -> ApiResult<()> {
    let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    match active {
        Some(true) => Ok(()),
        Some(false) => Err(ApiError::forbidden("Akun Anda tidak aktif")),
        None => Err(ApiError::not_found("Pengguna tidak ditemukan")),
    }
}

/// An approved work letter covering `date` waives the geofence.
async fn on_assignment(pool: &MySqlPool, user_id: u64, date: NaiveDate) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM work_letters
        WHERE user_id = ? AND status = 'APPROVED' AND ? BETWEEN start_date AND end_date
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

async fn has_late_permission(pool: &MySqlPool, user_id: u64, date: NaiveDate) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM permission_requests
        WHERE user_id = ? AND date = ? AND permission_type = 'LATE_ARRIVAL' AND status = 'APPROVED'
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn record_for(pool: &MySqlPool, user_id: u64, date: NaiveDate) -> Result<Option<Attendance>, sqlx::Error> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE user_id = ? AND date = ?");
    sqlx::query_as::<_, Attendance>(&sql)
        .bind(user_id)
        .bind(date)
        .fetch_optional(pool)
        .await
}

async fn locate(
    pool: &MySqlPool,
    config: &Config,
    payload: &LocationReq,
    user_id: u64,
    date: NaiveDate,
) -> ApiResult<(Coordinate, GeofenceVerdict)> {
    let point = Coordinate::new(payload.latitude, payload.longitude).map_err(ApiError::bad_request)?;
    let offices = location_cache::active_offices(pool).await?;
    let exempt = on_assignment(pool, user_id, date).await?;

    let verdict = evaluate(point, payload.accuracy, &offices, config.max_gps_accuracy_m, exempt)
        .inspect_err(|e| info!(user_id, error = %e, "Geofence refused"))?;
    Ok((point, verdict))
}

struct CheckIn<'a> {
    user_id: u64,
    date: NaiveDate,
    time: NaiveTime,
    status: AttendanceStatus,
    point: Coordinate,
    office: Option<&'a GeofenceMatch>,
    notes: Option<&'a str>,
}

/// Stores a check-in; losing the per-day unique key to another device is a conflict.
async fn insert_check_in(pool: &MySqlPool, row: &CheckIn<'_>) -> ApiResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendances
            (user_id, date, status, check_in, check_in_latitude, check_in_longitude,
             check_in_office_id, check_in_distance_m, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(row.user_id)
    .bind(row.date)
    .bind(row.status.as_ref())
    .bind(row.time)
    .bind(row.point.latitude)
    .bind(row.point.longitude)
    .bind(row.office.map(|o| o.office_id))
    .bind(row.office.map(|o| o.distance_m))
    .bind(row.notes)
    .execute(pool)
    .await;

    match result {
        Ok(r) => Ok(r.last_insert_id()),
        Err(e) if is_duplicate(&e) => {
            Err(ApiError::conflict(existing_record_message(row.status.as_ref())))
        }
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = LocationReq,
    responses(
        (status = 201, description = "Checked in", body = AttendanceResponse),
        (status = 400, description = "Invalid coordinates or check-in not open yet"),
        (status = 403, description = "Outside every office perimeter or GPS too inaccurate"),
        (status = 409, description = "A record for today already exists", body = Object, example = json!({
            "error": "Anda sudah melakukan check-in hari ini"
        })),
        (status = 422, description = "No active office location configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<LocationReq>,
) -> ApiResult<HttpResponse> {
    let pool = pool.get_ref();
    let schedule = &config.schedule;

    ensure_active(pool, auth.user_id).await?;

    let now = office_now(&schedule.timezone);
    let (today, time) = (now.date(), now.time());
    ensure_check_in_open(time, schedule)?;

    if let Some(existing) = record_for(pool, auth.user_id, today).await? {
        return Err(ApiError::conflict(existing_record_message(&existing.status)));
    }

    let (point, verdict) = locate(pool, &config, &payload, auth.user_id, today).await?;
    let late_permission = has_late_permission(pool, auth.user_id, today).await?;
    let status = derive_check_in_status(time, schedule, late_permission);
    let office = verdict.office().cloned();

    let id = insert_check_in(
        pool,
        &CheckIn {
            user_id: auth.user_id,
            date: today,
            time,
            status,
            point,
            office: office.as_ref(),
            notes: payload.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()),
        },
    )
    .await?;

    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE id = ?");
    let attendance = sqlx::query_as::<_, Attendance>(&sql)
        .bind(id)
        .fetch_one(pool)
        .await?;

    info!(user_id = auth.user_id, status = %status, "Checked in");

    let message = match status {
        AttendanceStatus::Late => format!(
            "Check-in berhasil, Anda terlambat {} menit",
            minutes_late(time, schedule)
        ),
        AttendanceStatus::Permission => "Check-in berhasil dengan izin terlambat".to_string(),
        _ => "Check-in berhasil".to_string(),
    };

    Ok(HttpResponse::Created().json(AttendanceResponse {
        message,
        attendance,
        minutes_late: minutes_late(time, schedule),
        exempt: matches!(verdict, GeofenceVerdict::Exempt(_)),
        office,
    }))
}

#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = LocationReq,
    responses(
        (status = 200, description = "Checked out", body = AttendanceResponse),
        (status = 400, description = "No check-in found for today"),
        (status = 403, description = "Outside every office perimeter"),
        (status = 409, description = "Already checked out")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<LocationReq>,
) -> ApiResult<HttpResponse> {
    let pool = pool.get_ref();
    let schedule = &config.schedule;
    let now = office_now(&schedule.timezone);
    let (today, time) = (now.date(), now.time());

    let record = record_for(pool, auth.user_id, today)
        .await?
        .ok_or_else(|| ApiError::bad_request("Anda belum check-in hari ini"))?;
    if record.check_in.is_none() {
        return Err(ApiError::bad_request(existing_record_message(&record.status)));
    }
    if record.check_out.is_some() {
        return Err(ApiError::conflict("Anda sudah check-out hari ini"));
    }

    let (point, verdict) = locate(pool, &config, &payload, auth.user_id, today).await?;
    let office = verdict.office().cloned();

    let updated = sqlx::query(
        r#"
        UPDATE attendances
        SET check_out = ?, check_out_latitude = ?, check_out_longitude = ?, check_out_office_id = ?
        WHERE id = ? AND check_out IS NULL
        "#,
    )
    .bind(time)
    .bind(point.latitude)
    .bind(point.longitude)
    .bind(office.as_ref().map(|o| o.office_id))
    .bind(record.id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::conflict("Anda sudah check-out hari ini"));
    }

    let attendance = record_for(pool, auth.user_id, today)
        .await?
        .ok_or_else(|| ApiError::not_found("Data absensi tidak ditemukan"))?;

    let message = if time < schedule.work_end {
        warn!(user_id = auth.user_id, "Checked out before end of office hours");
        format!(
            "Check-out berhasil, sebelum jam pulang ({})",
            schedule.work_end.format("%H:%M")
        )
    } else {
        "Check-out berhasil".to_string()
    };

    Ok(HttpResponse::Ok().json(AttendanceResponse {
        message,
        minutes_late: attendance
            .check_in
            .map(|t| minutes_late(t, schedule))
            .unwrap_or(0),
        attendance,
        exempt: matches!(verdict, GeofenceVerdict::Exempt(_)),
        office,
    }))
}

#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's record (null when none) and office hours", body = Object, example = json!({
            "date": "2026-10-15",
            "attendance": null,
            "work_start": "07:30",
            "work_end": "16:00",
            "late_after": "07:45"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let schedule = &config.schedule;
    let date = office_now(&schedule.timezone).date();
    let attendance = record_for(pool.get_ref(), auth.user_id, date).await?;

    Ok(HttpResponse::Ok().json(json!({
        "date": date,
        "attendance": attendance,
        "work_start": schedule.work_start.format("%H:%M").to_string(),
        "work_end": schedule.work_end.format("%H:%M").to_string(),
        "late_after": crate::model::attendance::late_after(schedule).format("%H:%M").to_string(),
    })))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Inclusive start date
    pub from: Option<NaiveDate>,
    /// Inclusive end date
    pub to: Option<NaiveDate>,
    pub status: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

fn parse_status(raw: &str) -> ApiResult<AttendanceStatus> {
    raw.parse::<AttendanceStatus>()
        .map_err(|_| ApiError::bad_request(format!("Status absensi tidak dikenal: {raw}")))
}

#[utoipa::path(
    get,
    path = "/api/attendance/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Own attendance records, newest first", body = PaginatedAttendance)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HistoryQuery>,
) -> ApiResult<HttpResponse> {
    let mut filter = WhereBuilder::new();
    filter.push("user_id = ?", auth.user_id);
    if let Some(from) = query.from {
        filter.push("date >= ?", from);
    }
    if let Some(to) = query.to {
        filter.push("date <= ?", to);
    }
    if let Some(status) = &query.status {
        filter.push("status = ?", parse_status(status)?.as_ref());
    }

    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let select = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendances");
    let result = fetch_page::<Attendance>(
        pool.get_ref(),
        &select,
        "SELECT COUNT(*) FROM attendances",
        &filter,
        "date DESC",
        &page,
    )
    .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Attendance row with the owner's identity, for admin screens.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceEntry {
    pub id: u64,
    pub user_id: u64,
    pub nip: String,
    pub full_name: String,
    pub department_name: Option<String>,
    pub date: NaiveDate,
    #[schema(example = "LATE")]
    pub status: String,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub check_in_distance_m: Option<f64>,
    pub office_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminAttendanceQuery {
    pub date: Option<NaiveDate>,
    pub user_id: Option<u64>,
    pub department_id: Option<u64>,
    pub status: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/admin/attendance",
    params(AdminAttendanceQuery),
    responses(
        (status = 200, description = "Attendance records of all users", body = PaginatedAttendanceEntry),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn admin_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AdminAttendanceQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let mut filter = WhereBuilder::new();
    if let Some(date) = query.date {
        filter.push("a.date = ?", date);
    }
    if let Some(user_id) = query.user_id {
        filter.push("a.user_id = ?", user_id);
    }
    if let Some(department_id) = query.department_id {
        filter.push("u.department_id = ?", department_id);
    }
    if let Some(status) = &query.status {
        filter.push("a.status = ?", parse_status(status)?.as_ref());
    }

    let from = r#"
        FROM attendances a
        JOIN users u ON u.id = a.user_id
        LEFT JOIN departments d ON d.id = u.department_id
        LEFT JOIN office_locations o ON o.id = a.check_in_office_id
    "#;
    let select = format!(
        r#"
        SELECT a.id, a.user_id, u.nip, u.full_name, d.name AS department_name, a.date,
               a.status, a.check_in, a.check_out, a.check_in_distance_m,
               o.name AS office_name, a.notes
        {from}
        "#
    );
    let count = format!("SELECT COUNT(*) {from}");

    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let result = fetch_page::<AttendanceEntry>(
        pool.get_ref(),
        &select,
        &count,
        &filter,
        "a.date DESC, u.full_name",
        &page,
    )
    .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Inserts `ABSENT` for every active user with no record on `date`.
/// Safe to repeat: existing rows are left alone.
pub async fn close_day(pool: &MySqlPool, date: NaiveDate) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT IGNORE INTO attendances (user_id, date, status)
        SELECT u.id, ?, 'ABSENT'
        FROM users u
        LEFT JOIN attendances a ON a.user_id = u.id AND a.date = ?
        WHERE u.is_active = TRUE AND a.id IS NULL
        "#,
    )
    .bind(date)
    .bind(date)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Saturdays and Sundays are not closed automatically.
pub fn is_working_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[derive(Deserialize, ToSchema)]
pub struct CloseDayReq {
    #[schema(example = "2026-10-14", value_type = String, format = "date")]
    pub date: NaiveDate,
}

fn ensure_closable(date: NaiveDate, today: NaiveDate) -> ApiResult<()> {
    if date >= today {
        return Err(ApiError::bad_request(
            "Hanya hari yang sudah lewat yang dapat ditutup",
        ));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/admin/attendance/close-day",
    request_body = CloseDayReq,
    responses(
        (status = 200, description = "Users without a record were marked ABSENT", body = Object, example = json!({
            "date": "2026-10-14",
            "marked_absent": 7
        })),
        (status = 400, description = "Date is today or in the future"),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn close_day_handler(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CloseDayReq>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    ensure_closable(payload.date, office_now(&config.schedule.timezone).date())?;

    let marked = close_day(pool.get_ref(), payload.date).await?;
    info!(date = %payload.date, marked, admin_id = auth.user_id, "Attendance day closed");

    Ok(HttpResponse::Ok().json(json!({
        "date": payload.date,
        "marked_absent": marked,
    })))
}
