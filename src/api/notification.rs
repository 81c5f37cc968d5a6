use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    model::notification::Notification,
    notify::{NotificationHub, sse_event},
    utils::db_utils::{PageQuery, WhereBuilder, fetch_page},
};
use actix_web::{
    HttpResponse,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    web::{self, Bytes},
};
use futures::{StreamExt, future, stream};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use std::time::Duration;
use tokio::time::{Instant, interval_at};
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error};
use utoipa::IntoParams;

const NOTIFICATION_COLUMNS: &str =
    "SELECT id, user_id, title, message, link, is_read, created_at FROM notifications";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    /// Only unread notifications
    pub unread_only: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationQuery),
    responses(
        (status = 200, description = "Own notifications, newest first", body = PaginatedNotification)
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<NotificationQuery>,
) -> ApiResult<HttpResponse> {
    let mut filter = WhereBuilder::new();
    filter.push("user_id = ?", auth.user_id);
    if query.unread_only.unwrap_or(false) {
        filter.push("is_read = ?", false);
    }

    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let result = fetch_page::<Notification>(
        pool.get_ref(),
        NOTIFICATION_COLUMNS,
        "SELECT COUNT(*) FROM notifications",
        &filter,
        "created_at DESC, id DESC",
        &page,
    )
    .await?;

    Ok(HttpResponse::Ok().json(result))
}

pub async fn unread_total(pool: &MySqlPool, user_id: u64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = FALSE",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    responses(
        (status = 200, description = "Number of unread notifications", body = Object, example = json!({ "unread": 3 }))
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn unread_count(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let unread = unread_total(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "unread": unread })))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    params(("id", Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 404, description = "Not found or not yours")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();

    let owner = sqlx::query_scalar::<_, u64>("SELECT user_id FROM notifications WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.get_ref())
        .await?;
    // Someone else's notification looks the same as a missing one.
    if owner != Some(auth.user_id) {
        return Err(ApiError::not_found("Notifikasi tidak ditemukan"));
    }

    sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "id": id, "is_read": true })))
}

#[utoipa::path(
    put,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "All own notifications marked as read", body = Object, example = json!({ "updated": 4 }))
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_all_read(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = ? AND is_read = FALSE")
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "updated": result.rows_affected() })))
}

fn frame(notification: &Notification) -> Option<Bytes> {
    match serde_json::to_string(notification) {
        Ok(data) => Some(Bytes::from(sse_event("notification", &data))),
        Err(e) => {
            error!(error = %e, id = notification.id, "failed to encode notification");
            None
        }
    }
}

fn prelude(retry_ms: u64, unread: i64) -> Bytes {
    let mut head = format!("retry: {retry_ms}\n\n");
    head.push_str(&sse_event("unread", &json!({ "unread": unread }).to_string()));
    Bytes::from(head)
}

#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    params(("token" = Option<String>, Query, description = "Access token, for EventSource clients that cannot send headers")),
    responses(
        (status = 200, description = "text/event-stream: `unread` once, then `notification` events and `: ping` heartbeats")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn stream(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    hub: web::Data<NotificationHub>,
) -> ApiResult<HttpResponse> {
    // Subscribe before counting so nothing published in between is lost.
    let events = hub
        .subscribe(auth.user_id)
        .filter_map(|n| future::ready(frame(&n)));
    let unread = unread_total(pool.get_ref(), auth.user_id).await?;

    let period = Duration::from_secs(config.sse_heartbeat_secs.max(1));
    let heartbeat = IntervalStream::new(interval_at(Instant::now() + period, period))
        .map(|_| Bytes::from_static(b": ping\n\n"));

    debug!(user_id = auth.user_id, subscribers = hub.subscriber_count(), "SSE client connected");

    let body = stream::once(future::ready(prelude(config.sse_retry_ms, unread)))
        .chain(stream::select(events, heartbeat))
        .map(Ok::<_, actix_web::Error>);

    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, "text/event-stream"))
        .insert_header((CACHE_CONTROL, "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn prelude_sets_retry_and_unread() {
        let bytes = prelude(3000, 2);
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("retry: 3000\n\n"));
        assert!(text.contains("event: unread\ndata: {\"unread\":2}\n\n"));
    }

    #[test]
    fn notifications_are_framed_as_events() {
        let n = Notification {
            id: 9,
            user_id: 1,
            title: "Pengajuan disetujui".into(),
            message: "Pengajuan cuti Anda telah disetujui".into(),
            link: Some("/leave/3".into()),
            is_read: false,
            created_at: NaiveDate::from_ymd_opt(2026, 10, 15)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        };
        let bytes = frame(&n).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("event: notification\ndata: {"));
        assert!(text.contains("\"id\":9"));
        assert!(text.ends_with("\n\n"));
    }
}
