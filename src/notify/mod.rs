//! In-app notifications: persisted rows plus live fan-out to SSE subscribers.

use chrono::{NaiveDateTime, SubsecRound, Utc};
use futures::{Stream, StreamExt, future};
use sqlx::{Executor, MySql, MySqlPool};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::model::notification::Notification;

/// Process-wide broadcast of freshly stored notifications. Each SSE
/// connection subscribes and keeps only its own user's events.
#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, notification: Notification) {
        // Err only means nobody is listening right now.
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self, user_id: u64) -> impl Stream<Item = Notification> + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |event| {
            future::ready(match event {
                Ok(n) if n.user_id == user_id => Some(n),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id, skipped, "notification subscriber lagged");
                    None
                }
            })
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A notification to be stored for one or more recipients.
pub struct Outgoing<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub link: Option<&'a str>,
}

/// Creation time as a `DATETIME` column holds it, so pushed and listed rows agree.
fn created_now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

/// Stores one row per recipient and returns them; publish after commit.
pub async fn store<'e, E>(
    executor: E,
    recipients: &[u64],
    outgoing: &Outgoing<'_>,
) -> Result<Vec<Notification>, sqlx::Error>
where
    E: Executor<'e, Database = MySql> + Copy,
{
    let created_at = created_now();
    let mut stored = Vec::with_capacity(recipients.len());
    for &user_id in recipients {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, title, message, link, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(outgoing.title)
        .bind(outgoing.message)
        .bind(outgoing.link)
        .bind(created_at)
        .execute(executor)
        .await?;

        stored.push(Notification {
            id: result.last_insert_id(),
            user_id,
            title: outgoing.title.to_string(),
            message: outgoing.message.to_string(),
            link: outgoing.link.map(str::to_string),
            is_read: false,
            created_at,
        });
    }
    Ok(stored)
}

/// Stores and publishes. Failures are logged, never surfaced: a missed
/// notification must not fail the action that triggered it.
pub async fn send(pool: &MySqlPool, hub: &NotificationHub, recipients: &[u64], outgoing: Outgoing<'_>) {
    if recipients.is_empty() {
        return;
    }
    match store(pool, recipients, &outgoing).await {
        Ok(stored) => stored.into_iter().for_each(|n| hub.publish(n)),
        Err(e) => tracing::error!(error = %e, title = outgoing.title, "failed to store notifications"),
    }
}

/// Active users holding `role_code`, optionally restricted to a department.
pub async fn users_with_role(
    pool: &MySqlPool,
    role_code: &str,
    department_id: Option<u64>,
    exclude_user: u64,
) -> Result<Vec<u64>, sqlx::Error> {
    sqlx::query_scalar::<_, u64>(
        r#"
        SELECT u.id
        FROM users u
        JOIN roles r ON r.id = u.role_id
        WHERE r.code = ?
          AND u.is_active = TRUE
          AND u.id <> ?
          AND (? IS NULL OR u.department_id = ?)
        "#,
    )
    .bind(role_code)
    .bind(exclude_user)
    .bind(department_id)
    .bind(department_id)
    .fetch_all(pool)
    .await
}

/// One SSE frame.
pub fn sse_event(event: &str, data: &str) -> String {
    let mut frame = format!("event: {event}\n");
    for line in data.lines() {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn notification(id: u64, user_id: u64) -> Notification {
        Notification {
            id,
            user_id,
            title: "Pengajuan cuti baru".into(),
            message: "Menunggu persetujuan Anda".into(),
            link: Some("/leave/1".into()),
            is_read: false,
            created_at: NaiveDate::from_ymd_opt(2026, 10, 15)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    #[actix_web::test]
    async fn subscribers_only_see_their_own_events() {
        let hub = NotificationHub::new(16);
        let mut alice = Box::pin(hub.subscribe(1));
        assert_eq!(hub.subscriber_count(), 1);

        hub.publish(notification(100, 2));
        hub.publish(notification(101, 1));

        let received = alice.next().await.unwrap();
        assert_eq!(received.id, 101);
    }

    #[actix_web::test]
    async fn publishing_without_subscribers_is_fine() {
        let hub = NotificationHub::new(4);
        hub.publish(notification(1, 1));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[actix_web::test]
    async fn lagging_subscriber_skips_to_newer_events() {
        let hub = NotificationHub::new(2);
        let mut stream = Box::pin(hub.subscribe(1));
        for id in 0..5 {
            hub.publish(notification(id, 1));
        }
        let first = stream.next().await.unwrap();
        assert_eq!(first.id, 3);
    }

    #[test]
    fn frames_multiline_data() {
        assert_eq!(
            sse_event("notification", "{\"id\":1}"),
            "event: notification\ndata: {\"id\":1}\n\n"
        );
        assert_eq!(sse_event("x", "a\nb"), "event: x\ndata: a\ndata: b\n\n");
    }

    #[test]
    fn creation_time_has_whole_seconds() {
        use chrono::Timelike;
        assert_eq!(created_now().nanosecond(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a MySQL server"]
    async fn stored_and_pushed_timestamps_agree(pool: MySqlPool) {
        let user_id = crate::db::fixtures::user(&pool, "199001012015011001", "EMPLOYEE", None).await;
        let outgoing = Outgoing {
            title: "Pengajuan disetujui",
            message: "Pengajuan izin Anda telah disetujui",
            link: None,
        };

        let stored = store(&pool, &[user_id], &outgoing).await.unwrap();
        let listed = sqlx::query_scalar::<_, NaiveDateTime>("SELECT created_at FROM notifications WHERE id = ?")
            .bind(stored[0].id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(listed, stored[0].created_at);
    }
}
