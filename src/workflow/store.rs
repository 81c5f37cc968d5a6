use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::{MySql, MySqlConnection, MySqlPool, Transaction};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::{ApiError, ApiResult, is_duplicate};
use crate::model::approval::{Approval, Decision, RequestKind, RequestStatus};
use crate::model::attendance::AttendanceStatus;
use crate::model::leave_request::LeaveType;
use crate::model::permission_request::PermissionType;
use crate::model::role::ADMIN_ROLE;
use crate::model::work_letter::letter_number;
use crate::notify::{self, NotificationHub, Outgoing};
use crate::utils::clock::{each_day, office_today};
use crate::workflow::engine::{ApprovalRoute, ApprovalStep, Approver, RequestState, Transition};

/// Steps currently configured for `kind`.
pub async fn configured_steps(pool: &MySqlPool, kind: RequestKind) -> Result<Vec<ApprovalStep>, sqlx::Error> {
    sqlx::query_as::<_, (String, bool)>(
        r#"
        SELECT role_code, same_department
        FROM approval_workflows
        WHERE request_type = ?
        ORDER BY step_order
        "#,
    )
    .bind(kind.as_ref())
    .fetch_all(pool)
    .await
    .map(|rows| {
        rows.into_iter()
            .map(|(role_code, same_department)| ApprovalStep {
                role_code,
                same_department,
            })
            .collect()
    })
}

/// Route to snapshot onto a new request; refuses kinds with no configured steps.
pub async fn route_for_submission(pool: &MySqlPool, kind: RequestKind) -> ApiResult<ApprovalRoute> {
    let steps = configured_steps(pool, kind).await?;
    Ok(ApprovalRoute::new(steps)?)
}

/// Replaces the configured steps of `kind` atomically.
pub async fn replace_steps(
    pool: &MySqlPool,
    kind: RequestKind,
    steps: &[ApprovalStep],
) -> ApiResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM approval_workflows WHERE request_type = ?")
        .bind(kind.as_ref())
        .execute(&mut *tx)
        .await?;

    for (order, step) in steps.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO approval_workflows (request_type, step_order, role_code, same_department)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(kind.as_ref())
        .bind(order as u32)
        .bind(&step.role_code)
        .bind(step.same_department)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Common columns of every approvable request joined with its requester.
#[derive(Debug, sqlx::FromRow)]
pub struct RequestHeader {
    pub id: u64,
    pub user_id: u64,
    pub status: String,
    pub current_step: u32,
    pub approval_steps: String,
    pub requester_name: String,
    pub requester_department: Option<u64>,
}

impl RequestHeader {
    pub fn state(&self) -> ApiResult<RequestState> {
        let status = self
            .status
            .parse::<RequestStatus>()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("unknown request status {}", self.status)))?;
        Ok(RequestState {
            status,
            current_step: self.current_step as usize,
            requester_id: self.user_id,
            requester_department: self.requester_department,
        })
    }

    pub fn route(&self) -> ApiResult<ApprovalRoute> {
        ApprovalRoute::from_json(&self.approval_steps).map_err(ApiError::Internal)
    }
}

fn header_sql(kind: RequestKind, lock: bool) -> String {
    format!(
        r#"
        SELECT r.id, r.user_id, r.status, r.current_step, r.approval_steps,
               u.full_name AS requester_name, u.department_id AS requester_department
        FROM {} r
        JOIN users u ON u.id = r.user_id
        WHERE r.id = ?{}
        "#,
        kind.table(),
        if lock { " FOR UPDATE" } else { "" }
    )
}

pub async fn fetch_header(pool: &MySqlPool, kind: RequestKind, id: u64) -> ApiResult<RequestHeader> {
    sqlx::query_as::<_, RequestHeader>(&header_sql(kind, false))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Pengajuan {} tidak ditemukan", kind.label())))
}

/// Approver identity as currently stored, not as remembered by the token.
#[derive(Debug, sqlx::FromRow)]
pub struct CurrentApprover {
    pub user_id: u64,
    pub role_code: String,
    pub department_id: Option<u64>,
    is_active: bool,
}

impl CurrentApprover {
    pub fn is_admin(&self) -> bool {
        self.role_code == ADMIN_ROLE
    }
}

/// Loads the caller's role and department; deactivated accounts are refused.
pub async fn current_approver(pool: &MySqlPool, user_id: u64) -> ApiResult<CurrentApprover> {
    sqlx::query_as::<_, CurrentApprover>(
        r#"
        SELECT u.id AS user_id, r.code AS role_code, u.department_id, u.is_active
        FROM users u
        JOIN roles r ON r.id = u.role_id
        WHERE u.id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .filter(|a| a.is_active)
    .ok_or_else(|| ApiError::forbidden("Akun Anda tidak aktif"))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DecisionOutcome {
    pub kind: RequestKind,
    pub id: u64,
    pub status: RequestStatus,
    pub current_step: u32,
    /// Role expected to act next, while still pending.
    pub next_role: Option<String>,
}

/// Records `decision` by `approver_id` on the current step of a request.
#[allow(clippy::too_many_arguments)]
pub async fn decide(
    pool: &MySqlPool,
    hub: &NotificationHub,
    config: &Config,
    kind: RequestKind,
    id: u64,
    approver_id: u64,
    decision: Decision,
    note: Option<&str>,
) -> ApiResult<DecisionOutcome> {
    let approver = current_approver(pool, approver_id).await?;

    let mut tx = pool.begin().await?;

    let header = sqlx::query_as::<_, RequestHeader>(&header_sql(kind, true))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Pengajuan {} tidak ditemukan", kind.label())))?;

    let state = header.state()?;
    let route = header.route()?;
    let step = route
        .step(state.current_step)
        .cloned()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("request {id} has no step {}", state.current_step)))?;

    let transition = route.decide(
        &state,
        &Approver {
            user_id: approver_id,
            role_code: &approver.role_code,
            department_id: approver.department_id,
        },
        decision,
    )?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO approvals (request_type, request_id, step_order, role_code, approver_id, decision, note)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(kind.as_ref())
    .bind(id)
    .bind(state.current_step as u32)
    .bind(&step.role_code)
    .bind(approver_id)
    .bind(decision.as_ref())
    .bind(note)
    .execute(&mut *tx)
    .await;

    if let Err(e) = inserted {
        if is_duplicate(&e) {
            return Err(ApiError::conflict("Tahap ini sudah diputuskan"));
        }
        return Err(e.into());
    }

    let next_step = transition.step_after(state.current_step);
    let next = match transition {
        Transition::Advanced { next_step } => route.step(next_step).cloned(),
        _ => None,
    };
    let new_status = transition.status();

    let updated = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET status = ?, current_step = ?, pending_role_code = ?, pending_same_department = ?
        WHERE id = ? AND status = 'PENDING' AND current_step = ?
        "#,
        kind.table()
    ))
    .bind(new_status.as_ref())
    .bind(next_step as u32)
    .bind(next.as_ref().map(|s| s.role_code.as_str()))
    .bind(next.as_ref().is_some_and(|s| s.same_department))
    .bind(id)
    .bind(state.current_step as u32)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::conflict("Pengajuan sudah diproses oleh pengguna lain"));
    }

    if transition == Transition::Approved {
        apply_final_approval(&mut tx, config, kind, id).await?;
    }

    tx.commit().await?;

    tracing::info!(
        kind = %kind,
        request_id = id,
        approver_id,
        decision = %decision,
        status = %new_status,
        "approval recorded"
    );

    let link = kind.link(id);
    match (&transition, &next) {
        (Transition::Advanced { .. }, Some(next)) => {
            notify_step_approvers(pool, hub, kind, id, &header.requester_name, header.user_id, header.requester_department, next).await;
        }
        (Transition::Approved, _) => {
            let message = format!("Pengajuan {} Anda telah disetujui", kind.label());
            notify::send(pool, hub, &[header.user_id], Outgoing {
                title: "Pengajuan disetujui",
                message: &message,
                link: Some(&link),
            })
            .await;
        }
        (Transition::Rejected, _) => {
            let message = match note {
                Some(n) if !n.trim().is_empty() => {
                    format!("Pengajuan {} Anda ditolak: {}", kind.label(), n.trim())
                }
                _ => format!("Pengajuan {} Anda ditolak", kind.label()),
            };
            notify::send(pool, hub, &[header.user_id], Outgoing {
                title: "Pengajuan ditolak",
                message: &message,
                link: Some(&link),
            })
            .await;
        }
        _ => {}
    }

    Ok(DecisionOutcome {
        kind,
        id,
        status: new_status,
        current_step: next_step as u32,
        next_role: next.map(|s| s.role_code),
    })
}

/// Notifies holders of `step`'s role that a request awaits them.
#[allow(clippy::too_many_arguments)]
pub async fn notify_step_approvers(
    pool: &MySqlPool,
    hub: &NotificationHub,
    kind: RequestKind,
    id: u64,
    requester_name: &str,
    requester_id: u64,
    requester_department: Option<u64>,
    step: &ApprovalStep,
) {
    let department = if step.same_department { requester_department } else { None };
    let recipients = match notify::users_with_role(pool, &step.role_code, department, requester_id).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, role = %step.role_code, "failed to resolve approvers");
            return;
        }
    };

    let message = format!("Pengajuan {} dari {} menunggu persetujuan Anda", kind.label(), requester_name);
    let link = kind.link(id);
    notify::send(pool, hub, &recipients, Outgoing {
        title: "Persetujuan dibutuhkan",
        message: &message,
        link: Some(&link),
    })
    .await;
}

/// Tells the first step's approvers about a freshly stored request.
pub async fn announce_submission(
    pool: &MySqlPool,
    hub: &NotificationHub,
    kind: RequestKind,
    id: u64,
    requester_id: u64,
    route: &ApprovalRoute,
) {
    let requester = sqlx::query_as::<_, (String, Option<u64>)>(
        "SELECT full_name, department_id FROM users WHERE id = ?",
    )
    .bind(requester_id)
    .fetch_one(pool)
    .await;

    match requester {
        Ok((name, department)) => {
            notify_step_approvers(pool, hub, kind, id, &name, requester_id, department, route.first()).await;
        }
        Err(e) => tracing::error!(error = %e, requester_id, "failed to load requester for notification"),
    }
}

/// Writes the attendance consequences of a fully approved request.
async fn apply_final_approval(
    tx: &mut Transaction<'_, MySql>,
    config: &Config,
    kind: RequestKind,
    id: u64,
) -> ApiResult<()> {
    match kind {
        RequestKind::Leave => {
            let (user_id, leave_type, start, end) =
                sqlx::query_as::<_, (u64, String, NaiveDate, NaiveDate)>(
                    "SELECT user_id, leave_type, start_date, end_date FROM leave_requests WHERE id = ?",
                )
                .bind(id)
                .fetch_one(&mut **tx)
                .await?;
            let status = leave_type
                .parse::<LeaveType>()
                .map(LeaveType::attendance_status)
                .unwrap_or(AttendanceStatus::Leave);
            for day in each_day(start, end) {
                mark_excused_day(&mut **tx, user_id, day, status).await?;
            }
        }
        RequestKind::Permission => {
            let (user_id, permission_type, date) = sqlx::query_as::<_, (u64, String, NaiveDate)>(
                "SELECT user_id, permission_type, date FROM permission_requests WHERE id = ?",
            )
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
            match permission_type.parse::<PermissionType>() {
                Ok(PermissionType::FullDay) => {
                    mark_excused_day(&mut **tx, user_id, date, AttendanceStatus::Permission).await?;
                }
                // Approved after the user already checked in late.
                Ok(PermissionType::LateArrival) => {
                    sqlx::query(
                        "UPDATE attendances SET status = 'PERMISSION' WHERE user_id = ? AND date = ? AND status = 'LATE'",
                    )
                    .bind(user_id)
                    .bind(date)
                    .execute(&mut **tx)
                    .await?;
                }
                _ => {}
            }
        }
        RequestKind::WorkLetter => {
            let year = office_today(&config.schedule.timezone).year();
            sqlx::query("UPDATE work_letters SET letter_number = ? WHERE id = ?")
                .bind(letter_number(id, year))
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
    }
    Ok(())
}

/// Inserts an excused status for a day, upgrading only an existing ABSENT row.
async fn mark_excused_day(
    conn: &mut MySqlConnection,
    user_id: u64,
    date: NaiveDate,
    status: AttendanceStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO attendances (user_id, date, status)
        VALUES (?, ?, ?)
        ON DUPLICATE KEY UPDATE status = IF(status = 'ABSENT', VALUES(status), status)
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(status.as_ref())
    .execute(conn)
    .await?;
    Ok(())
}

/// Withdraws a pending request on behalf of its owner.
pub async fn cancel(pool: &MySqlPool, kind: RequestKind, id: u64, user_id: u64) -> ApiResult<()> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET status = 'CANCELLED', pending_role_code = NULL, pending_same_department = FALSE
        WHERE id = ? AND user_id = ? AND status = 'PENDING'
        "#,
        kind.table()
    ))
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let header = fetch_header(pool, kind, id).await?;
    if header.user_id != user_id {
        return Err(ApiError::forbidden("Anda hanya dapat membatalkan pengajuan sendiri"));
    }
    Err(ApiError::conflict(format!(
        "Pengajuan sudah berstatus {} dan tidak dapat dibatalkan",
        header.status
    )))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApprovalHistory {
    pub kind: RequestKind,
    pub id: u64,
    pub requester_id: u64,
    pub requester_name: String,
    #[schema(example = "PENDING")]
    pub status: String,
    pub current_step: u32,
    pub steps: Vec<ApprovalStep>,
    pub decisions: Vec<Approval>,
}

/// Loads a request header if `viewer` is its requester, an admin, or holds
/// a role on its route.
pub async fn authorize_view(
    pool: &MySqlPool,
    kind: RequestKind,
    id: u64,
    viewer: &AuthUser,
) -> ApiResult<RequestHeader> {
    let header = fetch_header(pool, kind, id).await?;
    if header.user_id == viewer.user_id {
        return Ok(header);
    }
    let current = current_approver(pool, viewer.user_id).await?;
    if current.is_admin() || header.route()?.involves_role(&current.role_code) {
        return Ok(header);
    }
    Err(ApiError::forbidden("Anda tidak memiliki akses ke pengajuan ini"))
}

/// Route and recorded decisions of a request.
pub async fn history(
    pool: &MySqlPool,
    kind: RequestKind,
    id: u64,
    viewer: &AuthUser,
) -> ApiResult<ApprovalHistory> {
    let header = authorize_view(pool, kind, id, viewer).await?;
    let route = header.route()?;

    let decisions = sqlx::query_as::<_, Approval>(
        r#"
        SELECT a.id, a.step_order, a.role_code, a.approver_id, u.full_name AS approver_name,
               a.decision, a.note, a.decided_at
        FROM approvals a
        JOIN users u ON u.id = a.approver_id
        WHERE a.request_type = ? AND a.request_id = ?
        ORDER BY a.step_order
        "#,
    )
    .bind(kind.as_ref())
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(ApprovalHistory {
        kind,
        id,
        requester_id: header.user_id,
        requester_name: header.requester_name,
        status: header.status,
        current_step: header.current_step,
        steps: route.steps().to_vec(),
        decisions,
    })
}

/// A request waiting on the caller's role.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct PendingItem {
    #[sqlx(skip)]
    pub kind: Option<RequestKind>,
    pub id: u64,
    pub requester_id: u64,
    pub requester_name: String,
    #[schema(example = "ANNUAL 2026-11-02 s.d. 2026-11-04")]
    pub summary: String,
    pub current_step: u32,
    pub created_at: NaiveDateTime,
}

fn summary_sql(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Leave => "CONCAT(r.leave_type, ' ', r.start_date, ' s.d. ', r.end_date)",
        RequestKind::Permission => "CONCAT(r.permission_type, ' ', r.date)",
        RequestKind::WorkLetter => "CONCAT(r.destination, ' ', r.start_date, ' s.d. ', r.end_date)",
    }
}

const INBOX_FILTER: &str = r#"
    WHERE r.status = 'PENDING'
      AND r.pending_role_code = ?
      AND r.user_id <> ?
      AND (r.pending_same_department = FALSE OR u.department_id IS NULL OR u.department_id = ?)
"#;

/// Requests of every kind currently waiting on `approver`.
pub async fn inbox(pool: &MySqlPool, approver: &CurrentApprover) -> ApiResult<Vec<PendingItem>> {
    let mut items = Vec::new();
    for kind in [RequestKind::Leave, RequestKind::Permission, RequestKind::WorkLetter] {
        let sql = format!(
            r#"
            SELECT r.id, r.user_id AS requester_id, u.full_name AS requester_name,
                   {} AS summary, r.current_step, r.created_at
            FROM {} r
            JOIN users u ON u.id = r.user_id
            {}
            "#,
            summary_sql(kind),
            kind.table(),
            INBOX_FILTER
        );
        let rows = sqlx::query_as::<_, PendingItem>(&sql)
            .bind(&approver.role_code)
            .bind(approver.user_id)
            .bind(approver.department_id)
            .fetch_all(pool)
            .await?;
        items.extend(rows.into_iter().map(|mut item| {
            item.kind = Some(kind);
            item
        }));
    }
    items.sort_by_key(|item| item.created_at);
    Ok(items)
}

/// Size of the caller's inbox without loading it.
pub async fn inbox_count(pool: &MySqlPool, approver: &CurrentApprover) -> Result<i64, sqlx::Error> {
    let mut total = 0;
    for kind in [RequestKind::Leave, RequestKind::Permission, RequestKind::WorkLetter] {
        let sql = format!(
            "SELECT COUNT(*) FROM {} r JOIN users u ON u.id = r.user_id {}",
            kind.table(),
            INBOX_FILTER
        );
        total += sqlx::query_scalar::<_, i64>(&sql)
            .bind(&approver.role_code)
            .bind(approver.user_id)
            .bind(approver.department_id)
            .fetch_one(pool)
            .await?;
    }
    Ok(total)
}

/// Columns shared by every request insert: route snapshot and first pending step.
pub struct Submission {
    pub approval_steps: String,
    pub pending_role_code: String,
    pub pending_same_department: bool,
}

impl Submission {
    pub fn from_route(route: &ApprovalRoute) -> Self {
        let first = route.first();
        Self {
            approval_steps: route.to_json(),
            pending_role_code: first.role_code.clone(),
            pending_same_department: first.same_department,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_query_locks_only_when_asked() {
        assert!(header_sql(RequestKind::Leave, true).contains("FROM leave_requests r"));
        assert!(header_sql(RequestKind::Leave, true).trim_end().ends_with("FOR UPDATE"));
        assert!(!header_sql(RequestKind::WorkLetter, false).contains("FOR UPDATE"));
    }

    #[test]
    fn header_state_parses_status() {
        let header = RequestHeader {
            id: 1,
            user_id: 4,
            status: "PENDING".into(),
            current_step: 1,
            approval_steps: r#"[{"role_code":"SUPERVISOR","same_department":true},{"role_code":"HEAD"}]"#.into(),
            requester_name: "Budi".into(),
            requester_department: Some(2),
        };
        let state = header.state().unwrap();
        assert_eq!(state.status, RequestStatus::Pending);
        assert_eq!(state.current_step, 1);

        let route = header.route().unwrap();
        assert_eq!(route.steps().len(), 2);
        assert!(!route.steps()[1].same_department);
    }

    #[test]
    fn submission_points_at_first_step() {
        let route = ApprovalRoute::new(vec![
            ApprovalStep { role_code: "SUPERVISOR".into(), same_department: true },
            ApprovalStep { role_code: "HEAD".into(), same_department: false },
        ])
        .unwrap();
        let submission = Submission::from_route(&route);
        assert_eq!(submission.pending_role_code, "SUPERVISOR");
        assert!(submission.pending_same_department);
        assert!(submission.approval_steps.contains("HEAD"));
    }

    mod with_database {
        use super::*;
        use crate::db::fixtures;

        fn day(d: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
        }

        struct Office {
            employee: u64,
            supervisor: u64,
            other_supervisor: u64,
        }

        async fn office(pool: &MySqlPool) -> Office {
            let dept = fixtures::department(pool, "UMUM").await;
            Office {
                employee: fixtures::user(pool, "199001012015011001", "EMPLOYEE", Some(dept)).await,
                supervisor: fixtures::user(pool, "198001012005011002", "SUPERVISOR", Some(dept)).await,
                other_supervisor: fixtures::user(pool, "198101012006011003", "SUPERVISOR", Some(dept)).await,
            }
        }

        /// Permission requests go through a single same-department SUPERVISOR step.
        async fn permission(pool: &MySqlPool, user_id: u64, kind: PermissionType, date: NaiveDate) -> u64 {
            let route = route_for_submission(pool, RequestKind::Permission).await.unwrap();
            let submission = Submission::from_route(&route);
            sqlx::query(
                r#"
                INSERT INTO permission_requests
                    (user_id, permission_type, date, reason, approval_steps,
                     pending_role_code, pending_same_department)
                VALUES (?, ?, ?, 'Keperluan keluarga', ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(kind.as_ref())
            .bind(date)
            .bind(&submission.approval_steps)
            .bind(&submission.pending_role_code)
            .bind(submission.pending_same_department)
            .execute(pool)
            .await
            .unwrap()
            .last_insert_id()
        }

        async fn approve(pool: &MySqlPool, id: u64, approver_id: u64) -> ApiResult<DecisionOutcome> {
            let hub = NotificationHub::new(8);
            decide(
                pool,
                &hub,
                &fixtures::config(),
                RequestKind::Permission,
                id,
                approver_id,
                Decision::Approved,
                None,
            )
            .await
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs DATABASE_URL pointing at a MySQL server"]
        async fn full_day_approval_upgrades_only_absent_rows(pool: MySqlPool) {
            let o = office(&pool).await;
            fixtures::attendance(&pool, o.employee, day(13), "PRESENT").await;
            fixtures::attendance(&pool, o.employee, day(14), "ABSENT").await;

            for date in [day(12), day(13), day(14)] {
                let id = permission(&pool, o.employee, PermissionType::FullDay, date).await;
                let outcome = approve(&pool, id, o.supervisor).await.unwrap();
                assert_eq!(outcome.status, RequestStatus::Approved);
            }

            assert_eq!(fixtures::attendance_status(&pool, o.employee, day(12)).await.as_deref(), Some("PERMISSION"));
            assert_eq!(fixtures::attendance_status(&pool, o.employee, day(13)).await.as_deref(), Some("PRESENT"));
            assert_eq!(fixtures::attendance_status(&pool, o.employee, day(14)).await.as_deref(), Some("PERMISSION"));
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs DATABASE_URL pointing at a MySQL server"]
        async fn late_arrival_approval_excuses_a_late_check_in(pool: MySqlPool) {
            let o = office(&pool).await;
            fixtures::attendance(&pool, o.employee, day(14), "LATE").await;

            let id = permission(&pool, o.employee, PermissionType::LateArrival, day(14)).await;
            approve(&pool, id, o.supervisor).await.unwrap();

            assert_eq!(fixtures::attendance_status(&pool, o.employee, day(14)).await.as_deref(), Some("PERMISSION"));
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs DATABASE_URL pointing at a MySQL server"]
        async fn step_decided_concurrently_is_a_conflict(pool: MySqlPool) {
            let o = office(&pool).await;
            let id = permission(&pool, o.employee, PermissionType::OutOfOffice, day(14)).await;

            // Another supervisor's decision landed on step 0 first.
            sqlx::query(
                r#"
                INSERT INTO approvals (request_type, request_id, step_order, role_code, approver_id, decision)
                VALUES ('PERMISSION', ?, 0, 'SUPERVISOR', ?, 'APPROVED')
                "#,
            )
            .bind(id)
            .bind(o.other_supervisor)
            .execute(&pool)
            .await
            .unwrap();

            let err = approve(&pool, id, o.supervisor).await.unwrap_err();
            assert!(matches!(err, ApiError::Conflict(_)), "{err:?}");

            let status = fetch_header(&pool, RequestKind::Permission, id).await.unwrap().status;
            assert_eq!(status, "PENDING");
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs DATABASE_URL pointing at a MySQL server"]
        async fn deciding_a_finished_request_is_a_conflict(pool: MySqlPool) {
            let o = office(&pool).await;
            let id = permission(&pool, o.employee, PermissionType::OutOfOffice, day(14)).await;

            approve(&pool, id, o.supervisor).await.unwrap();
            let err = approve(&pool, id, o.other_supervisor).await.unwrap_err();
            assert!(matches!(err, ApiError::Conflict(_)), "{err:?}");
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs DATABASE_URL pointing at a MySQL server"]
        async fn only_the_owner_cancels_a_pending_request(pool: MySqlPool) {
            let o = office(&pool).await;
            let id = permission(&pool, o.employee, PermissionType::OutOfOffice, day(14)).await;

            let err = cancel(&pool, RequestKind::Permission, id, o.supervisor).await.unwrap_err();
            assert!(matches!(err, ApiError::Forbidden(_)), "{err:?}");

            cancel(&pool, RequestKind::Permission, id, o.employee).await.unwrap();
            let status = fetch_header(&pool, RequestKind::Permission, id).await.unwrap().status;
            assert_eq!(status, "CANCELLED");

            let err = cancel(&pool, RequestKind::Permission, id, o.employee).await.unwrap_err();
            assert!(matches!(err, ApiError::Conflict(_)), "{err:?}");
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs DATABASE_URL pointing at a MySQL server"]
        async fn inbox_follows_the_stored_role(pool: MySqlPool) {
            let o = office(&pool).await;
            permission(&pool, o.employee, PermissionType::OutOfOffice, day(14)).await;

            let approver = current_approver(&pool, o.supervisor).await.unwrap();
            assert_eq!(inbox(&pool, &approver).await.unwrap().len(), 1);
            assert_eq!(inbox_count(&pool, &approver).await.unwrap(), 1);

            sqlx::query("UPDATE users SET role_id = (SELECT id FROM roles WHERE code = 'EMPLOYEE') WHERE id = ?")
                .bind(o.supervisor)
                .execute(&pool)
                .await
                .unwrap();

            let approver = current_approver(&pool, o.supervisor).await.unwrap();
            assert_eq!(approver.role_code, "EMPLOYEE");
            assert!(inbox(&pool, &approver).await.unwrap().is_empty());
            assert_eq!(inbox_count(&pool, &approver).await.unwrap(), 0);
        }
    }
}
