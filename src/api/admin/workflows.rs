use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::{approval::RequestKind, role::normalize_code},
    workflow::{engine::ApprovalStep, store},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::collections::BTreeSet;
use strum::IntoEnumIterator;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkflowConfig {
    pub request_type: RequestKind,
    pub steps: Vec<ApprovalStep>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaceWorkflow {
    pub steps: Vec<ApprovalStep>,
}

fn normalize_steps(steps: &[ApprovalStep]) -> ApiResult<Vec<ApprovalStep>> {
    if steps.is_empty() {
        return Err(ApiError::bad_request("Alur persetujuan minimal satu tahap"));
    }
    Ok(steps
        .iter()
        .map(|s| ApprovalStep {
            role_code: normalize_code(&s.role_code),
            same_department: s.same_department,
        })
        .collect())
}

async fn unknown_roles(pool: &MySqlPool, steps: &[ApprovalStep]) -> Result<Vec<String>, sqlx::Error> {
    let known: BTreeSet<String> = sqlx::query_scalar::<_, String>("SELECT code FROM roles")
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();
    Ok(steps
        .iter()
        .map(|s| s.role_code.clone())
        .filter(|code| !known.contains(code))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect())
}

#[utoipa::path(
    get,
    path = "/api/admin/workflows",
    responses(
        (status = 200, description = "Configured approval route per request type", body = [WorkflowConfig])
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_workflows(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let mut out = Vec::new();
    for kind in RequestKind::iter() {
        out.push(WorkflowConfig {
            request_type: kind,
            steps: store::configured_steps(pool.get_ref(), kind).await?,
        });
    }
    Ok(HttpResponse::Ok().json(out))
}

/// Requests already submitted keep the route they were submitted with.
#[utoipa::path(
    put,
    path = "/api/admin/workflows/{type}",
    params(("type", Path, description = "leave, permission or work-letter")),
    request_body = ReplaceWorkflow,
    responses(
        (status = 200, description = "Route replaced", body = WorkflowConfig),
        (status = 400, description = "Empty route"),
        (status = 404, description = "Unknown request type"),
        (status = 422, description = "Route names roles that do not exist")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn replace_workflow(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    payload: web::Json<ReplaceWorkflow>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let kind = RequestKind::from_path(&path)
        .ok_or_else(|| ApiError::not_found("Jenis pengajuan tidak dikenal"))?;

    let steps = normalize_steps(&payload.steps)?;
    let unknown = unknown_roles(pool.get_ref(), &steps).await?;
    if !unknown.is_empty() {
        return Err(ApiError::Validation(unknown));
    }

    store::replace_steps(pool.get_ref(), kind, &steps).await?;

    info!(
        admin_id = auth.user_id,
        request_type = kind.as_ref(),
        steps = steps.len(),
        "Approval route replaced"
    );
    Ok(HttpResponse::Ok().json(WorkflowConfig {
        request_type: kind,
        steps,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_normalized() {
        let steps = normalize_steps(&[
            ApprovalStep {
                role_code: "supervisor".into(),
                same_department: true,
            },
            ApprovalStep {
                role_code: "kepala dinas".into(),
                same_department: false,
            },
        ])
        .unwrap();
        assert_eq!(steps[0].role_code, "SUPERVISOR");
        assert!(steps[0].same_department);
        assert_eq!(steps[1].role_code, "KEPALA_DINAS");
    }

    #[test]
    fn empty_route_is_rejected() {
        assert!(matches!(normalize_steps(&[]), Err(ApiError::BadRequest(_))));
    }
}
