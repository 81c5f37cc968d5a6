use crate::{
    api::admin::{forbid_null, str_field},
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::role::{ADMIN_ROLE, Role, is_valid_code, normalize_code},
    utils::db_utils::{build_update_sql, execute_update},
    validation::required_text,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const ROLE_SELECT: &str = "SELECT id, code, name, description FROM roles";

#[derive(Deserialize, ToSchema)]
pub struct CreateRole {
    #[schema(example = "KEPALA_BIDANG")]
    pub code: String,
    #[schema(example = "Kepala Bidang")]
    pub name: String,
    pub description: Option<String>,
}

async fn fetch_role(pool: &MySqlPool, id: u64) -> ApiResult<Role> {
    let sql = format!("{ROLE_SELECT} WHERE id = ?");
    sqlx::query_as::<_, Role>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Role tidak ditemukan"))
}

#[utoipa::path(
    get,
    path = "/api/admin/roles",
    responses(
        (status = 200, description = "All roles", body = [Role])
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_roles(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let sql = format!("{ROLE_SELECT} ORDER BY code");
    let rows = sqlx::query_as::<_, Role>(&sql)
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    post,
    path = "/api/admin/roles",
    request_body = CreateRole,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 400, description = "Invalid code"),
        (status = 409, description = "Code already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_role(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateRole>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let code = normalize_code(&payload.code);
    if !is_valid_code(&code) {
        return Err(ApiError::bad_request(
            "Kode role hanya boleh berisi huruf, angka dan garis bawah (maks. 50)",
        ));
    }
    required_text("name", &payload.name, 100)?;

    let result = sqlx::query("INSERT INTO roles (code, name, description) VALUES (?, ?, ?)")
        .bind(&code)
        .bind(payload.name.trim())
        .bind(payload.description.as_deref().map(str::trim).filter(|d| !d.is_empty()))
        .execute(pool.get_ref())
        .await?;

    let id = result.last_insert_id();
    info!(admin_id = auth.user_id, role_id = id, code = %code, "Role created");
    Ok(HttpResponse::Created().json(fetch_role(pool.get_ref(), id).await?))
}

/// Role codes are referenced by approval routes, so only the display fields change.
#[utoipa::path(
    put,
    path = "/api/admin/roles/{id}",
    params(("id", Path, description = "Role id")),
    request_body(content = Object, description = "Any of: name, description", example = json!({ "name": "Kepala Sub Bagian" })),
    responses(
        (status = 200, description = "Updated role", body = Role),
        (status = 404, description = "Not found"),
        (status = 422, description = "Attempt to change the code")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_role(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let update = build_update_sql("roles", &payload, &["name", "description"], "id", id)?;
    forbid_null(&payload, &["name"])?;
    if let Some(name) = str_field(&payload, "name")? {
        required_text("name", name, 100)?;
    }
    str_field(&payload, "description")?;

    fetch_role(pool.get_ref(), id).await?;
    execute_update(pool.get_ref(), update).await?;

    info!(admin_id = auth.user_id, role_id = id, "Role updated");
    Ok(HttpResponse::Ok().json(fetch_role(pool.get_ref(), id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/roles/{id}",
    params(("id", Path, description = "Role id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "The admin role cannot be deleted"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Role still assigned to users or used by an approval route")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_role(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let role = fetch_role(pool.get_ref(), id).await?;
    if role.code == ADMIN_ROLE {
        return Err(ApiError::bad_request("Role ADMIN tidak dapat dihapus"));
    }

    let in_routes = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM approval_workflows WHERE role_code = ?",
    )
    .bind(&role.code)
    .fetch_one(pool.get_ref())
    .await?;
    if in_routes > 0 {
        return Err(ApiError::conflict(
            "Role masih digunakan pada alur persetujuan",
        ));
    }

    // Users still holding the role trip the foreign key and surface as 409.
    sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(admin_id = auth.user_id, role_id = id, code = %role.code, "Role deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_is_not_an_updatable_column() {
        let payload = json!({ "code": "BOSS", "name": "Boss" });
        let err = build_update_sql("roles", &payload, &["name", "description"], "id", 3).unwrap_err();
        assert!(matches!(err, ApiError::Validation(fields) if fields == vec!["code".to_string()]));
    }
}
