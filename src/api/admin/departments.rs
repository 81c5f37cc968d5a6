use crate::{
    api::admin::{forbid_null, str_field},
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::{
        department::Department,
        role::{is_valid_code, normalize_code},
    },
    utils::db_utils::{build_update_sql, execute_update},
    validation::required_text,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const DEPARTMENT_SELECT: &str = "SELECT id, code, name, created_at FROM departments";

#[derive(Deserialize, ToSchema)]
pub struct CreateDepartment {
    #[schema(example = "BIDANG_PERENCANAAN")]
    pub code: String,
    #[schema(example = "Bidang Perencanaan")]
    pub name: String,
}

async fn fetch_department(pool: &MySqlPool, id: u64) -> ApiResult<Department> {
    let sql = format!("{DEPARTMENT_SELECT} WHERE id = ?");
    sqlx::query_as::<_, Department>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Unit kerja tidak ditemukan"))
}

fn checked_code(raw: &str) -> ApiResult<String> {
    let code = normalize_code(raw);
    if !is_valid_code(&code) {
        return Err(ApiError::bad_request(
            "Kode hanya boleh berisi huruf, angka dan garis bawah (maks. 50)",
        ));
    }
    Ok(code)
}

#[utoipa::path(
    get,
    path = "/api/admin/departments",
    responses(
        (status = 200, description = "All departments", body = [Department])
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_departments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let sql = format!("{DEPARTMENT_SELECT} ORDER BY name");
    let rows = sqlx::query_as::<_, Department>(&sql)
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    post,
    path = "/api/admin/departments",
    request_body = CreateDepartment,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 409, description = "Code already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDepartment>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let code = checked_code(&payload.code)?;
    required_text("name", &payload.name, 150)?;

    let result = sqlx::query("INSERT INTO departments (code, name) VALUES (?, ?)")
        .bind(&code)
        .bind(payload.name.trim())
        .execute(pool.get_ref())
        .await?;

    let id = result.last_insert_id();
    info!(admin_id = auth.user_id, department_id = id, code = %code, "Department created");
    Ok(HttpResponse::Created().json(fetch_department(pool.get_ref(), id).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/departments/{id}",
    params(("id", Path, description = "Department id")),
    request_body(content = Object, description = "Any of: code, name", example = json!({ "name": "Bidang Perencanaan dan Evaluasi" })),
    responses(
        (status = 200, description = "Updated department", body = Department),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let mut payload = payload.into_inner();
    forbid_null(&payload, &["code", "name"])?;
    if let Some(name) = str_field(&payload, "name")? {
        required_text("name", name, 150)?;
    }
    if let Some(raw) = str_field(&payload, "code")? {
        let code = checked_code(raw)?;
        payload["code"] = Value::String(code);
    }

    let update = build_update_sql("departments", &payload, &["code", "name"], "id", id)?;
    fetch_department(pool.get_ref(), id).await?;
    execute_update(pool.get_ref(), update).await?;

    info!(admin_id = auth.user_id, department_id = id, "Department updated");
    Ok(HttpResponse::Ok().json(fetch_department(pool.get_ref(), id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/departments/{id}",
    params(("id", Path, description = "Department id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Department still has members")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Unit kerja tidak ditemukan"));
    }

    info!(admin_id = auth.user_id, department_id = id, "Department deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_normalized_before_storing() {
        assert_eq!(checked_code("bidang perencanaan").unwrap(), "BIDANG_PERENCANAAN");
        assert!(checked_code("bidang/umum").is_err());
        assert!(checked_code("   ").is_err());
    }
}
