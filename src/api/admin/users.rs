use crate::{
    api::admin::{forbid_null, str_field},
    auth::{auth::AuthUser, password::hash_password},
    error::{ApiError, ApiResult},
    model::user::{USER_SELECT, User},
    utils::{
        db_utils::{PageQuery, WhereBuilder, build_update_sql, execute_update, fetch_page},
        nip_registry,
    },
    validation::{check_email, check_nip, check_password, required_text},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &[
    "full_name",
    "email",
    "role_id",
    "department_id",
    "position",
    "is_active",
];

#[derive(Deserialize, ToSchema)]
pub struct CreateUser {
    #[schema(example = "198703152015031002")]
    pub nip: String,
    #[schema(example = "Siti Rahmawati")]
    pub full_name: String,
    #[schema(example = "siti@dinas.go.id", format = "email")]
    pub email: Option<String>,
    pub password: String,
    #[schema(example = 2)]
    pub role_id: u64,
    pub department_id: Option<u64>,
    #[schema(example = "Analis Kepegawaian")]
    pub position: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Matches NIP or name
    pub search: Option<String>,
    /// Role code, e.g. SUPERVISOR
    pub role: Option<String>,
    pub department_id: Option<u64>,
    pub is_active: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

async fn fetch_user(pool: &MySqlPool, id: u64) -> ApiResult<User> {
    let sql = format!("{USER_SELECT} WHERE u.id = ?");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Pengguna tidak ditemukan"))
}

async fn revoke_sessions(pool: &MySqlPool, user_id: u64) -> Result<u64, sqlx::Error> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE")
        .bind(user_id)
        .execute(pool)
        .await
        .map(|r| r.rows_affected())
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(UserQuery),
    responses(
        (status = 200, description = "Users ordered by name", body = PaginatedUser),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let mut filter = WhereBuilder::new();
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        filter.push_repeated("(u.nip LIKE ? OR u.full_name LIKE ?)", format!("%{search}%"));
    }
    if let Some(role) = query.role.as_deref().filter(|r| !r.is_empty()) {
        filter.push("r.code = ?", role.to_uppercase());
    }
    if let Some(department_id) = query.department_id {
        filter.push("u.department_id = ?", department_id);
    }
    if let Some(is_active) = query.is_active {
        filter.push("u.is_active = ?", is_active);
    }

    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let result = fetch_page::<User>(
        pool.get_ref(),
        USER_SELECT,
        r#"
        SELECT COUNT(*)
        FROM users u
        JOIN roles r ON r.id = u.role_id
        LEFT JOIN departments d ON d.id = u.department_id
        "#,
        &filter,
        "u.full_name, u.id",
        &page,
    )
    .await?;

    Ok(HttpResponse::Ok().json(result))
}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid NIP, email, password or unknown role/department"),
        (status = 409, description = "NIP or email already registered", body = Object, example = json!({
            "error": "NIP sudah terdaftar"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUser>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let nip = payload.nip.trim();
    check_nip(nip)?;
    required_text("full_name", &payload.full_name, 150)?;
    check_password(&payload.password)?;
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if let Some(email) = email {
        check_email(email)?;
    }

    if !nip_registry::is_available(nip, pool.get_ref()).await? {
        return Err(ApiError::conflict("NIP sudah terdaftar"));
    }

    let hashed = hash_password(&payload.password)?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (nip, full_name, email, password, role_id, department_id, position)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(nip)
    .bind(payload.full_name.trim())
    .bind(email)
    .bind(hashed)
    .bind(payload.role_id)
    .bind(payload.department_id)
    .bind(payload.position.as_deref().map(str::trim).filter(|p| !p.is_empty()))
    .execute(pool.get_ref())
    .await?;

    nip_registry::mark_taken(nip).await;

    let id = result.last_insert_id();
    info!(admin_id = auth.user_id, user_id = id, "User created");
    Ok(HttpResponse::Created().json(fetch_user(pool.get_ref(), id).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    params(("id", Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    Ok(HttpResponse::Ok().json(fetch_user(pool.get_ref(), path.into_inner()).await?))
}

fn validate_update(payload: &Value) -> ApiResult<()> {
    forbid_null(payload, &["full_name", "role_id", "is_active"])?;
    if let Some(name) = str_field(payload, "full_name")? {
        required_text("full_name", name, 150)?;
    }
    if let Some(email) = str_field(payload, "email")? {
        check_email(email)?;
    }
    if let Some(position) = str_field(payload, "position")? {
        crate::validation::check_length("position", position, 0, 150)?;
    }
    Ok(())
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    params(("id", Path, description = "User id")),
    request_body(content = Object, description = "Any of: full_name, email, role_id, department_id, position, is_active", example = json!({
        "role_id": 3,
        "department_id": 2
    })),
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 422, description = "Payload contains columns that cannot be changed"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let update = build_update_sql("users", &payload, UPDATABLE, "id", id)?;
    validate_update(&payload)?;
    if id == auth.user_id && payload.get("is_active") == Some(&Value::Bool(false)) {
        return Err(ApiError::bad_request("Anda tidak dapat menonaktifkan akun sendiri"));
    }

    fetch_user(pool.get_ref(), id).await?;
    execute_update(pool.get_ref(), update).await?;

    // Tokens carry role and department; force a fresh login.
    if ["is_active", "role_id", "department_id"]
        .iter()
        .any(|k| payload.get(*k).is_some())
    {
        revoke_sessions(pool.get_ref(), id).await?;
    }

    info!(admin_id = auth.user_id, user_id = id, "User updated");
    Ok(HttpResponse::Ok().json(fetch_user(pool.get_ref(), id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id", Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated; records are kept"),
        (status = 400, description = "Cannot deactivate yourself"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn deactivate_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();
    if id == auth.user_id {
        return Err(ApiError::bad_request("Anda tidak dapat menonaktifkan akun sendiri"));
    }

    fetch_user(pool.get_ref(), id).await?;
    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    let revoked = revoke_sessions(pool.get_ref(), id).await?;

    info!(admin_id = auth.user_id, user_id = id, revoked, "User deactivated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Pengguna dinonaktifkan" })))
}

#[derive(Deserialize, ToSchema)]
pub struct ResetPassword {
    pub new_password: String,
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/password",
    params(("id", Path, description = "User id")),
    request_body = ResetPassword,
    responses(
        (status = 200, description = "Password reset; the user's sessions are revoked"),
        (status = 400, description = "Password too short"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn reset_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ResetPassword>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();
    check_password(&payload.new_password)?;

    let hashed = hash_password(&payload.new_password)?;
    let result = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed)
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Pengguna tidak ditemukan"));
    }
    revoke_sessions(pool.get_ref(), id).await?;

    info!(admin_id = auth.user_id, user_id = id, "Password reset by admin");
    Ok(HttpResponse::Ok().json(json!({ "message": "Password berhasil direset" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_payload_rules() {
        assert!(validate_update(&json!({ "full_name": "Budi" })).is_ok());
        assert!(validate_update(&json!({ "full_name": "   " })).is_err());
        assert!(validate_update(&json!({ "full_name": null })).is_err());
        assert!(validate_update(&json!({ "email": "budi" })).is_err());
        assert!(validate_update(&json!({ "email": null, "department_id": null })).is_ok());
    }

    #[test]
    fn nip_and_password_cannot_be_patched() {
        let err = build_update_sql("users", &json!({ "nip": "1", "password": "x" }), UPDATABLE, "id", 1)
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(fields) if fields.len() == 2));
    }
}
