use crate::{
    auth::{
        auth::AuthUser,
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{ApiError, ApiResult},
    model::user::{USER_SELECT, User},
    models::{Claims, LoginReqDto, LoginResponse, TokenType, UserSql},
    validation::check_password,
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

const INVALID_CREDENTIALS: &str = "NIP atau password salah";

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access/refresh pair and persists the refresh token's jti.
async fn issue_pair(
    pool: &MySqlPool,
    config: &Config,
    subject: &TokenSubject<'_>,
) -> ApiResult<LoginResponse> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
    })
}

async fn find_login_user(pool: &MySqlPool, column: &str, value: impl ToString) -> ApiResult<Option<UserSql>> {
    let sql = format!(
        r#"
        SELECT u.id, u.nip, u.password, r.code AS role_code, u.department_id, u.is_active
        FROM users u
        JOIN roles r ON r.id = u.role_id
        WHERE u.{column} = ?
        "#
    );
    Ok(sqlx::query_as::<_, UserSql>(&sql)
        .bind(value.to_string())
        .fetch_optional(pool)
        .await?)
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "NIP or password missing"),
        (status = 401, description = "Invalid credentials or inactive account"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(nip = %user.nip)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    info!("Login request received");

    let nip = user.nip.trim();
    if nip.is_empty() || user.password.is_empty() {
        info!("Validation failed: empty nip or password");
        return Err(ApiError::bad_request("NIP dan password wajib diisi"));
    }

    let db_user = match find_login_user(pool.get_ref(), "nip", nip).await? {
        Some(u) => u,
        None => {
            info!("Invalid credentials: user not found");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    // Checked after the password so inactive accounts can't be probed.
    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account inactive");
        return Err(ApiError::Unauthorized("Akun Anda tidak aktif, hubungi admin".into()));
    }

    let subject = TokenSubject {
        user_id: db_user.id,
        nip: &db_user.nip,
        role: &db_user.role_code,
        department_id: db_user.department_id,
    };
    let tokens = issue_pair(pool.get_ref(), &config, &subject).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> ApiResult<Claims> {
    let token = bearer(req).ok_or_else(|| ApiError::Unauthorized("Refresh token tidak ditemukan".into()))?;
    match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => Ok(c),
        _ => Err(ApiError::Unauthorized("Refresh token tidak valid".into())),
    }
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair; the old refresh token is revoked", body = LoginResponse),
        (status = 401, description = "Refresh token invalid, revoked or expired")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let claims = refresh_claims(&req, &config)?;

    // Revoking conditionally makes a replayed token lose the race.
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ? AND revoked = FALSE AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        info!(user_id = claims.user_id, "Refresh refused: token revoked or unknown");
        return Err(ApiError::Unauthorized("Sesi sudah berakhir, silakan login kembali".into()));
    }

    // Role, department or activation may have changed since login.
    let db_user = find_login_user(pool.get_ref(), "id", claims.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::Unauthorized("Akun Anda tidak aktif, hubungi admin".into()))?;

    let subject = TokenSubject {
        user_id: db_user.id,
        nip: &db_user.nip,
        role: &db_user.role_code,
        department_id: db_user.department_id,
    };
    let tokens = issue_pair(pool.get_ref(), &config, &subject).await?;

    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Ok(claims) = refresh_claims(&req, &config) else {
        return HttpResponse::NoContent().finish();
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile of the logged-in user", body = User),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let sql = format!("{USER_SELECT} WHERE u.id = ?");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("Pengguna tidak ditemukan"))?;
    Ok(HttpResponse::Ok().json(user))
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordReq {
    pub current_password: String,
    pub new_password: String,
}

#[utoipa::path(
    put,
    path = "/api/me/password",
    request_body = ChangePasswordReq,
    responses(
        (status = 200, description = "Password changed; other sessions are logged out"),
        (status = 400, description = "New password too short or same as current"),
        (status = 401, description = "Current password wrong")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ChangePasswordReq>,
) -> ApiResult<HttpResponse> {
    check_password(&payload.new_password)?;
    if payload.new_password == payload.current_password {
        return Err(ApiError::bad_request("Password baru harus berbeda dari password lama"));
    }

    let current_hash = sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE id = ?")
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("Pengguna tidak ditemukan"))?;

    if verify_password(&payload.current_password, &current_hash).is_err() {
        return Err(ApiError::Unauthorized("Password lama salah".into()));
    }

    let hashed = hash_password(&payload.new_password)?;

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed)
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE")
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(user_id = auth.user_id, "Password changed");
    Ok(HttpResponse::Ok().json(json!({ "message": "Password berhasil diubah" })))
}
