use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "198001012010011001")]
    pub nip: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Login lookup row: the user joined with its role code.
#[derive(FromRow)]
pub struct UserSql {
    pub id: u64,
    pub nip: String,
    pub password: String,
    pub role_code: String,
    pub department_id: Option<u64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// NIP of the user
    pub sub: String,
    /// role code, e.g. `ADMIN`
    pub role: String,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    pub department_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
