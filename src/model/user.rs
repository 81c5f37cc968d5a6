use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Public view of a user; the password hash never leaves the database layer.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 12,
    "nip": "198703152015031002",
    "full_name": "Siti Rahmawati",
    "email": "siti@dinas.go.id",
    "role_id": 2,
    "role_code": "EMPLOYEE",
    "department_id": 3,
    "department_name": "Bidang Pelayanan",
    "position": "Analis Kepegawaian",
    "is_active": true,
    "last_login_at": null
}))]
pub struct User {
    pub id: u64,
    pub nip: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role_id: u64,
    pub role_code: String,
    pub department_id: Option<u64>,
    pub department_name: Option<String>,
    pub position: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<NaiveDateTime>,
}

/// Column list matching [`User`]; callers append their own WHERE clause.
pub const USER_SELECT: &str = r#"
    SELECT u.id, u.nip, u.full_name, u.email, u.role_id, r.code AS role_code,
           u.department_id, d.name AS department_name, u.position, u.is_active,
           u.last_login_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
    LEFT JOIN departments d ON d.id = u.department_id
"#;
