use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role code with full access to the admin screens. Seeded by the initial migration.
pub const ADMIN_ROLE: &str = "ADMIN";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Role {
    pub id: u64,
    #[schema(example = "SUPERVISOR")]
    pub code: String,
    #[schema(example = "Kepala Seksi")]
    pub name: String,
    pub description: Option<String>,
}

/// Role codes are stored upper-case with underscores, e.g. `KEPALA_BIDANG`.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase().replace([' ', '-'], "_")
}

pub fn is_valid_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= 50
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
