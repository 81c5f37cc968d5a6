use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Notification {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "Pengajuan cuti disetujui")]
    pub title: String,
    pub message: String,
    #[schema(example = "/leave/15")]
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}
