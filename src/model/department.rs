use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Department {
    pub id: u64,
    #[schema(example = "SEKRETARIAT")]
    pub code: String,
    #[schema(example = "Sekretariat")]
    pub name: String,
    pub created_at: NaiveDateTime,
}
