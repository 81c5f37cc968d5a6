use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct OfficeLocation {
    pub id: u64,
    #[schema(example = "Kantor Dinas Utama")]
    pub name: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[schema(example = 100.0)]
    pub radius_meters: f64,
    pub is_active: bool,
}
