use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

use crate::model::office_location::OfficeLocation;

/// Single-entry cache of the active office perimeters, read on every
/// check-in and check-out.
static ACTIVE_OFFICES: Lazy<Cache<(), Arc<Vec<OfficeLocation>>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1)
        .time_to_live(Duration::from_secs(300))
        .build()
});

pub async fn active_offices(pool: &MySqlPool) -> Result<Arc<Vec<OfficeLocation>>, sqlx::Error> {
    if let Some(offices) = ACTIVE_OFFICES.get(&()).await {
        return Ok(offices);
    }

    let offices = sqlx::query_as::<_, OfficeLocation>(
        r#"
        SELECT id, name, address, latitude, longitude, radius_meters, is_active
        FROM office_locations
        WHERE is_active = TRUE
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    let offices = Arc::new(offices);
    ACTIVE_OFFICES.insert((), offices.clone()).await;
    tracing::debug!(count = offices.len(), "office location cache refreshed");
    Ok(offices)
}

/// Called after any admin write to `office_locations`.
pub async fn invalidate() {
    ACTIVE_OFFICES.invalidate(&()).await;
}
