use crate::{
    api::admin::{f64_field, forbid_null, str_field},
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    model::office_location::OfficeLocation,
    utils::{
        db_utils::{build_update_sql, execute_update},
        geo::Coordinate,
        location_cache,
    },
    validation::{check_radius, required_text},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const OFFICE_SELECT: &str = r#"
    SELECT id, name, address, latitude, longitude, radius_meters, is_active
    FROM office_locations
"#;

const UPDATABLE: &[&str] = &[
    "name",
    "address",
    "latitude",
    "longitude",
    "radius_meters",
    "is_active",
];

#[derive(Deserialize, ToSchema)]
pub struct CreateOfficeLocation {
    #[schema(example = "Kantor Dinas Utama")]
    pub name: String,
    pub address: Option<String>,
    #[schema(example = -6.200000)]
    pub latitude: f64,
    #[schema(example = 106.816666)]
    pub longitude: f64,
    #[schema(example = 100.0)]
    pub radius_meters: f64,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

async fn fetch_office(pool: &MySqlPool, id: u64) -> ApiResult<OfficeLocation> {
    let sql = format!("{OFFICE_SELECT} WHERE id = ?");
    sqlx::query_as::<_, OfficeLocation>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Lokasi kantor tidak ditemukan"))
}

/// Checks the fields of a partial update against the current row, so a
/// lone `latitude` is validated together with the stored `longitude`.
fn validate_patch(payload: &Value, current: &OfficeLocation, max_radius: f64) -> ApiResult<()> {
    forbid_null(payload, &["name", "latitude", "longitude", "radius_meters", "is_active"])?;
    if let Some(name) = str_field(payload, "name")? {
        required_text("name", name, 150)?;
    }
    str_field(payload, "address")?;

    let latitude = f64_field(payload, "latitude")?.unwrap_or(current.latitude);
    let longitude = f64_field(payload, "longitude")?.unwrap_or(current.longitude);
    Coordinate::new(latitude, longitude).map_err(ApiError::bad_request)?;

    if let Some(radius) = f64_field(payload, "radius_meters")? {
        check_radius(radius, max_radius)?;
    }
    if payload.get("is_active").is_some_and(|v| !v.is_boolean()) {
        return Err(ApiError::bad_request("is_active harus berupa boolean"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/admin/office-locations",
    responses(
        (status = 200, description = "All office locations, active or not", body = [OfficeLocation])
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_offices(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let sql = format!("{OFFICE_SELECT} ORDER BY name");
    let rows = sqlx::query_as::<_, OfficeLocation>(&sql)
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    post,
    path = "/api/admin/office-locations",
    request_body = CreateOfficeLocation,
    responses(
        (status = 201, description = "Office location created", body = OfficeLocation),
        (status = 400, description = "Invalid coordinates or radius")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_office(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateOfficeLocation>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    required_text("name", &payload.name, 150)?;
    let centre = Coordinate::new(payload.latitude, payload.longitude).map_err(ApiError::bad_request)?;
    check_radius(payload.radius_meters, config.max_office_radius_m)?;

    let result = sqlx::query(
        r#"
        INSERT INTO office_locations (name, address, latitude, longitude, radius_meters, is_active)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.address.as_deref().map(str::trim).filter(|a| !a.is_empty()))
    .bind(centre.latitude)
    .bind(centre.longitude)
    .bind(payload.radius_meters)
    .bind(payload.is_active)
    .execute(pool.get_ref())
    .await?;

    location_cache::invalidate().await;

    let id = result.last_insert_id();
    info!(admin_id = auth.user_id, office_id = id, radius_m = payload.radius_meters, "Office location created");
    Ok(HttpResponse::Created().json(fetch_office(pool.get_ref(), id).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/office-locations/{id}",
    params(("id", Path, description = "Office location id")),
    request_body(content = Object, description = "Any of: name, address, latitude, longitude, radius_meters, is_active", example = json!({
        "radius_meters": 150.0,
        "is_active": true
    })),
    responses(
        (status = 200, description = "Updated office location", body = OfficeLocation),
        (status = 400, description = "Invalid coordinates or radius"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_office(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let update = build_update_sql("office_locations", &payload, UPDATABLE, "id", id)?;
    let current = fetch_office(pool.get_ref(), id).await?;
    validate_patch(&payload, &current, config.max_office_radius_m)?;

    execute_update(pool.get_ref(), update).await?;
    location_cache::invalidate().await;

    info!(admin_id = auth.user_id, office_id = id, "Office location updated");
    Ok(HttpResponse::Ok().json(fetch_office(pool.get_ref(), id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/office-locations/{id}",
    params(("id", Path, description = "Office location id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_office(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM office_locations WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Lokasi kantor tidak ditemukan"));
    }
    location_cache::invalidate().await;

    info!(admin_id = auth.user_id, office_id = id, "Office location deleted");
    Ok(HttpResponse::NoContent().finish())
}
