use crate::{auth::auth::AuthUser, error::ApiResult, utils::location_cache};
use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;

/// Active office perimeters, so the client can show the map before checking in.
#[utoipa::path(
    get,
    path = "/api/office-locations",
    responses(
        (status = 200, description = "Active office locations", body = [OfficeLocation])
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_active(_auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let offices = location_cache::active_offices(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(offices.as_slice()))
}
