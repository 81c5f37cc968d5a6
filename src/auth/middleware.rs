use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::models::TokenType;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

/// The only route that takes `?token=`, for EventSource clients that cannot set headers.
const QUERY_TOKEN_PATH: &str = "/notifications/stream";

/// Bearer token from the Authorization header, or `?token=` on the notification stream.
fn extract_token(req: &ServiceRequest) -> Result<Option<String>, &'static str> {
    if let Some(h) = req.headers().get("Authorization") {
        let value = h
            .to_str()
            .map_err(|_| "Header Authorization tidak valid")?;
        return value
            .strip_prefix("Bearer ")
            .map(|t| Some(t.to_string()))
            .ok_or("Header Authorization harus diawali Bearer");
    }

    if !accepts_query_token(req.path()) {
        return Ok(None);
    }
    Ok(token_from_query(req.query_string()))
}

fn accepts_query_token(path: &str) -> bool {
    path.trim_end_matches('/').ends_with(QUERY_TOKEN_PATH)
}

fn token_from_query(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "token")
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

fn reject(req: ServiceRequest, message: &str) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(json!({ "error": message }));
    req.into_response(resp.map_into_boxed_body())
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let token = match extract_token(&req) {
        Ok(Some(t)) => t,
        Ok(None) => return Ok(reject(req, "Anda belum login")),
        Err(message) => return Ok(reject(req, message)),
    };

    let claims = match verify_token(&token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "rejected token");
            return Ok(reject(req, "Sesi tidak valid atau sudah berakhir"));
        }
    };

    if claims.token_type != TokenType::Access {
        return Ok(reject(req, "Gunakan access token"));
    }

    let auth_user = AuthUser {
        user_id: claims.user_id,
        nip: claims.sub,
        role: claims.role,
        department_id: claims.department_id,
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_access_token, generate_refresh_token};
    use actix_web::test::{TestRequest, call_and_read_body, call_service, init_service};
    use actix_web::{App, HttpResponse, http::StatusCode, middleware::from_fn, web};

    fn config() -> Config {
        Config::from_lookup(|k| match k {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/absensi".into()),
            "JWT_SECRET" => Some("middleware-secret".into()),
            _ => None,
        })
        .unwrap()
    }

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.nip)
    }

    fn subject() -> TokenSubject<'static> {
        TokenSubject {
            user_id: 5,
            nip: "198512122010012003",
            role: "EMPLOYEE",
            department_id: None,
        }
    }

    #[test]
    fn reads_token_from_query() {
        assert_eq!(token_from_query("a=1&token=abc"), Some("abc".to_string()));
        assert_eq!(token_from_query("token="), None);
        assert_eq!(token_from_query(""), None);
    }

    #[test]
    fn query_token_only_on_notification_stream() {
        assert!(accepts_query_token("/api/notifications/stream"));
        assert!(!accepts_query_token("/api/me"));
        assert!(!accepts_query_token("/api/notifications"));
    }

    #[actix_web::test]
    async fn missing_token_is_unauthorized() {
        let app = init_service(
            App::new().app_data(Data::new(config())).service(
                web::scope("/api")
                    .wrap(from_fn(auth_middleware))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let req = TestRequest::get().uri("/api/me").to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn access_token_passes_and_refresh_token_does_not() {
        let cfg = config();
        let access = generate_access_token(&subject(), &cfg.jwt_secret, 60).unwrap();
        let (refresh, _) = generate_refresh_token(&subject(), &cfg.jwt_secret, 60).unwrap();

        let app = init_service(
            App::new().app_data(Data::new(cfg)).service(
                web::scope("/api")
                    .wrap(from_fn(auth_middleware))
                    .route("/me", web::get().to(whoami))
                    .route("/notifications/stream", web::get().to(whoami)),
            ),
        )
        .await;

        let req = TestRequest::get()
            .uri("/api/me")
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_request();
        let body = call_and_read_body(&app, req).await;
        assert_eq!(std::str::from_utf8(&body).unwrap(), "198512122010012003");

        let req = TestRequest::get()
            .uri(&format!("/api/notifications/stream?token={refresh}"))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = TestRequest::get()
            .uri(&format!("/api/notifications/stream?token={access}"))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn query_token_is_ignored_outside_the_stream() {
        let cfg = config();
        let access = generate_access_token(&subject(), &cfg.jwt_secret, 60).unwrap();

        let app = init_service(
            App::new().app_data(Data::new(cfg)).service(
                web::scope("/api")
                    .wrap(from_fn(auth_middleware))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let req = TestRequest::get()
            .uri(&format!("/api/me?token={access}"))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
