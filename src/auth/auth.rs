use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::ADMIN_ROLE;
use crate::models::TokenType;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub nip: String,
    /// Role code, e.g. `ADMIN`, `SUPERVISOR`
    pub role: String,
    pub department_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by `auth_middleware` for everything under the API scope.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ApiError::Unauthorized("Token tidak ditemukan".into()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(ApiError::Internal(anyhow::anyhow!(
                    "config missing from app data"
                ))));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) if c.token_type == TokenType::Access => c,
            _ => return ready(Err(ApiError::Unauthorized("Token tidak valid".into()))),
        };

        ready(Ok(AuthUser {
            user_id: claims.user_id,
            nip: claims.sub,
            role: claims.role,
            department_id: claims.department_id,
        }))
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Hanya admin yang dapat mengakses fitur ini"))
        }
    }

    /// Owner of a record or an admin.
    pub fn require_self_or_admin(&self, owner_id: u64) -> Result<(), ApiError> {
        if self.user_id == owner_id || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Anda tidak memiliki akses ke data ini"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> AuthUser {
        AuthUser {
            user_id: 7,
            nip: "199001012019031001".into(),
            role: role.into(),
            department_id: Some(1),
        }
    }

    #[test]
    fn admin_checks() {
        assert!(user("ADMIN").require_admin().is_ok());
        assert!(user("EMPLOYEE").require_admin().is_err());
    }

    #[test]
    fn owner_or_admin() {
        assert!(user("EMPLOYEE").require_self_or_admin(7).is_ok());
        assert!(user("EMPLOYEE").require_self_or_admin(8).is_err());
        assert!(user("ADMIN").require_self_or_admin(8).is_ok());
    }
}
