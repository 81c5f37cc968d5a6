//! Admin-only CRUD. Every handler starts with `auth.require_admin()`.

pub mod departments;
pub mod office_locations;
pub mod roles;
pub mod users;
pub mod workflows;

use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// String value of `key` in a partial-update payload, if present.
/// Present-but-not-a-string is a client error.
pub(crate) fn str_field<'a>(payload: &'a Value, key: &str) -> ApiResult<Option<&'a str>> {
    match payload.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(Value::Null) => Ok(None),
        Some(_) => Err(ApiError::bad_request(format!("{key} harus berupa teks"))),
    }
}

/// Numeric value of `key` in a partial-update payload, if present.
pub(crate) fn f64_field(payload: &Value, key: &str) -> ApiResult<Option<f64>> {
    match payload.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| ApiError::bad_request(format!("{key} harus berupa angka"))),
    }
}

/// Rejects an explicit `null` for columns that are NOT NULL.
pub(crate) fn forbid_null(payload: &Value, keys: &[&str]) -> ApiResult<()> {
    for key in keys {
        if matches!(payload.get(*key), Some(Value::Null)) {
            return Err(ApiError::bad_request(format!("{key} tidak boleh kosong")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_helpers_check_types() {
        let payload = json!({ "name": "Kantor Cabang", "radius_meters": 150, "address": null });
        assert_eq!(str_field(&payload, "name").unwrap(), Some("Kantor Cabang"));
        assert_eq!(str_field(&payload, "address").unwrap(), None);
        assert!(str_field(&payload, "radius_meters").is_err());
        assert_eq!(f64_field(&payload, "radius_meters").unwrap(), Some(150.0));
        assert!(f64_field(&payload, "name").is_err());
        assert!(forbid_null(&payload, &["address"]).is_err());
        assert!(forbid_null(&payload, &["name"]).is_ok());
    }
}
