use crate::error::ApiError;

pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ApiError::bad_request(format!(
            "{field} harus {min} sampai {max} karakter (saat ini {len})"
        )));
    }
    Ok(())
}

/// NIP: digits only. Civil servants carry 18 digits; contract staff ids are shorter.
pub fn check_nip(value: &str) -> Result<(), ApiError> {
    check_length("NIP", value, 8, 20)?;
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::bad_request("NIP hanya boleh berisi angka"));
    }
    Ok(())
}

pub fn check_email(value: &str) -> Result<(), ApiError> {
    check_length("email", value, 3, 254)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::bad_request("Format email tidak valid")),
    }
}

pub fn check_password(value: &str) -> Result<(), ApiError> {
    use crate::auth::password::MIN_PASSWORD_LEN;
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password minimal {MIN_PASSWORD_LEN} karakter"
        )));
    }
    Ok(())
}

pub fn check_radius(value: f64, max: f64) -> Result<(), ApiError> {
    if !value.is_finite() || value <= 0.0 || value > max {
        return Err(ApiError::bad_request(format!(
            "Radius harus lebih dari 0 dan maksimal {max:.0} meter"
        )));
    }
    Ok(())
}

pub fn required_text(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    check_length(field, value.trim(), 1, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nip_rules() {
        assert!(check_nip("198703152015031002").is_ok());
        assert!(check_nip("1987").is_err());
        assert!(check_nip("19870315201503100A").is_err());
    }

    #[test]
    fn email_rules() {
        assert!(check_email("siti@dinas.go.id").is_ok());
        assert!(check_email("siti.dinas.go.id").is_err());
        assert!(check_email("@dinas.go.id").is_err());
    }

    #[test]
    fn radius_rules() {
        assert!(check_radius(150.0, 5000.0).is_ok());
        assert!(check_radius(0.0, 5000.0).is_err());
        assert!(check_radius(6000.0, 5000.0).is_err());
        assert!(check_radius(f64::INFINITY, 5000.0).is_err());
    }

    #[test]
    fn text_rules() {
        assert!(required_text("alasan", "  ", 500).is_err());
        assert!(required_text("alasan", "Keperluan keluarga", 500).is_ok());
        assert!(check_password("pendek").is_err());
    }
}
