use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::office_location::OfficeLocation;

/// Mean Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, &'static str> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err("Latitude harus di antara -90 dan 90");
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err("Longitude harus di antara -180 dan 180");
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Great-circle distance in metres.
pub fn haversine_distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GeofenceMatch {
    pub office_id: u64,
    pub office_name: String,
    pub distance_m: f64,
    pub radius_m: f64,
    pub within: bool,
}

/// Closest office to `point`, whether or not it is inside the perimeter.
pub fn nearest_office(point: Coordinate, offices: &[OfficeLocation]) -> Option<GeofenceMatch> {
    offices
        .iter()
        .map(|office| {
            let centre = Coordinate {
                latitude: office.latitude,
                longitude: office.longitude,
            };
            (office, haversine_distance_m(point, centre))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(office, distance_m)| GeofenceMatch {
            office_id: office.id,
            office_name: office.name.clone(),
            distance_m,
            radius_m: office.radius_meters,
            within: distance_m <= office.radius_meters,
        })
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeofenceVerdict {
    Inside(GeofenceMatch),
    /// On an approved assignment; the nearest office is kept for the record.
    Exempt(Option<GeofenceMatch>),
}

impl GeofenceVerdict {
    pub fn office(&self) -> Option<&GeofenceMatch> {
        match self {
            Self::Inside(m) => Some(m),
            Self::Exempt(m) => m.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeofenceError {
    #[error("Belum ada lokasi kantor yang aktif")]
    NoOffices,
    #[error("Akurasi GPS {accuracy_m:.0} m terlalu rendah (maksimal {max_m:.0} m), coba lagi")]
    InaccurateFix { accuracy_m: f64, max_m: f64 },
    #[error(
        "Lokasi Anda berada di luar area kantor ({:.0} m dari {}, radius {:.0} m)",
        .0.distance_m, .0.office_name, .0.radius_m
    )]
    Outside(GeofenceMatch),
}

/// Decides whether a check-in/check-out at `point` may proceed.
///
/// Holders of an approved work letter for the day are exempt from the
/// perimeter and accuracy checks but the nearest office is still reported.
pub fn evaluate(
    point: Coordinate,
    accuracy_m: Option<f64>,
    offices: &[OfficeLocation],
    max_accuracy_m: f64,
    exempt: bool,
) -> Result<GeofenceVerdict, GeofenceError> {
    let nearest = nearest_office(point, offices);

    if exempt {
        return Ok(GeofenceVerdict::Exempt(nearest));
    }

    if let Some(accuracy_m) = accuracy_m {
        if accuracy_m > max_accuracy_m {
            return Err(GeofenceError::InaccurateFix {
                accuracy_m,
                max_m: max_accuracy_m,
            });
        }
    }

    match nearest {
        None => Err(GeofenceError::NoOffices),
        Some(m) if m.within => Ok(GeofenceVerdict::Inside(m)),
        Some(m) => Err(GeofenceError::Outside(m)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office(id: u64, name: &str, lat: f64, lon: f64, radius: f64) -> OfficeLocation {
        OfficeLocation {
            id,
            name: name.into(),
            address: None,
            latitude: lat,
            longitude: lon,
            radius_meters: radius,
            is_active: true,
        }
    }

    fn offices() -> Vec<OfficeLocation> {
        vec![
            office(1, "Kantor Pusat", -6.175392, 106.827153, 150.0),
            office(2, "UPT Wilayah Timur", -6.225014, 106.900447, 100.0),
        ]
    }

    #[test]
    fn distance_between_known_points() {
        // Monas to Bundaran HI, roughly 2.2 km.
        let monas = Coordinate::new(-6.175392, 106.827153).unwrap();
        let hi = Coordinate::new(-6.195097, 106.823019).unwrap();
        let d = haversine_distance_m(monas, hi);
        assert!((2150.0..2300.0).contains(&d), "distance was {d}");
        assert_eq!(haversine_distance_m(monas, monas), 0.0);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, -181.0).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn picks_nearest_office() {
        let p = Coordinate::new(-6.2251, 106.9005).unwrap();
        let m = nearest_office(p, &offices()).unwrap();
        assert_eq!(m.office_id, 2);
        assert!(m.within);
        assert!(nearest_office(p, &[]).is_none());
    }

    #[test]
    fn inside_perimeter_is_accepted() {
        let p = Coordinate::new(-6.1757, 106.8273).unwrap();
        let verdict = evaluate(p, Some(12.0), &offices(), 100.0, false).unwrap();
        assert_eq!(verdict.office().unwrap().office_name, "Kantor Pusat");
    }

    #[test]
    fn outside_perimeter_names_nearest_office() {
        let p = Coordinate::new(-6.1900, 106.8273).unwrap();
        let err = evaluate(p, None, &offices(), 100.0, false).unwrap_err();
        match &err {
            GeofenceError::Outside(m) => assert_eq!(m.office_id, 1),
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().contains("Kantor Pusat"));
    }

    #[test]
    fn inaccurate_fix_is_refused() {
        let p = Coordinate::new(-6.1757, 106.8273).unwrap();
        let err = evaluate(p, Some(350.0), &offices(), 100.0, false).unwrap_err();
        assert!(matches!(err, GeofenceError::InaccurateFix { .. }));
    }

    #[test]
    fn no_offices_configured() {
        let p = Coordinate::new(0.0, 0.0).unwrap();
        assert_eq!(
            evaluate(p, None, &[], 100.0, false).unwrap_err(),
            GeofenceError::NoOffices
        );
    }

    #[test]
    fn work_letter_exempts_from_perimeter() {
        let bandung = Coordinate::new(-6.917464, 107.619123).unwrap();
        let verdict = evaluate(bandung, Some(500.0), &offices(), 100.0, true).unwrap();
        match verdict {
            GeofenceVerdict::Exempt(Some(m)) => assert!(!m.within),
            other => panic!("unexpected {other:?}"),
        }
    }
}
