//! Pure value conversions applied by the telemetry router.

/// Converts solar irradiance (W/m²) to illuminance (lux).
///
/// The vendor reports irradiance; the controller profile displays lux.
/// 0.0079 W/m² per lux, rounded to whole lux.
pub fn illuminance_from_irradiance(watts_per_m2: f64) -> f64 {
    (watts_per_m2 / 0.0079).round()
}

/// Maps a wind direction in degrees to a 16-point compass sector (1..=16).
///
/// Sector 1 is centered on north and covers [348.75, 360] plus [0, 11.25);
/// each further sector spans 22.5°. Anything outside [0, 360] (including
/// NaN) maps to the sentinel 0, "unknown sector".
pub fn compass_sector_16(degrees: f64) -> i64 {
    if !(0.0..=360.0).contains(&degrees) {
        return 0;
    }

    if degrees >= 348.75 {
        return 1;
    }

    ((degrees + 11.25) / 22.5) as i64 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illuminance_conversion_factor() {
        assert_eq!(illuminance_from_irradiance(7.9), 1000.0);
        assert_eq!(illuminance_from_irradiance(0.0), 0.0);
    }

    #[test]
    fn test_illuminance_rounds_to_whole_lux() {
        assert_eq!(illuminance_from_irradiance(400.0), 50633.0);
        assert_eq!(illuminance_from_irradiance(1.0), 127.0);
    }

    #[test]
    fn test_north_sector_wraps() {
        assert_eq!(compass_sector_16(0.0), 1);
        assert_eq!(compass_sector_16(11.24), 1);
        assert_eq!(compass_sector_16(348.75), 1);
        assert_eq!(compass_sector_16(359.9), 1);
        assert_eq!(compass_sector_16(360.0), 1);
    }

    #[test]
    fn test_sector_boundaries() {
        assert_eq!(compass_sector_16(11.25), 2);
        assert_eq!(compass_sector_16(33.74), 2);
        assert_eq!(compass_sector_16(33.75), 3);
        assert_eq!(compass_sector_16(180.0), 9);
        assert_eq!(compass_sector_16(348.74), 16);
    }

    #[test]
    fn test_out_of_range_is_unknown() {
        assert_eq!(compass_sector_16(-1.0), 0);
        assert_eq!(compass_sector_16(360.1), 0);
        assert_eq!(compass_sector_16(f64::NAN), 0);
    }
}
