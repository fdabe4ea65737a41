//! Pointwise coordinate transforms between the supported [`Crs`] values.
//!
//! Every transform goes through geographic longitude/latitude. UTM uses
//! the Krüger n-series form of the transverse Mercator projection (4th
//! order, sub-millimeter within a zone), Web Mercator the spherical
//! formula. ETRS89 and WGS84 are treated as coincident datums.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use geo::{Coord, Geometry, MapCoords as _, MultiPolygon};
use price_map_geography_models::{Crs, Datum, Hemisphere, UtmZone};

use crate::GeoError;

const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Latitude at which Web Mercator becomes square.
const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

const UTM_SCALE: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Beyond this distance from the central meridian the series diverges.
const UTM_MAX_LON_OFFSET_DEG: f64 = 35.0;

/// Multipliers `2j` of the series harmonics.
const HARMONICS: [f64; 4] = [2.0, 4.0, 6.0, 8.0];

struct Ellipsoid {
    semi_major: f64,
    flattening: f64,
}

const WGS84: Ellipsoid = Ellipsoid {
    semi_major: 6_378_137.0,
    flattening: 1.0 / 298.257_223_563,
};

const GRS80: Ellipsoid = Ellipsoid {
    semi_major: 6_378_137.0,
    flattening: 1.0 / 298.257_222_101,
};

/// Transverse Mercator coefficients for one UTM zone.
struct TransverseMercator {
    /// `k0 * A`, the scaled rectifying radius.
    scaled_radius: f64,
    eccentricity: f64,
    alpha: [f64; 4],
    beta: [f64; 4],
    delta: [f64; 4],
    central_meridian: f64,
    false_northing: f64,
}

impl TransverseMercator {
    fn for_zone(zone: UtmZone) -> Self {
        let ellipsoid = match zone.datum {
            Datum::Wgs84 => &WGS84,
            Datum::Etrs89 => &GRS80,
        };

        let n = ellipsoid.flattening / (2.0 - ellipsoid.flattening);
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;

        let rectifying = ellipsoid.semi_major / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0);

        Self {
            scaled_radius: UTM_SCALE * rectifying,
            eccentricity: 2.0 * n.sqrt() / (1.0 + n),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
                61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
                49561.0 * n4 / 161_280.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
                n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
                17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
                4397.0 * n4 / 161_280.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3 + 116.0 * n4 / 45.0,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0 - 227.0 * n4 / 45.0,
                56.0 * n3 / 15.0 - 136.0 * n4 / 35.0,
                4279.0 * n4 / 630.0,
            ],
            central_meridian: zone.central_meridian(),
            false_northing: match zone.hemisphere {
                Hemisphere::North => 0.0,
                Hemisphere::South => UTM_FALSE_NORTHING_SOUTH,
            },
        }
    }

    fn forward(&self, lon: f64, lat: f64) -> Result<Coord<f64>, GeoError> {
        let offset = wrap_degrees(lon - self.central_meridian);
        if offset.abs() > UTM_MAX_LON_OFFSET_DEG {
            return Err(out_of_domain(format!(
                "longitude {lon} is {offset:.1}° from the UTM central meridian {}",
                self.central_meridian
            )));
        }

        let phi = lat.to_radians();
        let lambda = offset.to_radians();
        let sin_phi = phi.sin();
        let e = self.eccentricity;

        let t = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();
        let xi_prime = t.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / t.mul_add(t, 1.0).sqrt()).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (alpha, k) in self.alpha.iter().zip(HARMONICS) {
            xi += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        Ok(Coord {
            x: self.scaled_radius.mul_add(eta, UTM_FALSE_EASTING),
            y: self.scaled_radius.mul_add(xi, self.false_northing),
        })
    }

    fn inverse(&self, easting: f64, northing: f64) -> Result<Coord<f64>, GeoError> {
        let xi = (northing - self.false_northing) / self.scaled_radius;
        let eta = (easting - UTM_FALSE_EASTING) / self.scaled_radius;

        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (beta, k) in self.beta.iter().zip(HARMONICS) {
            xi_prime -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_prime.sin() / eta_prime.cosh()).asin();
        let mut phi = chi;
        for (delta, k) in self.delta.iter().zip(HARMONICS) {
            phi += delta * (k * chi).sin();
        }

        let offset = eta_prime.sinh().atan2(xi_prime.cos()).to_degrees();
        if !phi.is_finite() || offset.abs() > UTM_MAX_LON_OFFSET_DEG {
            return Err(out_of_domain(format!(
                "UTM coordinate ({easting}, {northing}) is outside the zone's valid range"
            )));
        }

        Ok(Coord {
            x: wrap_degrees(self.central_meridian + offset),
            y: phi.to_degrees(),
        })
    }
}

fn out_of_domain(message: String) -> GeoError {
    GeoError::Projection { message }
}

/// Wraps a longitude difference into `[-180, 180]`.
fn wrap_degrees(deg: f64) -> f64 {
    if (-180.0..=180.0).contains(&deg) {
        deg
    } else {
        (deg + 180.0).rem_euclid(360.0) - 180.0
    }
}

fn check_finite(coord: Coord<f64>, crs: Crs) -> Result<(), GeoError> {
    if coord.x.is_finite() && coord.y.is_finite() {
        Ok(())
    } else {
        Err(out_of_domain(format!(
            "non-finite coordinate ({}, {}) in {crs}",
            coord.x, coord.y
        )))
    }
}

fn check_geographic(coord: Coord<f64>) -> Result<(), GeoError> {
    if (-180.0..=180.0).contains(&coord.x) && (-90.0..=90.0).contains(&coord.y) {
        Ok(())
    } else {
        Err(out_of_domain(format!(
            "geographic coordinate ({}, {}) is outside ±180°/±90°",
            coord.x, coord.y
        )))
    }
}

/// Converts a coordinate in `crs` to geographic longitude/latitude.
fn to_geographic(coord: Coord<f64>, crs: Crs) -> Result<Coord<f64>, GeoError> {
    check_finite(coord, crs)?;
    let geographic = match crs {
        Crs::Wgs84 => coord,
        Crs::WebMercator => {
            let limit = PI * WEB_MERCATOR_RADIUS;
            if coord.x.abs() > limit * (1.0 + 1e-9) || coord.y.abs() > limit * (1.0 + 1e-9) {
                return Err(out_of_domain(format!(
                    "Web Mercator coordinate ({}, {}) is outside the projected extent",
                    coord.x, coord.y
                )));
            }
            Coord {
                x: (coord.x / WEB_MERCATOR_RADIUS).to_degrees(),
                y: 2.0f64
                    .mul_add((coord.y / WEB_MERCATOR_RADIUS).exp().atan(), -FRAC_PI_2)
                    .to_degrees(),
            }
        }
        Crs::Utm(zone) => TransverseMercator::for_zone(zone).inverse(coord.x, coord.y)?,
    };
    check_geographic(geographic)?;
    Ok(geographic)
}

/// Converts a geographic longitude/latitude coordinate into `crs`.
fn from_geographic(coord: Coord<f64>, crs: Crs) -> Result<Coord<f64>, GeoError> {
    check_geographic(coord)?;
    let projected = match crs {
        Crs::Wgs84 => coord,
        Crs::WebMercator => {
            if coord.y.abs() > WEB_MERCATOR_MAX_LAT {
                return Err(out_of_domain(format!(
                    "latitude {} is outside the Web Mercator range ±{WEB_MERCATOR_MAX_LAT}",
                    coord.y
                )));
            }
            Coord {
                x: WEB_MERCATOR_RADIUS * coord.x.to_radians(),
                y: WEB_MERCATOR_RADIUS * coord.y.to_radians().mul_add(0.5, FRAC_PI_4).tan().ln(),
            }
        }
        Crs::Utm(zone) => TransverseMercator::for_zone(zone).forward(coord.x, coord.y)?,
    };
    check_finite(projected, crs)?;
    Ok(projected)
}

/// Transforms a single coordinate from `source` to `target`.
///
/// Identical systems return the coordinate unchanged.
///
/// # Errors
///
/// Returns [`GeoError::Projection`] if the coordinate is non-finite or
/// outside either system's domain.
pub fn reproject_coord(coord: Coord<f64>, source: Crs, target: Crs) -> Result<Coord<f64>, GeoError> {
    if source == target {
        check_finite(coord, source)?;
        return Ok(coord);
    }
    from_geographic(to_geographic(coord, source)?, target)
}

/// Transforms every coordinate of a geometry from `source` to `target`.
///
/// # Errors
///
/// Returns [`GeoError::Projection`] if any coordinate cannot be
/// transformed.
pub fn reproject(
    geometry: &Geometry<f64>,
    source: Crs,
    target: Crs,
) -> Result<Geometry<f64>, GeoError> {
    if source == target {
        return Ok(geometry.clone());
    }
    geometry.try_map_coords(|coord| reproject_coord(coord, source, target))
}

/// Transforms a [`MultiPolygon`] from `source` to `target`.
///
/// # Errors
///
/// Returns [`GeoError::Projection`] if any coordinate cannot be
/// transformed.
pub fn reproject_multi_polygon(
    polygon: &MultiPolygon<f64>,
    source: Crs,
    target: Crs,
) -> Result<MultiPolygon<f64>, GeoError> {
    if source == target {
        return Ok(polygon.clone());
    }
    polygon.try_map_coords(|coord| reproject_coord(coord, source, target))
}

#[cfg(test)]
mod tests {
    use geo::{Polygon, polygon};

    use super::*;

    fn utm30n() -> Crs {
        Crs::from_epsg(25830).unwrap()
    }

    fn assert_close(actual: Coord<f64>, expected: Coord<f64>, tolerance: f64) {
        assert!(
            (actual.x - expected.x).abs() < tolerance && (actual.y - expected.y).abs() < tolerance,
            "{actual:?} differs from {expected:?} by more than {tolerance}"
        );
    }

    #[test]
    fn central_meridian_on_equator_maps_to_false_easting() {
        let coord = reproject_coord(Coord { x: 3.0, y: 0.0 }, Crs::Wgs84, Crs::ETRS89_UTM31N)
            .unwrap();
        assert_close(coord, Coord { x: 500_000.0, y: 0.0 }, 1e-6);
    }

    #[test]
    fn barcelona_in_utm31n() {
        let coord = reproject_coord(
            Coord {
                x: 2.179_24,
                y: 41.404_63,
            },
            Crs::Wgs84,
            Crs::ETRS89_UTM31N,
        )
        .unwrap();
        assert!((coord.x - 431_396.39).abs() < 0.5, "easting {}", coord.x);
        assert!((coord.y - 4_584_001.40).abs() < 0.5, "northing {}", coord.y);
    }

    #[test]
    fn utm_roundtrip_is_sub_millimeter() {
        let original = Coord {
            x: 2.179_24,
            y: 41.404_63,
        };
        for target in [utm30n(), Crs::ETRS89_UTM31N, Crs::WebMercator] {
            let projected = reproject_coord(original, Crs::Wgs84, target).unwrap();
            let back = reproject_coord(projected, target, Crs::Wgs84).unwrap();
            assert_close(back, original, 1e-8);
        }
    }

    #[test]
    fn between_utm_zones() {
        let original = Coord {
            x: 2.179_24,
            y: 41.404_63,
        };
        let z31 = reproject_coord(original, Crs::Wgs84, Crs::ETRS89_UTM31N).unwrap();
        let z30 = reproject_coord(z31, Crs::ETRS89_UTM31N, utm30n()).unwrap();
        let direct = reproject_coord(original, Crs::Wgs84, utm30n()).unwrap();
        assert_close(z30, direct, 1e-3);
    }

    #[test]
    fn southern_hemisphere_uses_false_northing() {
        let crs = Crs::from_epsg(32733).unwrap();
        let coord = reproject_coord(Coord { x: 15.0, y: -10.0 }, Crs::Wgs84, crs).unwrap();
        assert!(coord.y > 8_000_000.0 && coord.y < UTM_FALSE_NORTHING_SOUTH);
        let back = reproject_coord(coord, crs, Crs::Wgs84).unwrap();
        assert_close(back, Coord { x: 15.0, y: -10.0 }, 1e-8);
    }

    #[test]
    fn same_crs_is_identity() {
        let polygon: Polygon<f64> = polygon![
            (x: 431_000.123_456_7, y: 4_583_000.765_432_1),
            (x: 431_100.0, y: 4_583_000.0),
            (x: 431_100.0, y: 4_583_100.0),
        ];
        let geometry = Geometry::Polygon(polygon);
        let out = reproject(&geometry, Crs::ETRS89_UTM31N, Crs::ETRS89_UTM31N).unwrap();
        assert_eq!(out, geometry);
    }

    #[test]
    fn rejects_out_of_domain_coordinates() {
        assert!(reproject_coord(Coord { x: 2.0, y: 95.0 }, Crs::Wgs84, Crs::ETRS89_UTM31N).is_err());
        assert!(reproject_coord(Coord { x: 120.0, y: 40.0 }, Crs::Wgs84, Crs::ETRS89_UTM31N).is_err());
        assert!(reproject_coord(Coord { x: 0.0, y: 89.0 }, Crs::Wgs84, Crs::WebMercator).is_err());
        assert!(
            reproject_coord(
                Coord {
                    x: f64::NAN,
                    y: 0.0
                },
                Crs::Wgs84,
                Crs::WebMercator
            )
            .is_err()
        );
    }

    #[test]
    fn geometry_reprojection_transforms_every_vertex() {
        let polygon: Polygon<f64> = polygon![
            (x: 2.17, y: 41.40),
            (x: 2.18, y: 41.40),
            (x: 2.18, y: 41.41),
            (x: 2.17, y: 41.41),
        ];
        let projected = reproject(&Geometry::Polygon(polygon), Crs::Wgs84, Crs::ETRS89_UTM31N).unwrap();
        let Geometry::Polygon(projected) = projected else {
            panic!("expected a polygon");
        };
        assert!(projected.exterior().coords().all(|c| c.x > 400_000.0 && c.y > 4_500_000.0));
    }

    #[test]
    fn unknown_label_is_projection_error() {
        let result = "EPSG:9999".parse::<Crs>().map_err(GeoError::from);
        assert!(matches!(result, Err(GeoError::Projection { .. })));
    }
}
