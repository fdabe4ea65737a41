//! Coordinate reference system labels.
//!
//! Only the systems the analysis actually meets are supported: geographic
//! WGS84 (drawn geometries and published tract files), Web Mercator (map
//! widgets) and the UTM zones of ETRS89 and WGS84 (metric analysis).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned for a CRS label that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrsError {
    /// The label could not be parsed or names an unsupported system.
    #[error("Unrecognized coordinate reference system '{label}'")]
    Unknown {
        /// The rejected label.
        label: String,
    },
}

/// Geodetic datum of a UTM zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datum {
    /// WGS84 ellipsoid (`EPSG:326xx` / `EPSG:327xx`).
    Wgs84,
    /// ETRS89 on the GRS80 ellipsoid (`EPSG:258xx`).
    Etrs89,
}

/// Hemisphere of a UTM zone (selects the false northing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hemisphere {
    /// Northern hemisphere, false northing 0 m.
    North,
    /// Southern hemisphere, false northing 10 000 000 m.
    South,
}

/// A Universal Transverse Mercator zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtmZone {
    /// Zone number (1-60).
    pub zone: u8,
    /// Hemisphere.
    pub hemisphere: Hemisphere,
    /// Geodetic datum.
    pub datum: Datum,
}

impl UtmZone {
    /// Longitude of the zone's central meridian in degrees.
    #[must_use]
    pub fn central_meridian(self) -> f64 {
        f64::from(self.zone).mul_add(6.0, -183.0)
    }
}

/// A supported coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    /// Geographic longitude/latitude in degrees (`EPSG:4326`, `CRS84`).
    Wgs84,
    /// Spherical Web Mercator in meters (`EPSG:3857`).
    WebMercator,
    /// UTM projection in meters.
    Utm(UtmZone),
}

impl Crs {
    /// ETRS89 / UTM zone 31N, the default metric system for Barcelona.
    pub const ETRS89_UTM31N: Self = Self::Utm(UtmZone {
        zone: 31,
        hemisphere: Hemisphere::North,
        datum: Datum::Etrs89,
    });

    /// Resolves an EPSG code.
    #[must_use]
    pub fn from_epsg(code: u32) -> Option<Self> {
        let zone = |offset: u32| u8::try_from(code - offset).ok();
        match code {
            4326 => Some(Self::Wgs84),
            3857 | 900_913 => Some(Self::WebMercator),
            25828..=25838 => Some(Self::Utm(UtmZone {
                zone: zone(25800)?,
                hemisphere: Hemisphere::North,
                datum: Datum::Etrs89,
            })),
            32601..=32660 => Some(Self::Utm(UtmZone {
                zone: zone(32600)?,
                hemisphere: Hemisphere::North,
                datum: Datum::Wgs84,
            })),
            32701..=32760 => Some(Self::Utm(UtmZone {
                zone: zone(32700)?,
                hemisphere: Hemisphere::South,
                datum: Datum::Wgs84,
            })),
            _ => None,
        }
    }

    /// Returns the EPSG code of this system.
    #[must_use]
    pub fn epsg(self) -> u32 {
        match self {
            Self::Wgs84 => 4326,
            Self::WebMercator => 3857,
            Self::Utm(utm) => {
                let base = match (utm.datum, utm.hemisphere) {
                    (Datum::Etrs89, _) => 25800,
                    (Datum::Wgs84, Hemisphere::North) => 32600,
                    (Datum::Wgs84, Hemisphere::South) => 32700,
                };
                base + u32::from(utm.zone)
            }
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for Crs {
    type Err = CrsError;

    /// Parses `EPSG:<code>`, `urn:ogc:def:crs:EPSG::<code>` and the OGC
    /// `CRS84` aliases (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || CrsError::Unknown {
            label: s.to_string(),
        };
        let label = s.trim().to_ascii_uppercase();

        if label == "CRS84" || label == "URN:OGC:DEF:CRS:OGC:1.3:CRS84" || label == "WGS84" {
            return Ok(Self::Wgs84);
        }

        let code = label
            .strip_prefix("EPSG:")
            .or_else(|| label.strip_prefix("URN:OGC:DEF:CRS:EPSG::"))
            .or_else(|| label.strip_prefix("URN:OGC:DEF:CRS:EPSG:"))
            .ok_or_else(unknown)?;

        code.parse::<u32>()
            .ok()
            .and_then(Self::from_epsg)
            .ok_or_else(unknown)
    }
}

impl TryFrom<String> for Crs {
    type Error = CrsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_labels() {
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::Wgs84);
        assert_eq!("epsg:3857".parse::<Crs>().unwrap(), Crs::WebMercator);
        assert_eq!(
            "urn:ogc:def:crs:OGC:1.3:CRS84".parse::<Crs>().unwrap(),
            Crs::Wgs84
        );
        assert_eq!(
            "urn:ogc:def:crs:EPSG::25831".parse::<Crs>().unwrap(),
            Crs::ETRS89_UTM31N
        );
    }

    #[test]
    fn epsg_roundtrip() {
        for code in [4326, 3857, 25828, 25830, 25831, 25838, 32601, 32631, 32760] {
            let crs = Crs::from_epsg(code).unwrap();
            assert_eq!(crs.epsg(), code, "roundtrip failed for EPSG:{code}");
            assert_eq!(crs.to_string().parse::<Crs>().unwrap(), crs);
        }
    }

    #[test]
    fn rejects_unknown_labels() {
        assert!("EPSG:2154".parse::<Crs>().is_err());
        assert!("EPSG:abc".parse::<Crs>().is_err());
        assert!("UTM31".parse::<Crs>().is_err());
        assert!(Crs::from_epsg(25839).is_none());
    }

    #[test]
    fn central_meridians() {
        assert_eq!(Crs::ETRS89_UTM31N.epsg(), 25831);
        let Crs::Utm(zone) = Crs::from_epsg(25830).unwrap() else {
            panic!("expected UTM");
        };
        assert!((zone.central_meridian() - -3.0).abs() < 1e-12);
    }
}
