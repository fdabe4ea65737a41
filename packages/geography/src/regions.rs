//! Census tract polygons.
//!
//! Parses a tract `GeoJSON` `FeatureCollection` (one feature per tract,
//! with a `CENSUSTRACT` property) into [`Region`] values. Loaded once per
//! session and only borrowed afterwards.

use geo::{Geometry, MultiPolygon};
use geojson::{Feature, GeoJson};
use price_map_geography_models::{Crs, TractId};

use crate::geometry::geojson_to_multipolygon;
use crate::{Footprint, GeoError};

/// Property holding the census tract code in tract and intervention files.
pub const TRACT_PROPERTY: &str = "CENSUSTRACT";

/// A census tract with its polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Normalized tract identifier.
    pub id: TractId,
    /// Tract boundary.
    pub geometry: MultiPolygon<f64>,
    /// CRS of [`Region::geometry`].
    pub crs: Crs,
}

impl Footprint for Region {
    fn footprint(&self) -> Geometry<f64> {
        Geometry::MultiPolygon(self.geometry.clone())
    }

    fn footprint_crs(&self) -> Crs {
        self.crs
    }
}

/// Normalizes a tract code stored as a JSON string or number.
///
/// # Errors
///
/// Returns [`GeoError::Identifier`] if the value is not a valid tract
/// code, or [`GeoError::Conversion`] for other JSON types.
pub fn tract_id_from_json(value: &serde_json::Value) -> Result<TractId, GeoError> {
    match value {
        serde_json::Value::String(s) => Ok(TractId::parse(s)?),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(TractId::from_integer(i)?)
            } else if let Some(f) = n.as_f64() {
                Ok(TractId::from_f64(f)?)
            } else {
                Err(GeoError::Conversion {
                    message: format!("Tract code {n} is out of range"),
                })
            }
        }
        other => Err(GeoError::Conversion {
            message: format!("Expected a tract code, found {other}"),
        }),
    }
}

/// Extracts the normalized tract id of a feature.
///
/// # Errors
///
/// Returns [`GeoError`] if the property is missing or invalid.
pub fn feature_tract_id(feature: &Feature) -> Result<TractId, GeoError> {
    let value = feature
        .property(TRACT_PROPERTY)
        .ok_or_else(|| GeoError::Conversion {
            message: format!("Feature is missing the {TRACT_PROPERTY} property"),
        })?;
    tract_id_from_json(value)
}

/// Parses a tract `GeoJSON` document.
///
/// Features without a polygonal geometry are skipped with a warning; an
/// invalid tract code fails the whole load.
///
/// # Errors
///
/// Returns [`GeoError`] if the document is not a `FeatureCollection` or a
/// tract code is invalid.
pub fn regions_from_geojson(text: &str, crs: Crs) -> Result<Vec<Region>, GeoError> {
    let GeoJson::FeatureCollection(collection) = text.parse::<GeoJson>()? else {
        return Err(GeoError::Conversion {
            message: "Tract file must be a GeoJSON FeatureCollection".to_string(),
        });
    };

    let mut regions = Vec::with_capacity(collection.features.len());

    for feature in collection.features {
        let id = feature_tract_id(&feature)?;

        let Some(geometry) = feature.geometry.and_then(geojson_to_multipolygon) else {
            log::warn!("Skipping tract {id}: missing or non-polygonal geometry");
            continue;
        };

        regions.push(Region { id, geometry, crs });
    }

    log::debug!("Parsed {} tract polygons", regions.len());

    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "CENSUSTRACT": 801901001 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[2.17, 41.40], [2.18, 41.40], [2.18, 41.41], [2.17, 41.41], [2.17, 41.40]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "CENSUSTRACT": "0801901002" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[2.18, 41.40], [2.19, 41.40], [2.19, 41.41], [2.18, 41.41], [2.18, 41.40]]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "CENSUSTRACT": "801901003" },
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn parses_tracts_and_normalizes_ids() {
        let regions = regions_from_geojson(TRACTS, Crs::Wgs84).unwrap();
        let ids: Vec<&str> = regions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0801901001", "0801901002"]);
        assert!(regions.iter().all(|r| r.crs == Crs::Wgs84));
    }

    #[test]
    fn invalid_tract_code_fails() {
        let text = TRACTS.replace(r#""CENSUSTRACT": 801901001"#, r#""CENSUSTRACT": "x1""#);
        assert!(matches!(
            regions_from_geojson(&text, Crs::Wgs84),
            Err(GeoError::Identifier(_))
        ));
    }

    #[test]
    fn rejects_non_collections() {
        assert!(
            regions_from_geojson(r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#, Crs::Wgs84)
                .is_err()
        );
    }

    #[test]
    fn tract_codes_from_json_values() {
        assert_eq!(
            tract_id_from_json(&serde_json::json!(801_901_001.0))
                .unwrap()
                .as_str(),
            "0801901001"
        );
        assert!(tract_id_from_json(&serde_json::json!(true)).is_err());
    }
}
