//! Query geometries supplied by drawing or selection actions.

use geo::{Area as _, BoundingRect as _, Geometry, GeometryCollection, MultiPolygon, Rect};
use geojson::GeoJson;
use price_map_geography_models::Crs;

use crate::{Footprint, GeoError, projection};

/// One or more polygons/points tagged with the CRS they were drawn in.
///
/// Created per user interaction and discarded afterwards. An empty query
/// (no members, or members without coordinates) is representable so the
/// caller can distinguish "nothing drawn yet" from invalid input.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryGeometry {
    /// Member geometries; a tract matches if it intersects any member.
    pub geometries: GeometryCollection<f64>,
    /// CRS of the member coordinates.
    pub crs: Crs,
}

impl QueryGeometry {
    /// Builds a query from already-converted geometries.
    ///
    /// Nested geometry collections are flattened.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::UnsupportedGeometry`] for line geometries.
    pub fn new(geometries: Vec<Geometry<f64>>, crs: Crs) -> Result<Self, GeoError> {
        let mut members = Vec::with_capacity(geometries.len());
        for geometry in geometries {
            flatten_into(geometry, &mut members)?;
        }
        Ok(Self {
            geometries: GeometryCollection(members),
            crs,
        })
    }

    /// A query with no members.
    #[must_use]
    pub const fn empty(crs: Crs) -> Self {
        Self {
            geometries: GeometryCollection(Vec::new()),
            crs,
        }
    }

    /// Parses a `GeoJSON` geometry, feature or feature collection.
    ///
    /// Features without geometry are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the text is not valid `GeoJSON` or contains
    /// unsupported geometry types.
    pub fn from_geojson_str(text: &str, crs: Crs) -> Result<Self, GeoError> {
        let geojson: GeoJson = text.parse()?;
        Self::from_geojson(geojson, crs)
    }

    /// Converts a parsed `GeoJSON` value.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if any geometry fails to convert or has an
    /// unsupported type.
    pub fn from_geojson(geojson: GeoJson, crs: Crs) -> Result<Self, GeoError> {
        let raw = match geojson {
            GeoJson::Geometry(geometry) => vec![geometry],
            GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
            GeoJson::FeatureCollection(collection) => collection
                .features
                .into_iter()
                .filter_map(|feature| feature.geometry)
                .collect(),
        };

        let geometries = raw
            .into_iter()
            .map(Geometry::<f64>::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(geometries, crs)
    }

    /// Returns `true` if no member has any coordinate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometries
            .iter()
            .all(|geometry| geometry.bounding_rect().is_none())
    }

    /// Number of member geometries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.geometries.0.len()
    }

    /// Returns the same query expressed in `target` coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Projection`] if any coordinate cannot be
    /// transformed.
    pub fn reproject(&self, target: Crs) -> Result<Self, GeoError> {
        let geometries = self
            .geometries
            .iter()
            .map(|geometry| projection::reproject(geometry, self.crs, target))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            geometries: GeometryCollection(geometries),
            crs: target,
        })
    }

    /// Bounding rectangle of all members.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometries.bounding_rect()
    }

    /// Returns `true` if every member has zero area (points, collapsed
    /// polygons).
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.geometries.iter().all(is_degenerate)
    }
}

impl Footprint for QueryGeometry {
    fn footprint(&self) -> Geometry<f64> {
        Geometry::GeometryCollection(self.geometries.clone())
    }

    fn footprint_crs(&self) -> Crs {
        self.crs
    }
}

/// Returns `true` if the geometry encloses no area.
#[must_use]
pub fn is_degenerate(geometry: &Geometry<f64>) -> bool {
    geometry.unsigned_area() <= f64::EPSILON
}

fn flatten_into(geometry: Geometry<f64>, members: &mut Vec<Geometry<f64>>) -> Result<(), GeoError> {
    match geometry {
        Geometry::GeometryCollection(collection) => {
            for member in collection {
                flatten_into(member, members)?;
            }
            Ok(())
        }
        Geometry::Point(_)
        | Geometry::MultiPoint(_)
        | Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => {
            members.push(geometry);
            Ok(())
        }
        Geometry::Line(_) => Err(unsupported("Line")),
        Geometry::LineString(_) => Err(unsupported("LineString")),
        Geometry::MultiLineString(_) => Err(unsupported("MultiLineString")),
    }
}

fn unsupported(kind: &str) -> GeoError {
    GeoError::UnsupportedGeometry {
        kind: kind.to_string(),
    }
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
///
/// Handles both `Polygon` and `MultiPolygon` geometry types; anything else
/// yields `None`.
#[must_use]
pub fn geojson_to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        Geometry::MultiPolygon(mp) => Some(mp),
        Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRAWN: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[2.17, 41.40], [2.18, 41.40], [2.18, 41.41], [2.17, 41.40]]]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Point", "coordinates": [2.19, 41.39] }
            },
            { "type": "Feature", "properties": {}, "geometry": null }
        ]
    }"#;

    #[test]
    fn parses_drawn_feature_collection() {
        let query = QueryGeometry::from_geojson_str(DRAWN, Crs::Wgs84).unwrap();
        assert_eq!(query.len(), 2);
        assert!(!query.is_empty());
        assert!(!query.is_degenerate());
    }

    #[test]
    fn empty_collection_is_empty() {
        let query = QueryGeometry::from_geojson_str(
            r#"{"type": "FeatureCollection", "features": []}"#,
            Crs::Wgs84,
        )
        .unwrap();
        assert!(query.is_empty());
        assert!(QueryGeometry::empty(Crs::Wgs84).is_empty());
    }

    #[test]
    fn rejects_lines() {
        let result = QueryGeometry::from_geojson_str(
            r#"{"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}"#,
            Crs::Wgs84,
        );
        assert!(matches!(result, Err(GeoError::UnsupportedGeometry { .. })));
    }

    #[test]
    fn points_are_degenerate() {
        let query = QueryGeometry::from_geojson_str(
            r#"{"type": "Point", "coordinates": [2.19, 41.39]}"#,
            Crs::Wgs84,
        )
        .unwrap();
        assert!(query.is_degenerate());
    }

    #[test]
    fn reprojects_members() {
        let query = QueryGeometry::from_geojson_str(DRAWN, Crs::Wgs84).unwrap();
        let projected = query.reproject(Crs::ETRS89_UTM31N).unwrap();
        assert_eq!(projected.crs, Crs::ETRS89_UTM31N);
        let rect = projected.bounding_rect().unwrap();
        assert!(rect.min().x > 400_000.0 && rect.min().y > 4_500_000.0);
    }

    #[test]
    fn multipolygon_conversion() {
        let parse = |text: &str| match text.parse::<GeoJson>().unwrap() {
            GeoJson::Geometry(geometry) => geometry,
            other => panic!("expected a bare geometry, got {other:?}"),
        };

        let polygon = parse(
            r#"{"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]}"#,
        );
        assert_eq!(geojson_to_multipolygon(polygon).unwrap().0.len(), 1);

        let point = parse(r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#);
        assert!(geojson_to_multipolygon(point).is_none());
    }
}
