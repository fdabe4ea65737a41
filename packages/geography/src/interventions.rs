//! Urban interventions (superblocks, green axes, street redesigns).
//!
//! Each intervention has a footprint, the census tract it is registered
//! against, a start date and an actual end date that is null while the
//! works are ongoing.

use chrono::NaiveDate;
use geo::Geometry;
use geojson::{Feature, GeoJson};
use price_map_geography_models::{Crs, TractId};

use crate::regions::feature_tract_id;
use crate::{Footprint, GeoError};

const TITLE_PROPERTY: &str = "TITOL_WO";
const START_PROPERTY: &str = "DATA_INICI";
const END_PROPERTY: &str = "DATA_FI_REAL";
const ID_PROPERTY: &str = "ID";

/// An urban policy action with a footprint and a time window.
#[derive(Debug, Clone, PartialEq)]
pub struct Intervention {
    /// Source identifier (the `ID` property, the feature id, or the
    /// feature's position in the file).
    pub id: String,
    /// Full title as published.
    pub title: String,
    /// Tract the intervention is registered against.
    pub tract: TractId,
    /// Start of works.
    pub start: NaiveDate,
    /// Actual end of works; `None` while ongoing.
    pub end: Option<NaiveDate>,
    /// Footprint of the intervention.
    pub geometry: Geometry<f64>,
    /// CRS of [`Intervention::geometry`].
    pub crs: Crs,
}

impl Intervention {
    /// Returns `true` if `selector` names this intervention by id or by
    /// (whitespace-trimmed) title.
    #[must_use]
    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        self.id == selector || self.title.trim() == selector
    }
}

impl Footprint for Intervention {
    fn footprint(&self) -> Geometry<f64> {
        self.geometry.clone()
    }

    fn footprint_crs(&self) -> Crs {
        self.crs
    }
}

/// Parses a date as written by the intervention registry exports.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `DD/MM/YYYY` and ISO datetimes
/// (`YYYY-MM-DDTHH:MM:SS`, optionally with a zone suffix, whose date
/// part is used).
///
/// # Errors
///
/// Returns [`GeoError::Conversion`] if no format matches.
pub fn parse_date(s: &str) -> Result<NaiveDate, GeoError> {
    let trimmed = s.trim();
    let date_part = trimmed
        .split_once(['T', ' '])
        .map_or(trimmed, |(date, _)| date);

    ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .ok_or_else(|| GeoError::Conversion {
            message: format!("Invalid date '{s}'. Expected format: YYYY-MM-DD"),
        })
}

fn string_property(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key)? {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| s.clone())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn date_property(feature: &Feature, key: &str) -> Result<Option<NaiveDate>, GeoError> {
    string_property(feature, key)
        .map(|value| parse_date(&value))
        .transpose()
}

fn feature_id(feature: &Feature, position: usize) -> String {
    string_property(feature, ID_PROPERTY)
        .or_else(|| {
            feature.id.as_ref().map(|id| match id {
                geojson::feature::Id::String(s) => s.clone(),
                geojson::feature::Id::Number(n) => n.to_string(),
            })
        })
        .unwrap_or_else(|| format!("intervention-{position}"))
}

/// Parses an intervention `GeoJSON` `FeatureCollection`.
///
/// Features without a title or geometry are skipped with a warning.
///
/// # Errors
///
/// Returns [`GeoError`] if the document is not a `FeatureCollection`, a
/// tract code is invalid, a start date is missing, or a date is
/// malformed.
pub fn interventions_from_geojson(text: &str, crs: Crs) -> Result<Vec<Intervention>, GeoError> {
    let GeoJson::FeatureCollection(collection) = text.parse::<GeoJson>()? else {
        return Err(GeoError::Conversion {
            message: "Intervention file must be a GeoJSON FeatureCollection".to_string(),
        });
    };

    let mut interventions = Vec::with_capacity(collection.features.len());

    for (position, feature) in collection.features.iter().enumerate() {
        let id = feature_id(feature, position);

        let Some(title) = string_property(feature, TITLE_PROPERTY) else {
            log::warn!("Skipping intervention {id}: no {TITLE_PROPERTY}");
            continue;
        };

        let Some(geometry) = feature.geometry.clone() else {
            log::warn!("Skipping intervention '{title}': no geometry");
            continue;
        };
        let geometry = Geometry::<f64>::try_from(geometry)?;

        let tract = feature_tract_id(feature)?;
        let start = date_property(feature, START_PROPERTY)?.ok_or_else(|| GeoError::Conversion {
            message: format!("Intervention '{title}' has no {START_PROPERTY}"),
        })?;
        let end = date_property(feature, END_PROPERTY)?;

        interventions.push(Intervention {
            id,
            title,
            tract,
            start,
            end,
            geometry,
            crs,
        });
    }

    log::debug!("Parsed {} interventions", interventions.len());

    Ok(interventions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVENTIONS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {
                    "ID": 7,
                    "TITOL_WO": "Superilla de Poblenou",
                    "CENSUSTRACT": 801910001,
                    "DATA_INICI": "2016-09-01",
                    "DATA_FI_REAL": "2017-03-15T00:00:00"
                },
                "geometry": { "type": "Point", "coordinates": [2.20, 41.40] }
            },
            {
                "type": "Feature",
                "properties": {
                    "TITOL_WO": "Eix verd Sant Antoni",
                    "CENSUSTRACT": "0801903004",
                    "DATA_INICI": "15/01/2018",
                    "DATA_FI_REAL": null
                },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[2.16, 41.37], [2.17, 41.37], [2.17, 41.38], [2.16, 41.37]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "CENSUSTRACT": "0801903004", "DATA_INICI": "2018-01-01" },
                "geometry": { "type": "Point", "coordinates": [2.16, 41.37] }
            }
        ]
    }"#;

    #[test]
    fn parses_interventions() {
        let interventions = interventions_from_geojson(INTERVENTIONS, Crs::Wgs84).unwrap();
        assert_eq!(interventions.len(), 2);

        let poblenou = &interventions[0];
        assert_eq!(poblenou.id, "7");
        assert_eq!(poblenou.tract.as_str(), "0801910001");
        assert_eq!(poblenou.start, NaiveDate::from_ymd_opt(2016, 9, 1).unwrap());
        assert_eq!(poblenou.end, NaiveDate::from_ymd_opt(2017, 3, 15));

        let sant_antoni = &interventions[1];
        assert_eq!(sant_antoni.id, "intervention-1");
        assert_eq!(sant_antoni.start, NaiveDate::from_ymd_opt(2018, 1, 15).unwrap());
        assert!(sant_antoni.end.is_none());
    }

    #[test]
    fn matches_by_id_or_trimmed_title() {
        let interventions = interventions_from_geojson(INTERVENTIONS, Crs::Wgs84).unwrap();
        assert!(interventions[0].matches("7"));
        assert!(interventions[0].matches(" Superilla de Poblenou "));
        assert!(!interventions[0].matches("Poblenou"));
    }

    #[test]
    fn rejects_bad_dates() {
        let text = INTERVENTIONS.replace("2016-09-01", "September 2016");
        assert!(matches!(
            interventions_from_geojson(&text, Crs::Wgs84),
            Err(GeoError::Conversion { .. })
        ));
    }

    #[test]
    fn date_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
        for s in ["2020-06-01", "2020/06/01", "01/06/2020", "2020-06-01T12:00:00+02:00", "2020-06-01 00:00:00"] {
            assert_eq!(parse_date(s).unwrap(), expected, "failed to parse {s}");
        }
    }
}
