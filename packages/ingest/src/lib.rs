#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loads the reference datasets for price analytics.
//!
//! Reads the TOML dataset config, the price table with its operation and
//! typology lookups, the census tract polygons and the intervention
//! registry, and hands them out as an immutable [`Dataset`].

pub mod config;
pub mod prices;

use std::fs::File;
use std::io::BufReader;

use price_map_analytics::{InterventionLabels, MarketData};
use price_map_analytics_models::TrendConfig;
use price_map_geography::interventions::interventions_from_geojson;
use price_map_geography::regions::regions_from_geojson;
use price_map_geography::{GeoError, Intervention, Region};
use price_map_geography_models::{Crs, IdentifierError};
use price_map_market_models::{PeriodError, PriceRecord};
use price_map_spatial::{SpatialError, SpatialIndex};
use thiserror::Error;

pub use config::{CrsConfig, DatasetConfig};

/// Errors that can occur while loading datasets.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A CSV file is malformed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The config file is malformed.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A config value is invalid.
    #[error("Invalid config: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// A `GeoJSON` file is malformed.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// The tract polygons could not be indexed.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// A tract code is malformed.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// A period label is malformed.
    #[error(transparent)]
    Period(#[from] PeriodError),

    /// A price row references a code missing from a lookup table.
    #[error("Unknown id {id:?} in {table} lookup")]
    UnknownLookupId {
        /// Lookup table name.
        table: String,
        /// The missing code.
        id: String,
    },

    /// An operation short name is neither sale nor rent.
    #[error("Unknown operation type {value:?}")]
    UnknownOperation {
        /// The short name.
        value: String,
    },
}

/// Immutable reference data for a session.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Census tract polygons in their source CRS.
    pub regions: Vec<Region>,
    /// Urban interventions in their source CRS.
    pub interventions: Vec<Intervention>,
    /// Joined price observations.
    pub records: Vec<PriceRecord>,
    /// Intervention label table, built-ins plus config overrides.
    pub labels: InterventionLabels,
    /// CRS settings.
    pub crs: CrsConfig,
    /// Trend model parameters.
    pub trend: TrendConfig,
}

impl Dataset {
    /// Loads every dataset named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if any file cannot be read or parsed, or a
    /// row references unknown codes.
    pub fn load(config: &DatasetConfig) -> Result<Self, IngestError> {
        let delimiter = config.delimiter()?;

        let operations = prices::read_lookup(
            "operations",
            BufReader::new(File::open(&config.operations)?),
            delimiter,
        )?;
        let typologies = prices::read_lookup(
            "typologies",
            BufReader::new(File::open(&config.typologies)?),
            delimiter,
        )?;
        let rows = prices::read_price_rows(BufReader::new(File::open(&config.prices)?), delimiter)?;
        let records = prices::join_price_rows(&rows, &operations, &typologies)?;
        log::info!(
            "Loaded {} price records from {}",
            records.len(),
            config.prices.display()
        );

        let regions = regions_from_geojson(&std::fs::read_to_string(&config.tracts)?, config.crs.tracts)?;
        log::info!(
            "Loaded {} census tracts from {}",
            regions.len(),
            config.tracts.display()
        );

        let interventions = match &config.interventions {
            Some(path) => {
                let interventions = interventions_from_geojson(
                    &std::fs::read_to_string(path)?,
                    config.crs.interventions,
                )?;
                log::info!(
                    "Loaded {} interventions from {}",
                    interventions.len(),
                    path.display()
                );
                interventions
            }
            None => Vec::new(),
        };

        let labels = InterventionLabels::default().with_overrides(config.labels.clone());

        Ok(Self {
            regions,
            interventions,
            records,
            labels,
            crs: config.crs,
            trend: config.trend.clone(),
        })
    }

    /// Builds the tract spatial index in the configured working CRS.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Spatial`] if a tract cannot be reprojected.
    pub fn spatial_index(&self) -> Result<SpatialIndex, IngestError> {
        Ok(SpatialIndex::build(self.regions.clone(), self.crs.working)?)
    }

    /// Borrows the dataset as comparison input.
    #[must_use]
    pub fn market_data<'a>(&'a self, index: &'a SpatialIndex) -> MarketData<'a> {
        MarketData {
            index,
            records: &self.records,
            interventions: &self.interventions,
            labels: &self.labels,
        }
    }

    /// CRS drawn query geometries are expressed in.
    #[must_use]
    pub const fn drawn_crs(&self) -> Crs {
        self.crs.drawn
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    use price_map_analytics::{ComparisonRequest, TreatedArea, compare};
    use price_map_analytics_models::{GroupStatus, PriceType, SeriesGroup};
    use price_map_geography::QueryGeometry;
    use price_map_geography_models::TractId;

    use super::*;

    const PRICES: &str = "\
CENSUSTRACT;PERIOD;ADOPERATIONID;ADTYPOLOGYID;UNITPRICE_ASKING
101001001;2020Q1;1;1;100
101001001;2020Q2;1;1;120
101001001;2020Q3;1;1;140
101001001;2020Q1;2;1;10
101001002;2020Q1;1;1;500
";

    const OPERATIONS: &str = "ID;SHORTNAME;DESCRIPTION\n1;sale;Sale\n2;rent;Rent\n";
    const TYPOLOGIES: &str = "ID;SHORTNAME\n1;flat\n";

    /// Two 100 m squares, 100 m apart, in EPSG:25831.
    const TRACTS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": { "CENSUSTRACT": 101001001 },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[430000, 4580000], [430100, 4580000], [430100, 4580100], [430000, 4580100], [430000, 4580000]]]
      }
    },
    {
      "type": "Feature",
      "properties": { "CENSUSTRACT": "0101001002" },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[430200, 4580000], [430300, 4580000], [430300, 4580100], [430200, 4580100], [430200, 4580000]]]
      }
    }
  ]
}"#;

    const INTERVENTIONS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": {
        "ID": "w-1",
        "CENSUSTRACT": "0101001001",
        "TITOL_WO": "Eix verd Sant Antoni",
        "DATA_INICI": "2020-02-01",
        "DATA_FI_REAL": "2020-05-01"
      },
      "geometry": { "type": "Point", "coordinates": [430050, 4580050] }
    }
  ]
}"#;

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("price_map_ingest_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for (file, contents) in [
            ("prices.csv", PRICES),
            ("operations.csv", OPERATIONS),
            ("typologies.csv", TYPOLOGIES),
            ("tracts.geojson", TRACTS),
            ("interventions.geojson", INTERVENTIONS),
        ] {
            std::fs::write(dir.join(file), contents).unwrap();
        }
        std::fs::write(
            dir.join("dataset.toml"),
            r#"
prices = "prices.csv"
operations = "operations.csv"
typologies = "typologies.csv"
tracts = "tracts.geojson"
interventions = "interventions.geojson"

[crs]
tracts = "EPSG:25831"
interventions = "EPSG:25831"
drawn = "EPSG:25831"

[labels]
"Eix verd Sant Antoni" = "St. Antoni"
"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn loads_dataset_from_config_file() {
        let dir = fixture_dir("load");
        let config = DatasetConfig::from_file(dir.join("dataset.toml")).unwrap();
        let dataset = Dataset::load(&config).unwrap();

        assert_eq!(dataset.records.len(), 5);
        assert_eq!(dataset.regions.len(), 2);
        assert_eq!(dataset.interventions.len(), 1);
        assert_eq!(dataset.labels.label("Eix verd Sant Antoni"), "St. Antoni");
        assert_eq!(dataset.drawn_crs(), Crs::ETRS89_UTM31N);

        let index = dataset.spatial_index().unwrap();
        assert_eq!(index.len(), 2);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn end_to_end_comparison() {
        let dir = fixture_dir("compare");
        let dataset = Dataset::load(&DatasetConfig::from_file(dir.join("dataset.toml")).unwrap()).unwrap();
        let index = dataset.spatial_index().unwrap();
        let data = dataset.market_data(&index);

        let drawn = QueryGeometry::from_geojson_str(
            r#"{"type": "Polygon", "coordinates": [[[430000, 4580000], [430100, 4580000], [430100, 4580100], [430000, 4580100], [430000, 4580000]]]}"#,
            dataset.drawn_crs(),
        )
        .unwrap();

        let request = ComparisonRequest::new(TreatedArea::Drawn(drawn))
            .with_price_type(PriceType::Sale)
            .with_district(true);
        let bundle = compare(&data, &request).unwrap();

        let treated = bundle.group(SeriesGroup::Treated).unwrap();
        assert_eq!(
            treated.tracts,
            BTreeSet::from([TractId::parse("0101001001").unwrap()])
        );

        let sale = &bundle.series[0];
        let values: Vec<Option<f64>> = sale.values.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![Some(100.0), Some(120.0), Some(140.0)]);

        let district = bundle.group(SeriesGroup::District).unwrap();
        assert_eq!(district.status, GroupStatus::Matched { periods: 1 });

        assert_eq!(bundle.windows.len(), 1);
        assert!(bundle.windows[0].labels.contains("St. Antoni"));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let config = DatasetConfig::from_toml_str(
            r#"
prices = "/nonexistent/prices.csv"
operations = "/nonexistent/operations.csv"
typologies = "/nonexistent/typologies.csv"
tracts = "/nonexistent/tracts.geojson"
"#,
        )
        .unwrap();
        assert!(matches!(Dataset::load(&config), Err(IngestError::Io(_))));
    }
}
