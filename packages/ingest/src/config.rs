//! TOML dataset configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use price_map_analytics_models::TrendConfig;
use price_map_geography_models::Crs;
use serde::Deserialize;

use crate::IngestError;

/// Default CSV field delimiter of the market metrics exports.
pub const DEFAULT_DELIMITER: &str = ";";

/// Where the datasets live and how to read them.
///
/// Relative paths are resolved against the directory of the config file
/// when loaded through [`DatasetConfig::from_file`].
///
/// ```toml
/// prices = "data/market-metrics.csv"
/// operations = "data/adoperations.csv"
/// typologies = "data/adtypologies.csv"
/// tracts = "data/censustracts.geojson"
/// interventions = "data/interventions.geojson"
///
/// [crs]
/// working = "EPSG:25831"
///
/// [labels]
/// "Eix verd Sant Antoni" = "Sant Antoni"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetConfig {
    /// Price table CSV.
    pub prices: PathBuf,
    /// Operation lookup CSV (`ID;SHORTNAME`).
    pub operations: PathBuf,
    /// Typology lookup CSV (`ID;SHORTNAME`).
    pub typologies: PathBuf,
    /// Census tract polygons (`GeoJSON` feature collection).
    pub tracts: PathBuf,
    /// Urban interventions (`GeoJSON` feature collection).
    #[serde(default)]
    pub interventions: Option<PathBuf>,
    /// CSV field delimiter (default: semicolon).
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Coordinate reference systems of the inputs.
    #[serde(default)]
    pub crs: CrsConfig,
    /// Intervention title to short label overrides.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Trend model parameters.
    #[serde(default)]
    pub trend: TrendConfig,
}

/// Coordinate reference systems of the datasets and of drawn queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CrsConfig {
    /// CRS of the tract polygons.
    pub tracts: Crs,
    /// CRS of the intervention footprints.
    pub interventions: Crs,
    /// Metric CRS intersection tests run in.
    pub working: Crs,
    /// CRS of geometries drawn by the user.
    pub drawn: Crs,
}

impl Default for CrsConfig {
    fn default() -> Self {
        Self {
            tracts: Crs::Wgs84,
            interventions: Crs::Wgs84,
            working: Crs::ETRS89_UTM31N,
            drawn: Crs::Wgs84,
        }
    }
}

impl DatasetConfig {
    /// Parses a config from TOML text. Paths are kept as written.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Toml`] if the text is not a valid config.
    pub fn from_toml_str(text: &str) -> Result<Self, IngestError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a config file and resolves its relative paths against the
    /// file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Io`] if the file cannot be read, or
    /// [`IngestError::Toml`] if it is not a valid config.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.resolve_paths(base))
    }

    /// Joins every relative path onto `base`.
    #[must_use]
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.prices);
        resolve(&mut self.operations);
        resolve(&mut self.typologies);
        resolve(&mut self.tracts);
        if let Some(interventions) = self.interventions.as_mut() {
            resolve(interventions);
        }
        self
    }

    /// The CSV delimiter as a single byte.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if the delimiter is not exactly one
    /// ASCII character.
    pub fn delimiter(&self) -> Result<u8, IngestError> {
        let delimiter = self.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER);
        match delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(IngestError::Config {
                message: format!("delimiter must be a single ASCII character, got {delimiter:?}"),
            }),
        }
    }
}
