#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry handling for tract-level price analysis.
//!
//! Converts geometries between the geographic system used by published
//! tract files and drawing widgets and the metric systems used for
//! intersection tests, parses user-drawn `GeoJSON` into query geometries,
//! and loads the two geo-referenced reference tables: census tract
//! polygons ([`Region`]) and urban interventions ([`Intervention`]).

pub mod geometry;
pub mod interventions;
pub mod projection;
pub mod regions;

use geo::Geometry;
use price_map_geography_models::{Crs, CrsError, IdentifierError};
use thiserror::Error;

pub use geometry::QueryGeometry;
pub use interventions::Intervention;
pub use regions::Region;

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Unrecognized CRS or coordinates outside a projection's domain.
    #[error("Projection error: {message}")]
    Projection {
        /// Description of what went wrong.
        message: String,
    },

    /// A geometry type that cannot take part in the analysis.
    #[error("Unsupported geometry type: {kind}")]
    UnsupportedGeometry {
        /// The rejected geometry type.
        kind: String,
    },

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` parsing or conversion failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A census tract identifier failed normalization.
    #[error("Identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl From<CrsError> for GeoError {
    fn from(value: CrsError) -> Self {
        Self::Projection {
            message: value.to_string(),
        }
    }
}

/// Anything with a geographic footprint that can be used as a spatial
/// query: tract polygons, intervention areas, drawn geometries.
pub trait Footprint {
    /// The footprint geometry, in [`Footprint::footprint_crs`] coordinates.
    fn footprint(&self) -> Geometry<f64>;

    /// The CRS of [`Footprint::footprint`].
    fn footprint_crs(&self) -> Crs;
}

impl<T: Footprint + ?Sized> Footprint for &T {
    fn footprint(&self) -> Geometry<f64> {
        (**self).footprint()
    }

    fn footprint_crs(&self) -> Crs {
        (**self).footprint_crs()
    }
}
