#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census tract identifiers and coordinate reference system labels.
//!
//! Every dataset that references a census tract (price records, tract
//! polygons, interventions) goes through [`TractId`] normalization at its
//! ingestion boundary, so tract comparisons never depend on whether the
//! source stored the code as an integer or a zero-padded string.

pub mod crs;
pub mod tract;

pub use crs::{Crs, CrsError, Datum, Hemisphere, UtmZone};
pub use tract::{DISTRICT_PREFIX_LEN, IdentifierError, TRACT_ID_LEN, TractId};
