#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for tract price comparisons.
//!
//! Loads the datasets named by a TOML config, resolves drawn geometries or
//! intervention selections to census tracts, and prints results as JSON on
//! stdout. Logging goes to stderr and is controlled by `RUST_LOG`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use price_map_analytics::{ComparisonRequest, TreatedArea, compare};
use price_map_analytics_models::PriceType;
use price_map_geography::QueryGeometry;
use price_map_geography_models::{Crs, TractId};
use price_map_ingest::{Dataset, DatasetConfig};
use price_map_market_models::Aggregation;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "price_map", about = "Census tract asking-price analytics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the census tracts a geometry intersects
    Tracts {
        /// Dataset config (TOML)
        #[arg(long)]
        config: PathBuf,
        /// `GeoJSON` geometry, feature or feature collection
        #[arg(long)]
        geometry: PathBuf,
        /// CRS of the geometry (defaults to the config's drawn CRS)
        #[arg(long)]
        crs: Option<Crs>,
    },
    /// Compare prices of treated tracts with their district and a control area
    Compare {
        /// Dataset config (TOML)
        #[arg(long)]
        config: PathBuf,
        /// Treated area as a `GeoJSON` file
        #[arg(long, conflicts_with = "intervention", required_unless_present = "intervention")]
        geometry: Option<PathBuf>,
        /// Treated area as interventions, by title or id (repeatable)
        #[arg(long)]
        intervention: Vec<String>,
        /// Control area as a `GeoJSON` file
        #[arg(long)]
        control: Option<PathBuf>,
        /// CRS of the geometry files (defaults to the config's drawn CRS)
        #[arg(long)]
        crs: Option<Crs>,
        /// Also aggregate the rest of the treated tracts' districts
        #[arg(long)]
        district: bool,
        /// Fit trend curves
        #[arg(long)]
        trends: bool,
        /// Aggregation: mean or median
        #[arg(long, default_value = "mean")]
        op: Aggregation,
        /// Price type: both, sale or rent
        #[arg(long, default_value = "both", value_parser = parse_price_type)]
        price_type: PriceType,
        /// End date for ongoing interventions (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// List interventions with their short labels
    Interventions {
        /// Dataset config (TOML)
        #[arg(long)]
        config: PathBuf,
    },
}

fn parse_price_type(value: &str) -> Result<PriceType, String> {
    value
        .parse()
        .map_err(|_| format!("invalid price type {value:?}: expected both, sale or rent"))
}

#[derive(Serialize)]
struct InterventionListing<'a> {
    id: &'a str,
    title: &'a str,
    label: String,
    tract: &'a TractId,
    start: NaiveDate,
    end: Option<NaiveDate>,
}

fn read_geometry(path: &Path, crs: Crs) -> Result<QueryGeometry, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(QueryGeometry::from_geojson_str(&text, crs)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Tracts {
            config,
            geometry,
            crs,
        } => {
            let dataset = Dataset::load(&DatasetConfig::from_file(&config)?)?;
            let index = dataset.spatial_index()?;
            let query = read_geometry(&geometry, crs.unwrap_or_else(|| dataset.drawn_crs()))?;

            let ids = index.impacted_ids(&query)?;
            if ids.is_empty() {
                log::info!("No census tracts intersect {}", geometry.display());
            }
            print_json(&ids)?;
        }
        Commands::Compare {
            config,
            geometry,
            intervention,
            control,
            crs,
            district,
            trends,
            op,
            price_type,
            as_of,
        } => {
            let dataset = Dataset::load(&DatasetConfig::from_file(&config)?)?;
            let index = dataset.spatial_index()?;
            let crs = crs.unwrap_or_else(|| dataset.drawn_crs());

            let treated = match geometry {
                Some(path) => TreatedArea::Drawn(read_geometry(&path, crs)?),
                None => TreatedArea::Interventions(intervention),
            };

            let mut request = ComparisonRequest::new(treated)
                .with_district(district)
                .with_trends(trends)
                .with_aggregation(op)
                .with_price_type(price_type)
                .with_trend_config(dataset.trend.clone());
            if let Some(path) = control {
                request = request.with_control(read_geometry(&path, crs)?);
            }
            if let Some(as_of) = as_of {
                request = request.with_as_of(as_of);
            }

            let bundle = compare(&dataset.market_data(&index), &request)?;
            if bundle.series.is_empty() {
                log::info!("No price data for the selected tracts");
            }
            print_json(&bundle)?;
        }
        Commands::Interventions { config } => {
            let dataset = Dataset::load(&DatasetConfig::from_file(&config)?)?;
            let listings: Vec<InterventionListing<'_>> = dataset
                .interventions
                .iter()
                .map(|intervention| InterventionListing {
                    id: &intervention.id,
                    title: &intervention.title,
                    label: dataset.labels.label(&intervention.title),
                    tract: &intervention.tract,
                    start: intervention.start,
                    end: intervention.end,
                })
                .collect();
            print_json(&listings)?;
        }
    }

    Ok(())
}
