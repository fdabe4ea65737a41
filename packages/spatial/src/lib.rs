#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for tract impact resolution.
//!
//! Reprojects census tract polygons into a shared metric CRS once, builds
//! an R-tree over their envelopes, and answers "which tracts does this
//! geometry touch" queries for drawn areas and intervention footprints.

use std::collections::{BTreeMap, BTreeSet};

use geo::{BoundingRect as _, Geometry, GeometryCollection, Intersects as _, MultiPolygon, Rect};
use price_map_geography::geometry::is_degenerate;
use price_map_geography::projection::{reproject, reproject_multi_polygon};
use price_map_geography::{Footprint, GeoError, QueryGeometry, Region};
use price_map_geography_models::{Crs, TractId};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

/// Tolerance (in working CRS units) for matching degenerate extents.
const DEGENERATE_EXTENT_TOLERANCE: f64 = 1e-6;

/// Errors that can occur while resolving impacted tracts.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The query had no geometry to intersect with.
    #[error("Query geometry is empty")]
    EmptyQuery,

    /// Reprojecting the query or the tracts failed.
    #[error(transparent)]
    Geo(#[from] GeoError),
}

/// A tract polygon stored in the R-tree, in working CRS coordinates.
struct BoundaryEntry {
    /// Position of the source record in [`SpatialIndex::regions`].
    position: usize,
    envelope: AABB<[f64; 2]>,
    extent: Rect<f64>,
    polygon: MultiPolygon<f64>,
    degenerate: bool,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over census tract polygons.
///
/// Constructed once per session and shared read-only by every analysis.
pub struct SpatialIndex {
    regions: Vec<Region>,
    tree: RTree<BoundaryEntry>,
    by_id: BTreeMap<TractId, usize>,
    working_crs: Crs,
}

impl SpatialIndex {
    /// Reprojects `regions` into `working_crs` and builds the R-tree.
    ///
    /// The original region records (in their own CRS) are kept for
    /// display.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Geo`] if a region cannot be reprojected.
    pub fn build(regions: Vec<Region>, working_crs: Crs) -> Result<Self, SpatialError> {
        let mut entries = Vec::with_capacity(regions.len());
        let mut by_id = BTreeMap::new();

        for (position, region) in regions.iter().enumerate() {
            let polygon = reproject_multi_polygon(&region.geometry, region.crs, working_crs)?;
            let Some(extent) = polygon.bounding_rect() else {
                log::warn!("Census tract {} has no coordinates, not indexing it", region.id);
                continue;
            };
            let degenerate = is_degenerate(&Geometry::MultiPolygon(polygon.clone()));

            entries.push(BoundaryEntry {
                position,
                envelope: envelope_of(extent),
                extent,
                polygon,
                degenerate,
            });
            by_id.entry(region.id.clone()).or_insert(position);
        }

        let tree = RTree::bulk_load(entries);
        log::info!(
            "Loaded {} census tracts into spatial index ({working_crs})",
            tree.size()
        );

        Ok(Self {
            regions,
            tree,
            by_id,
            working_crs,
        })
    }

    /// The metric CRS intersection tests run in.
    #[must_use]
    pub const fn working_crs(&self) -> Crs {
        self.working_crs
    }

    /// Number of indexed tract polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns `true` if no tracts are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// All indexed tract records, in load order.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Looks up a tract record by id.
    #[must_use]
    pub fn region(&self, id: &TractId) -> Option<&Region> {
        self.by_id.get(id).map(|&position| &self.regions[position])
    }

    /// Returns the ids of every tract whose polygon intersects the query.
    ///
    /// Boundary contact counts as an intersection. A query that matches
    /// nothing yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::EmptyQuery`] if the query has no
    /// coordinates, or [`SpatialError::Geo`] if it cannot be reprojected.
    pub fn impacted_ids(&self, query: &QueryGeometry) -> Result<BTreeSet<TractId>, SpatialError> {
        if query.is_empty() {
            return Err(SpatialError::EmptyQuery);
        }
        let projected = query.reproject(self.working_crs)?;

        Ok(self
            .matching_positions(&projected.geometries)
            .into_iter()
            .map(|position| self.regions[position].id.clone())
            .collect())
    }

    /// Returns the full tract records intersecting the union of the
    /// query footprints (interventions, other tracts, drawn areas),
    /// ordered by tract id.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::EmptyQuery`] if no footprint has any
    /// coordinates, or [`SpatialError::Geo`] if a footprint cannot be
    /// reprojected.
    pub fn impacted_regions<F: Footprint>(&self, query: &[F]) -> Result<Vec<&Region>, SpatialError> {
        let mut members = Vec::with_capacity(query.len());
        for footprint in query {
            match reproject(
                &footprint.footprint(),
                footprint.footprint_crs(),
                self.working_crs,
            )? {
                Geometry::GeometryCollection(collection) => members.extend(collection),
                geometry => members.push(geometry),
            }
        }

        let members = GeometryCollection(members);
        if members.bounding_rect().is_none() {
            return Err(SpatialError::EmptyQuery);
        }

        let mut regions: Vec<&Region> = self
            .matching_positions(&members)
            .into_iter()
            .map(|position| &self.regions[position])
            .collect();
        regions.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(regions)
    }

    /// Tracts sharing a municipality + district prefix with any of
    /// `tracts`, excluding `tracts` themselves.
    #[must_use]
    pub fn district_ids(&self, tracts: &BTreeSet<TractId>) -> BTreeSet<TractId> {
        let prefixes: BTreeSet<&str> = tracts.iter().map(TractId::district_prefix).collect();

        self.by_id
            .keys()
            .filter(|id| prefixes.contains(id.district_prefix()) && !tracts.contains(*id))
            .cloned()
            .collect()
    }

    /// Positions of the entries intersecting any member, deduplicated and
    /// in ascending order. `members` must be in the working CRS.
    fn matching_positions(&self, members: &GeometryCollection<f64>) -> BTreeSet<usize> {
        let query_extent = members.bounding_rect();
        let query_degenerate = members.iter().all(is_degenerate);
        let mut matched = BTreeSet::new();

        for member in members {
            let Some(rect) = member.bounding_rect() else {
                continue;
            };

            for entry in self.tree.locate_in_envelope_intersecting(&envelope_of(rect)) {
                if matched.contains(&entry.position) {
                    continue;
                }
                let hit = if entry.degenerate {
                    // Collapsed tracts only match a query sitting exactly on them.
                    query_degenerate && query_extent.is_some_and(|q| extents_match(entry.extent, q))
                } else {
                    member.intersects(&entry.polygon)
                };
                if hit {
                    matched.insert(entry.position);
                }
            }
        }

        matched
    }
}

fn extents_match(a: Rect<f64>, b: Rect<f64>) -> bool {
    let close = |x: f64, y: f64| (x - y).abs() <= DEGENERATE_EXTENT_TOLERANCE;
    close(a.min().x, b.min().x)
        && close(a.min().y, b.min().y)
        && close(a.max().x, b.max().x)
        && close(a.max().y, b.max().y)
}

/// Compute the bounding box envelope for an extent.
fn envelope_of(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}
