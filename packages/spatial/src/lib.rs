#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index over administrative neighborhood boundaries.
//!
//! Loads a `GeoJSON` feature collection once, normalizes every feature's
//! code, builds an R-tree, and answers point-in-polygon lookups for the
//! clinic geocoder. Also emits the polygon-code to match-key mapping a
//! geometry layer needs to dissolve neighborhoods into larger areas.

use std::collections::BTreeMap;
use std::path::Path;

use clinic_map_geography_models::{
    AreaLevel, Granularity, MatchKey, ObservedSubAreas, match_key, normalize_code,
};
use geo::{Contains, MultiPolygon};
use geojson::{Feature, GeoJson};
use rstar::{AABB, RTree, RTreeObject};

/// Property names that may hold the neighborhood code, in priority order.
const CODE_PROPERTIES: &[&str] = &["adm_cd2", "ADM_CD2", "ADM_DR_CD", "adm_cd", "ADM_CD"];

/// Property names that may hold the neighborhood name, in priority order.
const NAME_PROPERTIES: &[&str] = &["adm_nm", "ADM_NM", "ADM_DR_NM", "EMD_NM", "DONG_NM"];

/// Errors that can occur while loading boundaries.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The boundary file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The file is valid `GeoJSON` but not a usable boundary collection.
    #[error("Invalid boundary data: {message}")]
    Format {
        /// Description of what went wrong.
        message: String,
    },
}

/// One administrative area from the boundary dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct AdministrativeUnit {
    /// Normalized 10-digit code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Always [`AreaLevel::Neighborhood`] for boundary features.
    pub level: AreaLevel,
    /// Boundary polygon; `None` when the feature had no usable geometry.
    pub polygon: Option<MultiPolygon<f64>>,
}

/// R-tree entry pointing back at a unit by its position in the file.
struct BoundaryEntry {
    order: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Neighborhood boundaries with an R-tree for point lookups.
///
/// Immutable once built; share it behind an `Arc` across requests.
pub struct BoundaryIndex {
    units: Vec<AdministrativeUnit>,
    tree: RTree<BoundaryEntry>,
}

impl BoundaryIndex {
    /// Reads and indexes a boundary `GeoJSON` file.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SpatialError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let index = Self::from_geojson_str(&text)?;
        log::info!(
            "Loaded {} boundary units ({} with polygons) from {}",
            index.len(),
            index.tree.size(),
            path.display()
        );
        Ok(index)
    }

    /// Parses and indexes a `GeoJSON` feature collection.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the text is not a `GeoJSON` feature
    /// collection.
    pub fn from_geojson_str(text: &str) -> Result<Self, SpatialError> {
        let GeoJson::FeatureCollection(collection) = text.parse::<GeoJson>()? else {
            return Err(SpatialError::Format {
                message: "expected a FeatureCollection".to_string(),
            });
        };

        let mut units = Vec::with_capacity(collection.features.len());
        let mut skipped = 0usize;
        for feature in collection.features {
            match unit_from_feature(feature) {
                Some(unit) => units.push(unit),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            log::warn!("Skipped {skipped} boundary features without a code");
        }

        Ok(Self::from_units(units))
    }

    /// Indexes already-built units. File order is preserved and decides
    /// which unit wins when polygons overlap.
    #[must_use]
    pub fn from_units(units: Vec<AdministrativeUnit>) -> Self {
        let entries = units
            .iter()
            .enumerate()
            .filter_map(|(order, unit)| {
                unit.polygon.as_ref().map(|polygon| BoundaryEntry {
                    order,
                    envelope: compute_envelope(polygon),
                })
            })
            .collect();

        Self {
            units,
            tree: RTree::bulk_load(entries),
        }
    }

    /// All units in file order.
    #[must_use]
    pub fn units(&self) -> &[AdministrativeUnit] {
        &self.units
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the dataset had no usable features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Finds the unit whose polygon contains the point.
    ///
    /// When polygons overlap, the unit listed first in the file wins.
    #[must_use]
    pub fn lookup(&self, lng: f64, lat: f64) -> Option<&AdministrativeUnit> {
        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| {
                self.units[entry.order]
                    .polygon
                    .as_ref()
                    .is_some_and(|polygon| polygon.contains(&point))
            })
            .map(|entry| entry.order)
            .min()
            .map(|order| &self.units[order])
    }

    /// Maps each unit code to its match key at `granularity`.
    ///
    /// With `prefix` set, only codes starting with it are included (e.g.
    /// `"41"` for one province). Codes too short for the granularity are
    /// left out.
    #[must_use]
    pub fn dissolve_keys(
        &self,
        granularity: Granularity,
        observed: &ObservedSubAreas,
        prefix: Option<&str>,
    ) -> BTreeMap<String, MatchKey> {
        self.units
            .iter()
            .filter(|unit| prefix.is_none_or(|p| unit.code.starts_with(p)))
            .filter_map(|unit| {
                match_key(&unit.code, granularity, observed).map(|key| (unit.code.clone(), key))
            })
            .collect()
    }
}

/// Reads the first present string or number among `names`.
fn property(feature: &Feature, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match feature.property(name)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Pads 8-digit codes (an older export format) to 10 digits and applies
/// the legacy-prefix normalization.
fn canonical_code(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        normalize_code(&format!("{raw}00"))
    } else {
        normalize_code(raw)
    }
}

fn unit_from_feature(feature: Feature) -> Option<AdministrativeUnit> {
    let code = canonical_code(&property(&feature, CODE_PROPERTIES)?);
    let name = property(&feature, NAME_PROPERTIES).unwrap_or_default();

    let polygon = feature.geometry.and_then(|geometry| {
        let parsed = to_multipolygon(geometry);
        if parsed.is_none() {
            log::warn!("Boundary {code} has no polygon geometry");
        }
        parsed
    });

    Some(AdministrativeUnit {
        code,
        name,
        level: AreaLevel::Neighborhood,
        polygon,
    })
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    use geo::BoundingRect;

    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
