//! Water/land polygon classification
//!
//! Partitions polygon features into water, land, navigation and danger
//! categories by object-code membership, merges touching water bodies into
//! connected regions, and derives land as the geometric complement of water
//! within a bounding box. The stitcher and line processor consult the water
//! output only as a read-only "is this point wet" oracle.

use crate::feature::{FeatureGeometry, SourceFeature};
use crate::geometry;
use crate::{EngineError, Result};
use geo::{BooleanOps, Coord, Intersects, MultiPolygon, Polygon, Rect};
use once_cell::sync::Lazy;
use std::collections::HashSet;

static WATER_CODES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from(["DEPARE", "DRGARE", "FAIRWY", "CANALS", "LAKARE", "RIVERS", "LOKBSN"])
});

static LAND_CODES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["LNDARE", "LNDRGN", "BUAARE", "SLCONS", "CAUSWY"]));

static NAVIGATION_CODES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from(["FAIRWY", "NAVLNE", "RECTRC", "TSSBND", "TSSLPT", "DWRTPT", "ACHARE", "ACHBRT"])
});

static DANGER_CODES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["OBSTRN", "WRECKS", "UWTROC", "ROCKS", "MIPARE"]));

/// Category of a classified feature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Classification {
    Water,
    Land,
    Navigation,
    Danger,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Water => "water",
            Classification::Land => "land",
            Classification::Navigation => "navigation",
            Classification::Danger => "danger",
        }
    }
}

/// Descriptive subtype for a classified object code
fn subtype_for(type_code: &str) -> String {
    match type_code {
        "DEPARE" => "depth area",
        "DRGARE" => "dredged area",
        "FAIRWY" => "fairway",
        "CANALS" => "canal",
        "LAKARE" => "lake",
        "RIVERS" => "river",
        "LOKBSN" => "lock basin",
        "LNDARE" => "land area",
        "LNDRGN" => "land region",
        "BUAARE" => "built-up area",
        "SLCONS" => "shoreline construction",
        "CAUSWY" => "causeway",
        "NAVLNE" => "navigation line",
        "RECTRC" => "recommended track",
        "TSSBND" => "traffic separation boundary",
        "TSSLPT" => "traffic separation lane",
        "DWRTPT" => "deep water route",
        "ACHARE" => "anchorage",
        "ACHBRT" => "anchor berth",
        "OBSTRN" => "obstruction",
        "WRECKS" => "wreck",
        "UWTROC" => "underwater rock",
        "ROCKS" => "rock",
        "MIPARE" => "military practice area",
        other => return other.to_lowercase(),
    }
    .to_string()
}

/// A polygon feature with its water/land classification
///
/// Merged water polygons inherit the attributes of their largest-area
/// constituent.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassifiedPolygon {
    pub geometry: MultiPolygon<f64>,
    pub classification: Classification,
    pub subtype: String,
    pub area_km2: f64,
    /// Minimum/maximum depth in meters, when the source carried them
    pub depth_range: Option<(f64, f64)>,
    pub navigable: bool,
    /// Object code of the source feature (or the largest merge constituent)
    pub source: String,
    pub merged: bool,
    /// Number of polygons merged into this one
    pub original_count: usize,
}

/// A non-polygon navigation or danger feature carried through with
/// classification metadata
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassifiedFeature {
    pub id: String,
    pub geometry: FeatureGeometry,
    pub classification: Classification,
    pub subtype: String,
    pub source: String,
}

/// Water/land classification configuration
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WaterLandOptions {
    /// Merge touching water polygons into connected regions
    pub merge_touching_water: bool,
    /// Water shallower than this draft is not navigable
    pub navigable_draft_meters: f64,
    /// Polygons closer than this are considered touching when merging
    pub touch_distance_meters: f64,
}

impl Default for WaterLandOptions {
    fn default() -> Self {
        Self {
            merge_touching_water: true,
            navigable_draft_meters: 0.0,
            touch_distance_meters: 1.0,
        }
    }
}

impl WaterLandOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.touch_distance_meters.is_finite() || self.touch_distance_meters < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "touch distance must be non-negative, got {}",
                self.touch_distance_meters
            )));
        }
        if !self.navigable_draft_meters.is_finite() {
            return Err(EngineError::InvalidConfig(
                "navigable draft must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Output of water/land classification
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WaterLandPartition {
    pub water: Vec<ClassifiedPolygon>,
    pub land: Vec<ClassifiedPolygon>,
    pub navigation: Vec<ClassifiedPolygon>,
    pub dangers: Vec<ClassifiedPolygon>,
    /// Non-polygon navigation/danger features (buoys, wreck points, tracks)
    pub passthrough: Vec<ClassifiedFeature>,
}

/// Classification for an object code; navigation and danger take precedence
/// over plain water so a fairway is navigation rather than just water
fn classification_for(type_code: &str) -> Option<Classification> {
    if DANGER_CODES.contains(type_code) {
        Some(Classification::Danger)
    } else if NAVIGATION_CODES.contains(type_code) {
        Some(Classification::Navigation)
    } else if WATER_CODES.contains(type_code) {
        Some(Classification::Water)
    } else if LAND_CODES.contains(type_code) {
        Some(Classification::Land)
    } else {
        None
    }
}

fn to_multi_polygon(geometry: &FeatureGeometry) -> Option<MultiPolygon<f64>> {
    match geometry {
        FeatureGeometry::Polygon(p) => Some(MultiPolygon(vec![p.clone()])),
        FeatureGeometry::MultiPolygon(mp) => Some(mp.clone()),
        _ => None,
    }
}

fn multi_polygon_area_km2(mp: &MultiPolygon<f64>) -> f64 {
    mp.0.iter().map(geometry::spherical_polygon_area_km2).sum()
}

/// Partition features into water/land/navigation/danger categories
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn classify_water_land(
    features: &[SourceFeature],
    options: &WaterLandOptions,
) -> WaterLandPartition {
    let mut partition = WaterLandPartition::default();

    for feature in features {
        let Some(classification) = classification_for(&feature.type_code) else {
            continue;
        };

        let Some(geometry) = to_multi_polygon(&feature.geometry) else {
            match classification {
                Classification::Navigation | Classification::Danger => {
                    partition.passthrough.push(ClassifiedFeature {
                        id: feature.id.clone(),
                        geometry: feature.geometry.clone(),
                        classification,
                        subtype: subtype_for(&feature.type_code),
                        source: feature.type_code.clone(),
                    });
                }
                _ => {
                    tracing::debug!(
                        feature_id = %feature.id,
                        "Skipping non-polygon {} feature",
                        feature.type_code
                    );
                }
            }
            continue;
        };

        let depth_range = feature.attributes.depth_range();
        let navigable = match classification {
            Classification::Navigation => true,
            Classification::Water => depth_range
                .is_none_or(|(min, _)| min >= options.navigable_draft_meters),
            _ => false,
        };

        let classified = ClassifiedPolygon {
            area_km2: multi_polygon_area_km2(&geometry),
            geometry,
            classification,
            subtype: subtype_for(&feature.type_code),
            depth_range,
            navigable,
            source: feature.type_code.clone(),
            merged: false,
            original_count: 1,
        };

        match classification {
            Classification::Water => partition.water.push(classified),
            Classification::Land => partition.land.push(classified),
            Classification::Navigation => partition.navigation.push(classified),
            Classification::Danger => partition.dangers.push(classified),
        }
    }

    if options.merge_touching_water {
        partition.water =
            merge_water_polygons(std::mem::take(&mut partition.water), options.touch_distance_meters);
    }

    partition
}

/// Disjoint-set over polygon indices for connectivity grouping
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Minimum distance between the exterior boundaries of two multi-polygons
fn min_boundary_distance(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    let mut min = f64::INFINITY;
    for (from, to) in [(a, b), (b, a)] {
        for poly_from in &from.0 {
            for &vertex in &poly_from.exterior().0 {
                for poly_to in &to.0 {
                    for pair in poly_to.exterior().0.windows(2) {
                        let d = geometry::point_to_segment_meters(vertex, pair[0], pair[1]);
                        if d < min {
                            min = d;
                        }
                    }
                }
            }
        }
    }
    min
}

/// Two polygons are connected when they intersect or come within
/// `touch_distance_meters` of one another
fn polygons_touch(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>, touch_distance_meters: f64) -> bool {
    a.intersects(b) || min_boundary_distance(a, b) <= touch_distance_meters
}

/// Union two geometries; on a degenerate empty result, fall back to the
/// larger input unchanged
fn union_or_largest(a: MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let result = a.union(b);
    if result.0.is_empty() && !(a.0.is_empty() && b.0.is_empty()) {
        tracing::warn!("Polygon union produced empty output; keeping largest input");
        if multi_polygon_area_km2(&a) >= multi_polygon_area_km2(b) {
            return a;
        }
        return b.clone();
    }
    result
}

/// Merge touching water polygons into connected regions
///
/// Connectivity is a union-find over polygon indices with pairwise touch as
/// the union predicate. Each group larger than one is reduced by iterative
/// pairwise union and inherits the attributes of its largest-area
/// constituent.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn merge_water_polygons(
    polygons: Vec<ClassifiedPolygon>,
    touch_distance_meters: f64,
) -> Vec<ClassifiedPolygon> {
    if polygons.len() < 2 {
        return polygons;
    }

    let mut set = DisjointSet::new(polygons.len());
    for i in 0..polygons.len() {
        for j in (i + 1)..polygons.len() {
            if polygons_touch(&polygons[i].geometry, &polygons[j].geometry, touch_distance_meters)
            {
                set.union(i, j);
            }
        }
    }

    let mut groups: Vec<Vec<ClassifiedPolygon>> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    for (i, polygon) in polygons.into_iter().enumerate() {
        let root = set.find(i);
        match roots.iter().position(|&r| r == root) {
            Some(g) => groups[g].push(polygon),
            None => {
                roots.push(root);
                groups.push(vec![polygon]);
            }
        }
    }

    let mut merged = Vec::with_capacity(groups.len());
    for mut group in groups {
        if group.len() == 1 {
            merged.extend(group);
            continue;
        }

        let group_size = group.len();
        let donor_index = group
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.area_km2.total_cmp(&b.area_km2))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let donor = group.swap_remove(donor_index);

        let mut geometry = donor.geometry.clone();
        for other in &group {
            geometry = union_or_largest(geometry, &other.geometry);
        }

        tracing::debug!(merged = group_size, source = %donor.source, "Merged touching water polygons");
        merged.push(ClassifiedPolygon {
            area_km2: multi_polygon_area_km2(&geometry),
            geometry,
            merged: true,
            original_count: group_size,
            ..donor
        });
    }

    merged
}

/// Derive land polygons as the complement of water within a bounding box
///
/// With no water input the whole rectangle is land. On a degenerate boolean
/// failure the largest input is returned unmodified instead of raising.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn derive_land_polygons(
    bounds: Rect<f64>,
    water: &[ClassifiedPolygon],
) -> Result<Vec<ClassifiedPolygon>> {
    if !bounds.width().is_finite()
        || !bounds.height().is_finite()
        || bounds.width() <= 0.0
        || bounds.height() <= 0.0
    {
        return Err(EngineError::InvalidConfig(format!(
            "degenerate bounding box {:?}",
            bounds
        )));
    }

    let rectangle = MultiPolygon(vec![bounds.to_polygon()]);
    let rectangle_area = multi_polygon_area_km2(&rectangle);

    if water.is_empty() {
        return Ok(vec![land_polygon(bounds.to_polygon())]);
    }

    let mut water_union = water[0].geometry.clone();
    for classified in &water[1..] {
        water_union = union_or_largest(water_union, &classified.geometry);
    }

    let land = rectangle.difference(&water_union);
    if land.0.is_empty() {
        let water_area = multi_polygon_area_km2(&water_union);
        if water_area < rectangle_area * 0.999 {
            // Water does not cover the box, so an empty difference means the
            // boolean op degenerated; fall back to the largest input
            tracing::warn!(
                water_area_km2 = water_area,
                box_area_km2 = rectangle_area,
                "Complement difference degenerated; returning bounding box as land"
            );
            return Ok(vec![land_polygon(bounds.to_polygon())]);
        }
        return Ok(Vec::new());
    }

    Ok(land.0.into_iter().map(land_polygon).collect())
}

fn land_polygon(polygon: Polygon<f64>) -> ClassifiedPolygon {
    let area_km2 = geometry::spherical_polygon_area_km2(&polygon);
    ClassifiedPolygon {
        geometry: MultiPolygon(vec![polygon]),
        classification: Classification::Land,
        subtype: "derived land".to_string(),
        area_km2,
        depth_range: None,
        navigable: false,
        source: "derived".to_string(),
        merged: false,
        original_count: 1,
    }
}

/// Read-only wetness oracle over classified water polygons
///
/// Uses the outer-ring point-in-polygon test; holes are not honored.
pub fn is_point_wet(point: Coord<f64>, water: &[ClassifiedPolygon]) -> bool {
    water
        .iter()
        .flat_map(|w| w.geometry.0.iter())
        .any(|polygon| geometry::point_in_polygon(point, polygon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{ATTR_DEPTH_MAX, ATTR_DEPTH_MIN, SourceFeature};
    use geo::{Point, polygon};

    fn square(min_x: f64, min_y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: min_x, y: min_y),
            (x: min_x + size, y: min_y),
            (x: min_x + size, y: min_y + size),
            (x: min_x, y: min_y + size),
            (x: min_x, y: min_y),
        ]
    }

    fn create_water_feature(id: &str, min_x: f64, size: f64) -> SourceFeature {
        SourceFeature::new(id, "DEPARE", FeatureGeometry::Polygon(square(min_x, 0.0, size)))
            .with_attribute(ATTR_DEPTH_MIN, 5.0)
            .with_attribute(ATTR_DEPTH_MAX, 20.0)
    }

    fn classified(polygon: Polygon<f64>, source: &str) -> ClassifiedPolygon {
        let area_km2 = geometry::spherical_polygon_area_km2(&polygon);
        ClassifiedPolygon {
            geometry: MultiPolygon(vec![polygon]),
            classification: Classification::Water,
            subtype: subtype_for(source),
            area_km2,
            depth_range: None,
            navigable: true,
            source: source.to_string(),
            merged: false,
            original_count: 1,
        }
    }

    #[test]
    fn test_partition_by_type_code() {
        let features = vec![
            create_water_feature("W", 0.0, 0.1),
            SourceFeature::new("L", "LNDARE", FeatureGeometry::Polygon(square(1.0, 0.0, 0.1))),
            SourceFeature::new("F", "FAIRWY", FeatureGeometry::Polygon(square(2.0, 0.0, 0.1))),
            SourceFeature::new("O", "OBSTRN", FeatureGeometry::Polygon(square(3.0, 0.0, 0.1))),
            SourceFeature::new("X", "LIGHTS", FeatureGeometry::Point(Point::new(0.0, 0.0))),
        ];
        let partition = classify_water_land(&features, &WaterLandOptions::default());

        assert_eq!(partition.water.len(), 1);
        assert_eq!(partition.land.len(), 1);
        assert_eq!(partition.navigation.len(), 1);
        assert_eq!(partition.dangers.len(), 1);
        assert!(partition.passthrough.is_empty());

        // A fairway is navigation, not plain water
        assert_eq!(partition.navigation[0].source, "FAIRWY");
        assert_eq!(partition.water[0].depth_range, Some((5.0, 20.0)));
        assert!(partition.water[0].navigable);
    }

    #[test]
    fn test_non_polygon_danger_passes_through() {
        let features = vec![SourceFeature::new(
            "WRECK",
            "WRECKS",
            FeatureGeometry::Point(Point::new(-117.0, 32.0)),
        )];
        let partition = classify_water_land(&features, &WaterLandOptions::default());
        assert!(partition.dangers.is_empty());
        assert_eq!(partition.passthrough.len(), 1);
        assert_eq!(partition.passthrough[0].classification, Classification::Danger);
        assert_eq!(partition.passthrough[0].subtype, "wreck");
    }

    #[test]
    fn test_shallow_water_not_navigable_for_draft() {
        let features = vec![
            create_water_feature("DEEP", 0.0, 0.1),
            SourceFeature::new("SHOAL", "DEPARE", FeatureGeometry::Polygon(square(5.0, 0.0, 0.1)))
                .with_attribute(ATTR_DEPTH_MIN, 0.5)
                .with_attribute(ATTR_DEPTH_MAX, 1.5),
        ];
        let options = WaterLandOptions {
            navigable_draft_meters: 2.0,
            merge_touching_water: false,
            ..Default::default()
        };
        let partition = classify_water_land(&features, &options);
        let deep = partition.water.iter().find(|w| w.depth_range == Some((5.0, 20.0))).unwrap();
        let shoal = partition.water.iter().find(|w| w.depth_range == Some((0.5, 1.5))).unwrap();
        assert!(deep.navigable);
        assert!(!shoal.navigable);
    }

    #[test]
    fn test_overlapping_water_merges() {
        let polygons = vec![
            classified(square(0.0, 0.0, 1.0), "DEPARE"),
            classified(square(0.5, 0.0, 1.0), "DRGARE"),
        ];
        let merged = merge_water_polygons(polygons, 1.0);

        assert_eq!(merged.len(), 1);
        assert!(merged[0].merged);
        assert_eq!(merged[0].original_count, 2);
        // Both squares are the same size; the donor is whichever sorts
        // largest, and the union covers 1.5 x 1.0 degrees
        let expected = geometry::spherical_polygon_area_km2(&square(0.0, 0.0, 1.0)) * 1.5;
        assert!((merged[0].area_km2 - expected).abs() / expected < 0.01);
    }

    #[test]
    fn test_disjoint_water_stays_separate() {
        let polygons = vec![
            classified(square(0.0, 0.0, 1.0), "DEPARE"),
            classified(square(5.0, 0.0, 1.0), "DEPARE"),
        ];
        let merged = merge_water_polygons(polygons, 1.0);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|m| !m.merged));
    }

    #[test]
    fn test_near_touching_water_merges_within_distance() {
        // Gap of ~0.55 m (5e-6 degrees of longitude at the equator)
        let polygons = vec![
            classified(square(0.0, 0.0, 1.0), "DEPARE"),
            classified(square(1.000_005, 0.0, 1.0), "DEPARE"),
        ];
        let merged = merge_water_polygons(polygons, 1.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].original_count, 2);
    }

    #[test]
    fn test_merged_attributes_from_largest_constituent() {
        let mut small = classified(square(0.0, 0.0, 0.2), "DRGARE");
        small.depth_range = Some((8.0, 12.0));
        let mut large = classified(square(0.1, 0.0, 2.0), "DEPARE");
        large.depth_range = Some((0.0, 30.0));

        let merged = merge_water_polygons(vec![small, large], 1.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, "DEPARE");
        assert_eq!(merged[0].subtype, "depth area");
        assert_eq!(merged[0].depth_range, Some((0.0, 30.0)));
    }

    #[test]
    fn test_derive_land_from_west_half_water() {
        // Water covers the western half of a 1x1 degree box
        let bounds = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
        let water = vec![classified(
            polygon![
                (x: 0.0, y: 0.0),
                (x: 0.5, y: 0.0),
                (x: 0.5, y: 1.0),
                (x: 0.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ],
            "DEPARE",
        )];
        let land = derive_land_polygons(bounds, &water).unwrap();

        let land_area: f64 = land.iter().map(|l| l.area_km2).sum();
        let box_area = geometry::spherical_polygon_area_km2(&bounds.to_polygon());
        assert!(
            (land_area - box_area / 2.0).abs() / box_area < 0.001,
            "land {land_area} box {box_area}"
        );

        // Complement: land + water tile the box
        let water_area: f64 = water.iter().map(|w| w.area_km2).sum();
        assert!(((land_area + water_area) - box_area).abs() / box_area < 0.001);
    }

    #[test]
    fn test_no_water_means_all_land() {
        let bounds = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
        let land = derive_land_polygons(bounds, &[]).unwrap();
        assert_eq!(land.len(), 1);
        assert_eq!(land[0].classification, Classification::Land);
        let box_area = geometry::spherical_polygon_area_km2(&bounds.to_polygon());
        assert!((land[0].area_km2 - box_area).abs() / box_area < 1e-9);
    }

    #[test]
    fn test_water_covering_box_leaves_no_land() {
        let bounds = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
        let water = vec![classified(square(-0.5, -0.5, 2.0), "DEPARE")];
        let land = derive_land_polygons(bounds, &water).unwrap();
        assert!(land.is_empty());
    }

    #[test]
    fn test_degenerate_bounds_rejected() {
        let bounds = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 1.0 });
        assert!(derive_land_polygons(bounds, &[]).is_err());
    }

    #[test]
    fn test_is_point_wet() {
        let water = vec![classified(square(0.0, 0.0, 1.0), "DEPARE")];
        assert!(is_point_wet(Coord { x: 0.5, y: 0.5 }, &water));
        assert!(!is_point_wet(Coord { x: 2.0, y: 0.5 }, &water));
    }
}
