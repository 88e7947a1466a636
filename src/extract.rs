//! Feature-to-segment extraction rules
//!
//! Each enabled category has an independent, side-effect-free rule that turns
//! matching chart features into canonical boundary segments. Explicit boundary
//! lines pass through unchanged; polygon features are converted to their
//! boundary rings; depth areas and contours convert only at the drying line
//! (zero depth) or as shallow references up to [`SHALLOW_LIMIT_M`].
//!
//! A feature whose geometry cannot be converted is logged and skipped:
//! extraction never fails on a single malformed feature.

use crate::dedupe;
use crate::feature::{Attributes, SourceFeature};
use geo::{Coord, LineString};
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use std::collections::HashSet;

/// Depth areas and contours up to this depth (meters) are kept as
/// lower-priority shallow references
pub const SHALLOW_LIMIT_M: f64 = 2.0;

/// How a segment was obtained from its source feature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExtractionMethod {
    /// The source feature was already a boundary line
    Explicit,
    /// The segment was derived from a polygon boundary ring
    Derived,
}

/// Broad class of the boundary a segment represents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundaryClass {
    /// Natural land/water boundary
    Coastline,
    /// Depth-derived drying or shallow line
    Shoreline,
    /// Man-made structure edge
    Constructed,
}

/// A canonical boundary segment produced by extraction
///
/// Always has at least two coordinates; degenerate inputs are dropped at
/// construction and never stored.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractedSegment {
    pub line: LineString<f64>,
    /// Object code of the winning source (lowest priority rank)
    pub primary_source: String,
    /// Every source that contributed this geometry, primary first
    pub all_sources: SmallVec<[String; 2]>,
    pub method: ExtractionMethod,
    pub boundary_class: BoundaryClass,
    /// Literal subtype hint from source attributes (e.g. "pier" from CATSLC)
    pub subtype: Option<String>,
    /// Depth of the source contour or area minimum, when depth-derived
    pub depth_value: Option<f64>,
    /// Back-reference to the source feature's attribute bag
    pub attributes: Attributes,
    pub deduplicated: bool,
    pub merged_source_count: usize,
}

impl ExtractedSegment {
    /// Build a segment, dropping degenerate lines with fewer than two points
    pub fn from_line(
        line: LineString<f64>,
        source: &str,
        method: ExtractionMethod,
        boundary_class: BoundaryClass,
    ) -> Option<Self> {
        if line.0.len() < 2 {
            return None;
        }
        Some(Self {
            line,
            primary_source: source.to_string(),
            all_sources: SmallVec::from_iter([source.to_string()]),
            method,
            boundary_class,
            subtype: None,
            depth_value: None,
            attributes: Attributes::new(),
            deduplicated: false,
            merged_source_count: 1,
        })
    }

    #[inline]
    pub fn first_coord(&self) -> Coord<f64> {
        self.line.0[0]
    }

    #[inline]
    pub fn last_coord(&self) -> Coord<f64> {
        self.line.0[self.line.0.len() - 1]
    }

    /// A segment whose first and last coordinates coincide exactly
    #[inline]
    pub fn is_ring(&self) -> bool {
        self.line.0.len() >= 4 && self.first_coord() == self.last_coord()
    }
}

/// Independently enabled extraction categories
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategorySet {
    /// Explicit coastline lines (COALNE)
    pub coastline_lines: bool,
    /// Shoreline construction lines and polygon edges (SLCONS)
    pub shoreline_construction: bool,
    /// Land-area boundary rings (LNDARE)
    pub land_area_boundaries: bool,
    /// Depth areas drying at lowest tide or shallower than 2 m (DEPARE)
    pub zero_depth_areas: bool,
    /// Zero and shallow depth contours (DEPCNT)
    pub shallow_depth_contours: bool,
    /// Harbor, port and waterfront infrastructure edges
    pub harbor_works: bool,
}

impl Default for CategorySet {
    fn default() -> Self {
        Self {
            coastline_lines: true,
            shoreline_construction: true,
            land_area_boundaries: true,
            zero_depth_areas: true,
            shallow_depth_contours: true,
            harbor_works: true,
        }
    }
}

impl CategorySet {
    /// Every category disabled
    pub fn none() -> Self {
        Self {
            coastline_lines: false,
            shoreline_construction: false,
            land_area_boundaries: false,
            zero_depth_areas: false,
            shallow_depth_contours: false,
            harbor_works: false,
        }
    }
}

/// Harbor and waterfront infrastructure whose edges bound the water
static HARBOR_WORK_CODES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "HRBARE", "HRBFAC", "BERTHS", "TERMNL", "DRYDOC", "PONTON", "MORFAC", "CAUSWY", "BRIDGE",
        "PYLONS", "CRANES", "CONVYR", "FNCLNE", "RAILWY", "DMPGRD",
    ])
});

/// Literal subtype for an S-57 shoreline construction category (CATSLC)
pub fn construction_subtype(catslc: i64) -> Option<&'static str> {
    match catslc {
        1 => Some("breakwater"),
        2 => Some("groyne"),
        3 => Some("mole"),
        4 | 5 => Some("pier"),
        6 | 15 | 16 => Some("wharf"),
        7 => Some("training wall"),
        9 => Some("revetment"),
        10 => Some("seawall"),
        13 => Some("slipway"),
        _ => None,
    }
}

/// Descriptive subtype for an S-57 coastline category (CATCOA)
pub fn coastline_subtype(catcoa: i64) -> Option<&'static str> {
    match catcoa {
        1 => Some("steep coast"),
        2 => Some("flat coast"),
        3 => Some("sandy shore"),
        4 => Some("stony shore"),
        5 => Some("shingly shore"),
        6 => Some("glacier"),
        7 => Some("mangrove"),
        8 => Some("marshy shore"),
        9 => Some("coral reef"),
        10 => Some("ice coast"),
        _ => None,
    }
}

/// Boundary rings of a polygon or multi-polygon feature, outer rings and holes
/// alike. Empty or degenerate rings are skipped with a warning.
fn boundary_rings(feature: &SourceFeature) -> Vec<LineString<f64>> {
    let mut rings = Vec::new();
    for poly in feature.geometry.polygons() {
        for ring in std::iter::once(poly.exterior()).chain(poly.interiors().iter()) {
            if ring.0.len() < 4 {
                tracing::warn!(
                    feature_id = %feature.id,
                    "Skipping degenerate boundary ring with {} coordinates",
                    ring.0.len()
                );
                continue;
            }
            rings.push(ring.clone());
        }
    }
    rings
}

fn warn_unsupported(feature: &SourceFeature) {
    tracing::warn!(
        feature_id = %feature.id,
        kind = feature.geometry.kind_name(),
        "Skipping {} feature with unsupported geometry kind",
        feature.type_code
    );
}

/// Attach the shared source metadata to a freshly built segment
fn finish(mut segment: ExtractedSegment, feature: &SourceFeature) -> ExtractedSegment {
    segment.attributes = feature.attributes.clone();
    segment
}

/// Explicit coastline lines (COALNE) pass through unchanged
pub fn extract_coastline_lines(features: &[SourceFeature]) -> Vec<ExtractedSegment> {
    let mut segments = Vec::new();
    for feature in features.iter().filter(|f| f.type_code == "COALNE") {
        let Some(line) = feature.geometry.as_line() else {
            warn_unsupported(feature);
            continue;
        };
        let Some(mut segment) = ExtractedSegment::from_line(
            line.clone(),
            "COALNE",
            ExtractionMethod::Explicit,
            BoundaryClass::Coastline,
        ) else {
            warn_unsupported(feature);
            continue;
        };
        segment.subtype = feature
            .attributes
            .coastline_category()
            .and_then(coastline_subtype)
            .map(str::to_string);
        segments.push(finish(segment, feature));
    }
    segments
}

/// Shoreline construction (SLCONS): lines pass through, polygons convert to
/// their boundary rings. CATSLC becomes a literal subtype.
pub fn extract_shoreline_construction(features: &[SourceFeature]) -> Vec<ExtractedSegment> {
    let mut segments = Vec::new();
    for feature in features.iter().filter(|f| f.type_code == "SLCONS") {
        let subtype = feature
            .attributes
            .construction_category()
            .and_then(construction_subtype)
            .map(str::to_string);

        if let Some(line) = feature.geometry.as_line() {
            if let Some(mut segment) = ExtractedSegment::from_line(
                line.clone(),
                "SLCONS",
                ExtractionMethod::Explicit,
                BoundaryClass::Constructed,
            ) {
                segment.subtype = subtype.clone();
                segments.push(finish(segment, feature));
            }
            continue;
        }

        let rings = boundary_rings(feature);
        if rings.is_empty() {
            warn_unsupported(feature);
            continue;
        }
        for ring in rings {
            if let Some(mut segment) = ExtractedSegment::from_line(
                ring,
                "SLCONS",
                ExtractionMethod::Derived,
                BoundaryClass::Constructed,
            ) {
                segment.subtype = subtype.clone();
                segments.push(finish(segment, feature));
            }
        }
    }
    segments
}

/// Land areas (LNDARE): polygon boundary rings, or lines passed through.
/// Point land areas (islets charted as points) carry no boundary and are dropped.
pub fn extract_land_area_boundaries(features: &[SourceFeature]) -> Vec<ExtractedSegment> {
    let mut segments = Vec::new();
    for feature in features.iter().filter(|f| f.type_code == "LNDARE") {
        if let Some(line) = feature.geometry.as_line() {
            if let Some(segment) = ExtractedSegment::from_line(
                line.clone(),
                "LNDARE",
                ExtractionMethod::Explicit,
                BoundaryClass::Coastline,
            ) {
                segments.push(finish(segment, feature));
            }
            continue;
        }

        let rings = boundary_rings(feature);
        if rings.is_empty() {
            warn_unsupported(feature);
            continue;
        }
        for ring in rings {
            if let Some(segment) = ExtractedSegment::from_line(
                ring,
                "LNDARE",
                ExtractionMethod::Derived,
                BoundaryClass::Coastline,
            ) {
                segments.push(finish(segment, feature));
            }
        }
    }
    segments
}

/// Depth areas (DEPARE) convert only at the drying line or as shallow references
///
/// A minimum depth of zero means the area is exposed at lowest tide and its
/// edge is the strongest depth-derived shoreline evidence. Areas with
/// 0 < DRVAL1 ≤ 2 m are kept as lower-priority shallow references.
pub fn extract_zero_depth_areas(features: &[SourceFeature]) -> Vec<ExtractedSegment> {
    let mut segments = Vec::new();
    for feature in features.iter().filter(|f| f.type_code == "DEPARE") {
        let Some((min_depth, _)) = feature.attributes.depth_range() else {
            continue;
        };
        if min_depth < 0.0 || min_depth > SHALLOW_LIMIT_M {
            continue;
        }

        let rings = boundary_rings(feature);
        if rings.is_empty() {
            warn_unsupported(feature);
            continue;
        }
        for ring in rings {
            if let Some(mut segment) = ExtractedSegment::from_line(
                ring,
                "DEPARE",
                ExtractionMethod::Derived,
                BoundaryClass::Shoreline,
            ) {
                segment.depth_value = Some(min_depth);
                segments.push(finish(segment, feature));
            }
        }
    }
    segments
}

/// Depth contours (DEPCNT) convert only at zero or shallow values
pub fn extract_shallow_contours(features: &[SourceFeature]) -> Vec<ExtractedSegment> {
    let mut segments = Vec::new();
    for feature in features.iter().filter(|f| f.type_code == "DEPCNT") {
        let Some(value) = feature.attributes.contour_value() else {
            continue;
        };
        if value < 0.0 || value > SHALLOW_LIMIT_M {
            continue;
        }
        let Some(line) = feature.geometry.as_line() else {
            warn_unsupported(feature);
            continue;
        };
        if let Some(mut segment) = ExtractedSegment::from_line(
            line.clone(),
            "DEPCNT",
            ExtractionMethod::Explicit,
            BoundaryClass::Shoreline,
        ) {
            segment.depth_value = Some(value);
            segments.push(finish(segment, feature));
        }
    }
    segments
}

/// Harbor, port and waterfront infrastructure: polygons convert to rings,
/// lines pass through
pub fn extract_harbor_works(features: &[SourceFeature]) -> Vec<ExtractedSegment> {
    let mut segments = Vec::new();
    for feature in features
        .iter()
        .filter(|f| HARBOR_WORK_CODES.contains(f.type_code.as_str()))
    {
        if let Some(line) = feature.geometry.as_line() {
            if let Some(segment) = ExtractedSegment::from_line(
                line.clone(),
                &feature.type_code,
                ExtractionMethod::Explicit,
                BoundaryClass::Constructed,
            ) {
                segments.push(finish(segment, feature));
            }
            continue;
        }

        let rings = boundary_rings(feature);
        if rings.is_empty() {
            warn_unsupported(feature);
            continue;
        }
        for ring in rings {
            if let Some(segment) = ExtractedSegment::from_line(
                ring,
                &feature.type_code,
                ExtractionMethod::Derived,
                BoundaryClass::Constructed,
            ) {
                segments.push(finish(segment, feature));
            }
        }
    }
    segments
}

/// Union every enabled category's output, then collapse duplicates
///
/// This is the engine's segment-level entry point: the returned segments are
/// already deduplicated and ready for stitching.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn extract_all(features: &[SourceFeature], categories: &CategorySet) -> Vec<ExtractedSegment> {
    let mut segments = Vec::new();

    if categories.coastline_lines {
        segments.extend(extract_coastline_lines(features));
    }
    if categories.shoreline_construction {
        segments.extend(extract_shoreline_construction(features));
    }
    if categories.land_area_boundaries {
        segments.extend(extract_land_area_boundaries(features));
    }
    if categories.zero_depth_areas {
        segments.extend(extract_zero_depth_areas(features));
    }
    if categories.shallow_depth_contours {
        segments.extend(extract_shallow_contours(features));
    }
    if categories.harbor_works {
        segments.extend(extract_harbor_works(features));
    }

    tracing::debug!(
        feature_count = features.len(),
        segment_count = segments.len(),
        "Extraction complete"
    );

    dedupe::dedupe(segments)
}
