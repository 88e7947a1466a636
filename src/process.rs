//! Final geometry processing and metrics for stitched chains
//!
//! Optional simplification and smoothing, recomputed length, proximity to
//! water, and precision reduction for oversized outputs.

use crate::geometry;
use crate::stitch::Chain;
use crate::waterland::ClassifiedPolygon;
use crate::{EngineError, Result};
use geo::Simplify;

/// Line processing configuration
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessOptions {
    /// Douglas-Peucker tolerance in degrees; `None` disables simplification
    pub simplify_tolerance: Option<f64>,
    /// Accepted but enforced per chain only: simplification always pins chain
    /// endpoints, which keeps shared joins in place, but adjacent chains are
    /// simplified independently
    pub preserve_topology: bool,
    /// Iterations of endpoint-preserving moving-average smoothing
    pub smoothing_iterations: usize,
    /// Decimal digits kept when precision reduction kicks in
    pub coordinate_precision: usize,
    /// Vertex count above which the output is precision-reduced (with a
    /// warning)
    pub size_warning_threshold: usize,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            simplify_tolerance: None,
            preserve_topology: true,
            smoothing_iterations: 0,
            coordinate_precision: geometry::DEFAULT_PRECISION,
            size_warning_threshold: 10_000,
        }
    }
}

impl ProcessOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(tolerance) = self.simplify_tolerance {
            if !tolerance.is_finite() || tolerance <= 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "simplify tolerance must be positive, got {tolerance}"
                )));
            }
        }
        if self.size_warning_threshold == 0 {
            return Err(EngineError::InvalidConfig(
                "size warning threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A finalized coastline with processing metrics
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessedLine {
    pub chain: Chain,
    /// Minimum vertex-to-water-boundary distance, when water polygons were
    /// supplied
    pub proximity_to_water_meters: Option<f64>,
}

/// One pass of endpoint-preserving moving-average smoothing
fn smooth_once(coords: &[geo::Coord<f64>]) -> Vec<geo::Coord<f64>> {
    if coords.len() < 3 {
        return coords.to_vec();
    }
    let mut out = Vec::with_capacity(coords.len());
    out.push(coords[0]);
    for window in coords.windows(3) {
        out.push(geo::Coord {
            x: (window[0].x + 2.0 * window[1].x + window[2].x) / 4.0,
            y: (window[0].y + 2.0 * window[1].y + window[2].y) / 4.0,
        });
    }
    out.push(coords[coords.len() - 1]);
    out
}

/// Minimum distance from any chain vertex to any water polygon boundary
fn proximity_to_water(chain: &Chain, water: &[ClassifiedPolygon]) -> Option<f64> {
    let mut min_distance = f64::INFINITY;
    for polygon in water.iter().flat_map(|w| w.geometry.0.iter()) {
        let ring = &polygon.exterior().0;
        for &vertex in &chain.line.0 {
            for pair in ring.windows(2) {
                let d = geometry::point_to_segment_meters(vertex, pair[0], pair[1]);
                if d < min_distance {
                    min_distance = d;
                }
            }
        }
    }
    min_distance.is_finite().then_some(min_distance)
}

/// Finalize one chain: simplify, smooth, recompute metrics, reduce precision
/// when oversized
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn process_chain(
    mut chain: Chain,
    options: &ProcessOptions,
    water: Option<&[ClassifiedPolygon]>,
) -> ProcessedLine {
    if let Some(tolerance) = options.simplify_tolerance {
        if chain.line.0.len() > 2 {
            chain.line = chain.line.simplify(tolerance);
        }
    }

    for _ in 0..options.smoothing_iterations {
        chain.line = geo::LineString::new(smooth_once(&chain.line.0));
    }

    if chain.line.0.len() > options.size_warning_threshold {
        tracing::warn!(
            vertices = chain.line.0.len(),
            threshold = options.size_warning_threshold,
            "Oversized coastline output; reducing coordinate precision"
        );
        chain.line = geometry::round_line(&chain.line, options.coordinate_precision);
    }

    chain.length_meters = geometry::line_length_meters(&chain.line);

    let proximity_to_water_meters = water.and_then(|w| proximity_to_water(&chain, w));

    ProcessedLine {
        chain,
        proximity_to_water_meters,
    }
}
