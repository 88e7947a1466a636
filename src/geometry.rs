//! Pure spherical-geometry functions shared by every pipeline stage
//!
//! All coordinates are WGS84 degrees with x = longitude and y = latitude.
//! Distances are great-circle meters; polygon areas use a spherical-excess
//! approximation that is adequate at chart scale but not geodesically exact.

use geo::{Coord, LineString, Polygon, Rect};

/// Earth's radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default number of decimal digits kept by coordinate quantization
pub const DEFAULT_PRECISION: usize = 6;

/// Haversine great-circle distance between two coordinates, in meters
#[inline]
pub fn haversine_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let delta_lat = (b.y - a.y).to_radians();
    let delta_lon = (b.x - a.x).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` to `b` in degrees, normalized to [0, 360)
#[inline]
pub fn initial_bearing(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let delta_lon = (b.x - a.x).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Minimal absolute angular difference between two bearings, in [0, 180]
#[inline]
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    if diff > 180.0 { 360.0 - diff } else { diff }
}

/// Circular mean bearing of a line via unit-vector summation
///
/// An arithmetic mean of bearings is wrong across the 0°/360° wraparound
/// (e.g. 350° and 10° average to 180°); summing unit vectors does not have
/// that failure mode. Returns `None` for lines with fewer than two points or
/// with no two distinct consecutive points.
pub fn average_bearing(line: &LineString<f64>) -> Option<f64> {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut count = 0usize;

    for pair in line.0.windows(2) {
        if pair[0] == pair[1] {
            continue;
        }
        let bearing = initial_bearing(pair[0], pair[1]).to_radians();
        sum_x += bearing.cos();
        sum_y += bearing.sin();
        count += 1;
    }

    if count == 0 || (sum_x.abs() < f64::EPSILON && sum_y.abs() < f64::EPSILON) {
        return None;
    }

    Some((sum_y.atan2(sum_x).to_degrees() + 360.0) % 360.0)
}

/// Standard deviation of a line's bearings around the circular mean, in degrees
///
/// Deviations are minimal angular differences, so a line oscillating around
/// north (359°, 1°, 358°, 2°) has a small variance instead of a huge one.
pub fn bearing_variance(line: &LineString<f64>) -> Option<f64> {
    let mean = average_bearing(line)?;

    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for pair in line.0.windows(2) {
        if pair[0] == pair[1] {
            continue;
        }
        let diff = angular_difference(initial_bearing(pair[0], pair[1]), mean);
        sum_sq += diff * diff;
        count += 1;
    }

    if count == 0 {
        return None;
    }

    Some((sum_sq / count as f64).sqrt())
}

/// Sum of great-circle distances between consecutive coordinates, in meters
///
/// Never a planar approximation: chain lengths must be additive when chains
/// are concatenated from segments.
pub fn line_length_meters(line: &LineString<f64>) -> f64 {
    line.0
        .windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .sum()
}

/// Spherical-excess area of a ring, in square meters (unsigned)
fn ring_area_m2(ring: &LineString<f64>) -> f64 {
    if ring.0.len() < 4 {
        return 0.0;
    }

    let mut total = 0.0;
    for pair in ring.0.windows(2) {
        let lon1 = pair[0].x.to_radians();
        let lon2 = pair[1].x.to_radians();
        let lat1 = pair[0].y.to_radians();
        let lat2 = pair[1].y.to_radians();
        total += (lon2 - lon1) * (2.0 + lat1.sin() + lat2.sin());
    }

    (total * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs()
}

/// Area of a polygon in km² using the spherical-excess approximation
///
/// Holes are subtracted from the outer ring. Adequate at chart scale; not
/// geodesically exact.
pub fn spherical_polygon_area_km2(poly: &Polygon<f64>) -> f64 {
    let outer = ring_area_m2(poly.exterior());
    let holes: f64 = poly.interiors().iter().map(ring_area_m2).sum();
    ((outer - holes).max(0.0)) / 1_000_000.0
}

/// Even-odd ray-casting point-in-polygon test on the outer ring only
///
/// Holes are not honored; a point inside a hole still reports as inside.
pub fn point_in_polygon(point: Coord<f64>, poly: &Polygon<f64>) -> bool {
    let ring = &poly.exterior().0;
    if ring.len() < 4 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Bounding box of a coordinate walk, `None` for empty input
pub fn bounding_box<I>(coords: I) -> Option<Rect<f64>>
where
    I: IntoIterator<Item = Coord<f64>>,
{
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut any = false;

    for c in coords {
        min_x = min_x.min(c.x);
        min_y = min_y.min(c.y);
        max_x = max_x.max(c.x);
        max_y = max_y.max(c.y);
        any = true;
    }

    if !any {
        return None;
    }

    Some(Rect::new(
        Coord { x: min_x, y: min_y },
        Coord { x: max_x, y: max_y },
    ))
}

/// Round a coordinate to `precision` decimal digits
///
/// Used both for output compaction and as the quantization step feeding
/// deduplication keys.
#[inline]
pub fn round_coord(c: Coord<f64>, precision: usize) -> Coord<f64> {
    let factor = 10f64.powi(precision as i32);
    Coord {
        x: (c.x * factor).round() / factor,
        y: (c.y * factor).round() / factor,
    }
}

/// Round every coordinate of a line to `precision` decimal digits
pub fn round_line(line: &LineString<f64>, precision: usize) -> LineString<f64> {
    LineString::new(line.0.iter().map(|&c| round_coord(c, precision)).collect())
}

/// Arithmetic midpoint of two coordinates
///
/// Only valid for nearby points (gap bridging operates well below 1 km);
/// not a great-circle midpoint.
#[inline]
pub fn midpoint(a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    }
}

/// Great-circle distance from a point to a segment, in meters
///
/// Projects into a local equirectangular plane around the point, clamps the
/// projection onto the segment, and measures the result with haversine.
pub fn point_to_segment_meters(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let cos_lat = p.y.to_radians().cos();
    let ax = (a.x - p.x) * cos_lat;
    let ay = a.y - p.y;
    let bx = (b.x - p.x) * cos_lat;
    let by = b.y - p.y;

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;

    let t = if len_sq <= f64::EPSILON {
        0.0
    } else {
        (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
    };

    let nearest = Coord {
        x: a.x + (b.x - a.x) * t,
        y: a.y + (b.y - a.y) * t,
    };
    haversine_distance(p, nearest)
}
