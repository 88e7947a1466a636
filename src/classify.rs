//! Subtype assignment for finished chains
//!
//! Classification is a best-effort heuristic, not a correctness guarantee,
//! so it sits behind a trait: stricter chart-specific rules can replace the
//! default without touching stitching or deduplication.

use crate::geometry;
use crate::stitch::Chain;

/// Assigns a subtype (island/mainland/pier/...) to a finished chain
pub trait SubtypeClassifier {
    fn classify(&self, chain: &Chain) -> String;
}

/// Default rule set
///
/// In order: a closed loop is an island; an explicit construction subtype
/// from the source attributes is taken literally; a short chain with a
/// near-constant bearing is assumed to be a pier; everything else is
/// mainland coastline.
#[derive(Clone, Copy, Debug)]
pub struct HeuristicClassifier {
    /// First/last coordinates within this distance count as a closed loop
    pub closure_tolerance_meters: f64,
    /// Maximum bearing standard deviation for the pier heuristic, degrees
    pub pier_bearing_variance_max: f64,
    /// Maximum length for the pier heuristic, meters
    pub pier_length_max_meters: f64,
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self {
            closure_tolerance_meters: 50.0,
            pier_bearing_variance_max: 10.0,
            pier_length_max_meters: 1000.0,
        }
    }
}

impl SubtypeClassifier for HeuristicClassifier {
    fn classify(&self, chain: &Chain) -> String {
        let first = chain.first_coord();
        let last = chain.last_coord();
        if chain.closed
            || geometry::haversine_distance(first, last) <= self.closure_tolerance_meters
        {
            return "island".to_string();
        }

        if let Some(subtype) = &chain.subtype {
            return subtype.clone();
        }

        if chain.length_meters < self.pier_length_max_meters {
            if let Some(variance) = geometry::bearing_variance(&chain.line) {
                if variance < self.pier_bearing_variance_max {
                    return "pier".to_string();
                }
            }
        }

        "mainland".to_string()
    }
}
