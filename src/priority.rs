//! Process-wide source-priority table
//!
//! Deduplication and stitching tie-breaks consult the same ordered lookup
//! table instead of scattering priority comparisons through the pipeline.
//! Lower rank wins: surveyed/engineered boundaries are trusted over coarse
//! polygon-derived approximations.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Sentinel rank for object codes the table does not know
pub const UNRANKED: u32 = u32::MAX;

static SOURCE_PRIORITY: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        // Engineered berth/terminal/drydock boundaries: surveyed to the meter
        ("BERTHS", 10),
        ("TERMNL", 11),
        ("DRYDOC", 12),
        // Shoreline construction
        ("SLCONS", 20),
        // Pontoon and mooring structures
        ("PONTON", 30),
        ("MORFAC", 31),
        // Natural coastline line
        ("COALNE", 40),
        // Zero-depth contour
        ("DEPCNT", 50),
        // Built infrastructure crossing or touching the shoreline
        ("BRIDGE", 60),
        ("PYLONS", 61),
        ("CRANES", 62),
        ("CONVYR", 63),
        // Harbor-area boundaries
        ("HRBARE", 70),
        ("HRBFAC", 71),
        ("CAUSWY", 80),
        // Linear obstructions whose edges approximate the shore
        ("FNCLNE", 90),
        ("RAILWY", 91),
        ("DMPGRD", 92),
        // Coarse polygon-derived edges
        ("LNDARE", 100),
        ("DEPARE", 110),
    ])
});

/// Rank of an S-57 object code; unranked codes get the worst possible rank
#[inline]
pub fn source_rank(type_code: &str) -> u32 {
    SOURCE_PRIORITY.get(type_code).copied().unwrap_or(UNRANKED)
}
