//! Coastline Engine - Coastline Synthesis for Nautical Chart Features
//!
//! This library ingests heterogeneous vector features from a nautical chart
//! feature catalog (points, lines and polygons tagged with an S-57 object code
//! and domain attributes) and synthesizes, per chart region, one authoritative
//! coastline network plus a water/land polygon classification.
//!
//! # Architecture
//!
//! - **[`SourceFeature`]**: Immutable parsed chart feature (geometry + typed attributes)
//! - **[`extract_all`]**: Per-object-code rules turning features into boundary segments
//! - **[`dedupe`]**: Collapses geometrically coincident segments to their highest-priority source
//! - **[`stitch_segments`]**: Joins segment endpoints within tolerance into chains, detects and
//!   optionally bridges gaps
//! - **[`HeuristicClassifier`]**: Assigns a subtype (island/mainland/pier/...) to finished chains
//! - **[`process_chain`]**: Optional simplification/smoothing, precision reduction and metrics
//! - **[`classify_water_land`]**: Partitions polygon features into water/land/navigation/danger,
//!   merges touching water bodies and derives land by complement
//! - **[`CoastlineEngine`]**: High-level manager running the full pipeline per chart tile
//!
//! # Performance Characteristics
//!
//! Each invocation is single-threaded, synchronous and side-effect-free, so
//! callers may run one invocation per chart tile concurrently (see
//! [`CoastlineEngine::synthesize_all`]). Endpoint matching is O(n²) in segment
//! count; acceptable for per-tile feature counts, not for whole-catalog batches.

mod classify;
mod dedupe;
mod engine;
mod extract;
mod feature;
pub mod geometry;
mod priority;
mod process;
mod stitch;
mod waterland;

// Public API exports
pub use classify::{HeuristicClassifier, SubtypeClassifier};
pub use dedupe::dedupe;
pub use engine::{CoastlineEngine, CoastlineNetwork, EngineConfig, NetworkInfo};
pub use extract::{
    BoundaryClass, CategorySet, ExtractedSegment, ExtractionMethod, extract_all,
};
pub use feature::{AttrValue, Attributes, FeatureGeometry, SourceFeature};
pub use priority::{UNRANKED, source_rank};
pub use process::{ProcessOptions, ProcessedLine, process_chain};
pub use stitch::{
    Chain, Gap, GapFillMethod, StitchOptions, StitchOutcome, detect_gaps, merge_connected_chains,
    stitch_segments,
};
pub use waterland::{
    Classification, ClassifiedFeature, ClassifiedPolygon, WaterLandOptions, WaterLandPartition,
    classify_water_land, derive_land_polygons, is_point_wet, merge_water_polygons,
};

/// Error types for the coastline engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
