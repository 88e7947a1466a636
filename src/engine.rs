//! CoastlineEngine - Top-level manager running the full synthesis pipeline
//!
//! Extraction, deduplication, stitching, classification and processing for
//! one chart region, with the water/land classifier run independently and
//! its water output feeding gap validation and proximity metrics.

use crate::classify::{HeuristicClassifier, SubtypeClassifier};
use crate::extract::{CategorySet, extract_all};
use crate::process::{ProcessOptions, ProcessedLine, process_chain};
use crate::stitch::{Gap, StitchOptions, stitch_segments};
use crate::waterland::{WaterLandOptions, WaterLandPartition, classify_water_land};
use crate::{Result, SourceFeature};
use rayon::prelude::*;

/// Engine configuration
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    pub categories: CategorySet,
    pub stitch: StitchOptions,
    pub process: ProcessOptions,
    pub water_land: WaterLandOptions,
}

impl EngineConfig {
    /// Reject invalid configuration before any work runs
    pub fn validate(&self) -> Result<()> {
        self.stitch.validate()?;
        self.process.validate()?;
        self.water_land.validate()?;
        Ok(())
    }
}

/// Summary statistics for a synthesized network
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkInfo {
    pub segment_count: usize,
    pub chain_count: usize,
    pub closed_chain_count: usize,
    pub total_length_meters: f64,
    pub gap_count: usize,
}

/// Full output of one synthesis invocation
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoastlineNetwork {
    pub chains: Vec<ProcessedLine>,
    pub gaps: Vec<Gap>,
    pub water_land: WaterLandPartition,
    pub info: NetworkInfo,
}

/// Coastline synthesis engine for chart feature sets
///
/// Each [`synthesize`](Self::synthesize) call is single-threaded, synchronous
/// and side-effect-free: all working state is local, so one engine may serve
/// concurrent callers (one call per chart tile) without synchronization.
pub struct CoastlineEngine {
    config: EngineConfig,
    classifier: Box<dyn SubtypeClassifier + Send + Sync>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl CoastlineEngine {
    /// Create an engine, rejecting invalid configuration up front
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            classifier: Box::new(HeuristicClassifier::default()),
        })
    }

    /// Replace the subtype classifier with chart-specific rules
    pub fn with_classifier(
        mut self,
        classifier: Box<dyn SubtypeClassifier + Send + Sync>,
    ) -> Self {
        self.classifier = classifier;
        self
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Synthesize the coastline network and water/land classification for
    /// one chart region
    pub fn synthesize(&self, features: &[SourceFeature]) -> Result<CoastlineNetwork> {
        #[cfg(feature = "profiling")]
        profiling::scope!("engine::synthesize");

        // Water/land classification runs independently of line synthesis;
        // its water output serves as the wetness oracle below
        let water_land = classify_water_land(features, &self.config.water_land);

        let segments = extract_all(features, &self.config.categories);
        let segment_count = segments.len();

        let outcome = stitch_segments(segments, &self.config.stitch, Some(&water_land.water))?;

        let mut chains = outcome.chains;
        for chain in &mut chains {
            chain.subtype = Some(self.classifier.classify(chain));
        }

        let processed: Vec<ProcessedLine> = chains
            .into_iter()
            .map(|chain| process_chain(chain, &self.config.process, Some(&water_land.water)))
            .collect();

        let info = NetworkInfo {
            segment_count,
            chain_count: processed.len(),
            closed_chain_count: processed.iter().filter(|p| p.chain.closed).count(),
            total_length_meters: processed.iter().map(|p| p.chain.length_meters).sum(),
            gap_count: outcome.gaps.iter().filter(|g| !g.filled).count(),
        };

        tracing::debug!(
            chains = info.chain_count,
            closed = info.closed_chain_count,
            gaps = info.gap_count,
            "Synthesis complete"
        );

        Ok(CoastlineNetwork {
            chains: processed,
            gaps: outcome.gaps,
            water_land,
            info,
        })
    }

    /// Synthesize multiple chart tiles in parallel
    ///
    /// Per-tile invocations stay single-threaded; tiles are independent, so
    /// this is a plain data-parallel fan-out.
    pub fn synthesize_all(
        &self,
        tiles: &[Vec<SourceFeature>],
    ) -> Vec<Result<CoastlineNetwork>> {
        tiles
            .par_iter()
            .map(|features| self.synthesize(features))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{ATTR_DEPTH_MAX, ATTR_DEPTH_MIN, FeatureGeometry};
    use crate::stitch::Chain;
    use geo::{LineString, polygon};

    fn create_harbor_features() -> Vec<SourceFeature> {
        vec![
            // Coastline in two fragments sharing an endpoint
            SourceFeature::new(
                "COALNE_1",
                "COALNE",
                FeatureGeometry::Line(LineString::from(vec![(0.0, 0.0), (0.0, 0.01)])),
            ),
            SourceFeature::new(
                "COALNE_2",
                "COALNE",
                FeatureGeometry::Line(LineString::from(vec![(0.0, 0.01), (0.01, 0.02)])),
            ),
            // The same first fragment as a land-area edge (duplicate source)
            SourceFeature::new(
                "LNDARE_1",
                "LNDARE",
                FeatureGeometry::Line(LineString::from(vec![(0.0, 0.0), (0.0, 0.01)])),
            ),
            // A navigable water polygon to the west
            SourceFeature::new(
                "DEPARE_1",
                "DEPARE",
                FeatureGeometry::Polygon(polygon![
                    (x: -0.1, y: 0.0),
                    (x: 0.0, y: 0.0),
                    (x: 0.0, y: 0.02),
                    (x: -0.1, y: 0.02),
                    (x: -0.1, y: 0.0),
                ]),
            )
            .with_attribute(ATTR_DEPTH_MIN, 5.0)
            .with_attribute(ATTR_DEPTH_MAX, 20.0),
        ]
    }

    #[test]
    fn test_full_pipeline() {
        let engine = CoastlineEngine::new(EngineConfig::default()).unwrap();
        let network = engine.synthesize(&create_harbor_features()).unwrap();

        // The duplicate fragment collapses, then both fragments stitch
        assert_eq!(network.info.segment_count, 2);
        assert_eq!(network.info.chain_count, 1);
        assert_eq!(network.water_land.water.len(), 1);

        let chain = &network.chains[0].chain;
        assert!(chain.sources.contains("COALNE"));
        assert!(chain.sources.contains("LNDARE"));
        assert!(chain.deduplicated);
        assert!(chain.subtype.is_some());
        assert!(network.chains[0].proximity_to_water_meters.is_some());
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let config = EngineConfig {
            stitch: StitchOptions {
                tolerance_meters: f64::NAN,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(CoastlineEngine::new(config).is_err());
    }

    #[test]
    fn test_empty_input_yields_empty_network() {
        let engine = CoastlineEngine::new(EngineConfig::default()).unwrap();
        let network = engine.synthesize(&[]).unwrap();
        assert_eq!(network.info.chain_count, 0);
        assert!(network.chains.is_empty());
        assert!(network.gaps.is_empty());
    }

    #[test]
    fn test_determinism() {
        let engine = CoastlineEngine::new(EngineConfig::default()).unwrap();
        let features = create_harbor_features();
        let first = engine.synthesize(&features).unwrap();
        let second = engine.synthesize(&features).unwrap();

        assert_eq!(first.info.chain_count, second.info.chain_count);
        assert_eq!(
            first.info.total_length_meters,
            second.info.total_length_meters
        );
        for (a, b) in first.chains.iter().zip(second.chains.iter()) {
            assert_eq!(a.chain.line, b.chain.line);
            assert_eq!(a.chain.subtype, b.chain.subtype);
        }
    }

    #[test]
    fn test_synthesize_all_matches_sequential() {
        let engine = CoastlineEngine::new(EngineConfig::default()).unwrap();
        let tiles = vec![create_harbor_features(), Vec::new(), create_harbor_features()];
        let results = engine.synthesize_all(&tiles);

        assert_eq!(results.len(), 3);
        let first = results[0].as_ref().unwrap();
        let sequential = engine.synthesize(&tiles[0]).unwrap();
        assert_eq!(first.info.chain_count, sequential.info.chain_count);
        assert_eq!(results[1].as_ref().unwrap().info.chain_count, 0);
    }

    #[test]
    fn test_custom_classifier() {
        struct Fixed;
        impl SubtypeClassifier for Fixed {
            fn classify(&self, _chain: &Chain) -> String {
                "breakwater".to_string()
            }
        }

        let engine = CoastlineEngine::new(EngineConfig::default())
            .unwrap()
            .with_classifier(Box::new(Fixed));
        let network = engine.synthesize(&create_harbor_features()).unwrap();
        assert_eq!(
            network.chains[0].chain.subtype.as_deref(),
            Some("breakwater")
        );
    }
}
