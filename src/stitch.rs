//! Tolerance-based stitching of boundary segments into chains
//!
//! Greedy endpoint matching: each chain grows from a seed segment by
//! repeatedly absorbing the nearest unconsumed segment whose endpoint lies
//! within tolerance of the chain's free end, reversing candidates as needed.
//! A chain finishes CLOSED when its free ends meet within tolerance, or
//! TERMINAL when no candidate remains. Residual fragmentation from
//! independently extracted categories is absorbed by re-running the same
//! algorithm at chain granularity, and remaining breaks are reported as gaps
//! that can optionally be bridged.
//!
//! Endpoint matching is O(n²) in segment count with no early-exit; acceptable
//! for per-tile feature counts. A calling layer that needs bounded latency
//! must impose its own deadline.

use crate::extract::ExtractedSegment;
use crate::geometry;
use crate::priority::{UNRANKED, source_rank};
use crate::waterland::{ClassifiedPolygon, is_point_wet};
use crate::{EngineError, Result};
use geo::{Coord, LineString};
use std::collections::BTreeSet;

/// How a detected gap is bridged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GapFillMethod {
    /// Two-point straight line between the gap endpoints
    Linear,
    /// Reserved: curved bridge. Currently constructed as linear.
    Arc,
    /// Reserved: path traced along a water boundary. Currently constructed as linear.
    CoastlineFollowing,
}

/// Stitching configuration
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StitchOptions {
    /// Endpoints within this distance are considered connected
    pub tolerance_meters: f64,
    /// Unconnected endpoints within this distance are reported as gaps
    pub max_gap_meters: f64,
    /// Synthesize bridging segments for detected gaps
    pub fill_gaps: bool,
    pub fill_method: GapFillMethod,
    /// Discard a candidate bridge whose midpoint is not inside any supplied
    /// water polygon
    pub validate_with_water: bool,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            tolerance_meters: 50.0,
            max_gap_meters: 100.0,
            fill_gaps: false,
            fill_method: GapFillMethod::Linear,
            validate_with_water: false,
        }
    }
}

impl StitchOptions {
    /// Reject invalid configuration before the engine runs
    ///
    /// A zero tolerance is valid (only exact endpoint matches merge); a
    /// negative or non-finite one is not.
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance_meters.is_finite() || self.tolerance_meters < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "stitch tolerance must be non-negative, got {}",
                self.tolerance_meters
            )));
        }
        if !self.max_gap_meters.is_finite() || self.max_gap_meters < self.tolerance_meters {
            return Err(EngineError::InvalidConfig(format!(
                "max gap distance {} must be at least the stitch tolerance {}",
                self.max_gap_meters, self.tolerance_meters
            )));
        }
        Ok(())
    }
}

/// A continuous line produced by stitching one or more segments end-to-end
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chain {
    pub line: LineString<f64>,
    /// Every source type that contributed a segment
    pub sources: BTreeSet<String>,
    /// The free ends met within tolerance (or the seed was already a ring)
    pub closed: bool,
    pub subtype: Option<String>,
    /// Sum of great-circle distances between consecutive coordinates
    pub length_meters: f64,
    /// Unfilled gaps touching this chain's endpoints
    pub gap_count: usize,
    /// Any constituent segment survived deduplication
    pub deduplicated: bool,
    /// Number of segments merged into this chain
    pub merged_segment_count: usize,
}

impl Chain {
    #[inline]
    pub fn first_coord(&self) -> Coord<f64> {
        self.line.0[0]
    }

    #[inline]
    pub fn last_coord(&self) -> Coord<f64> {
        self.line.0[self.line.0.len() - 1]
    }

    /// Free endpoints of an open chain; `None` when closed
    pub fn endpoints(&self) -> Option<(Coord<f64>, Coord<f64>)> {
        if self.closed {
            None
        } else {
            Some((self.first_coord(), self.last_coord()))
        }
    }
}

/// An unstitched break between two chain endpoints within the search radius
///
/// Immutable diagnostic record; `filled` marks that a bridging segment was
/// materialized and absorbed into the network.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gap {
    pub endpoint_a: Coord<f64>,
    pub endpoint_b: Coord<f64>,
    pub distance_meters: f64,
    pub filled: bool,
    pub fill_method: Option<GapFillMethod>,
    pub validated_against_water: bool,
}

/// Chains plus gap diagnostics from one stitching run
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StitchOutcome {
    pub chains: Vec<Chain>,
    pub gaps: Vec<Gap>,
}

/// Lifecycle of a chain under construction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChainState {
    Growing,
    Closed,
    Terminal,
}

/// A stitchable unit: either a raw segment or a whole chain being re-stitched
struct Piece {
    line: LineString<f64>,
    sources: BTreeSet<String>,
    subtype: Option<String>,
    deduplicated: bool,
    merged_count: usize,
    rank: u32,
}

impl Piece {
    fn from_segment(segment: ExtractedSegment) -> Self {
        Self {
            rank: source_rank(&segment.primary_source),
            sources: segment.all_sources.iter().cloned().collect(),
            subtype: segment.subtype,
            deduplicated: segment.deduplicated,
            merged_count: 1,
            line: segment.line,
        }
    }

    fn from_chain(chain: Chain) -> Self {
        Self {
            rank: chain
                .sources
                .iter()
                .map(|s| source_rank(s))
                .min()
                .unwrap_or(UNRANKED),
            sources: chain.sources,
            subtype: chain.subtype,
            deduplicated: chain.deduplicated,
            merged_count: chain.merged_segment_count,
            line: chain.line,
        }
    }

    /// Synthetic bridging segment: contributes geometry but no source type
    fn bridge(line: LineString<f64>) -> Self {
        Self {
            line,
            sources: BTreeSet::new(),
            subtype: None,
            deduplicated: false,
            merged_count: 1,
            rank: UNRANKED,
        }
    }

    fn is_ring(&self) -> bool {
        self.line.0.len() >= 4 && self.line.0.first() == self.line.0.last()
    }
}

fn finish_chain(piece: Piece, closed: bool) -> Chain {
    let length_meters = geometry::line_length_meters(&piece.line);
    Chain {
        line: piece.line,
        sources: piece.sources,
        closed,
        subtype: piece.subtype,
        length_meters,
        gap_count: 0,
        deduplicated: piece.deduplicated,
        merged_segment_count: piece.merged_count,
    }
}

/// Greedy chain growth over a set of pieces
///
/// `reseed_tail` lets the working chain flip once after its tail end is
/// exhausted so the head side can also absorb candidates; used at chain
/// granularity where the seed's orientation is arbitrary.
fn grow_chains(pieces: Vec<Piece>, tolerance_meters: f64, reseed_tail: bool) -> Vec<Chain> {
    let mut slots: Vec<Option<Piece>> = pieces.into_iter().map(Some).collect();
    let mut chains = Vec::new();

    for seed_index in 0..slots.len() {
        let Some(mut working) = slots[seed_index].take() else {
            continue;
        };

        if working.is_ring() {
            chains.push(finish_chain(working, true));
            continue;
        }

        let mut state = ChainState::Growing;
        let mut flipped = false;

        while state == ChainState::Growing {
            let tail = *working.line.0.last().expect("chain is never empty");

            // Nearest unconsumed segment endpoint within tolerance; ties by
            // distance, then priority rank, then input order
            let mut best: Option<(usize, bool, f64, u32)> = None;
            for (i, slot) in slots.iter().enumerate() {
                let Some(candidate) = slot else { continue };
                let d_forward = geometry::haversine_distance(tail, candidate.line.0[0]);
                let d_reverse = geometry::haversine_distance(
                    tail,
                    candidate.line.0[candidate.line.0.len() - 1],
                );
                let (distance, reverse) = if d_forward <= d_reverse {
                    (d_forward, false)
                } else {
                    (d_reverse, true)
                };
                if distance > tolerance_meters {
                    continue;
                }
                let better = match &best {
                    None => true,
                    Some((_, _, best_d, best_rank)) => {
                        distance < *best_d
                            || (distance == *best_d && candidate.rank < *best_rank)
                    }
                };
                if better {
                    best = Some((i, reverse, distance, candidate.rank));
                }
            }

            match best {
                Some((i, reverse, _, _)) => {
                    let mut candidate = slots[i].take().expect("candidate just seen");
                    if reverse {
                        candidate.line.0.reverse();
                    }

                    // Skip the join coordinate when the endpoints coincide exactly
                    let skip = usize::from(candidate.line.0[0] == tail);
                    working.line.0.extend(candidate.line.0.drain(..).skip(skip));

                    working.sources.extend(candidate.sources);
                    working.merged_count += candidate.merged_count;
                    working.deduplicated |= candidate.deduplicated;
                    if working.subtype.is_none() {
                        working.subtype = candidate.subtype;
                    }

                    let head = working.line.0[0];
                    let new_tail = *working.line.0.last().expect("chain is never empty");
                    if working.line.0.len() >= 3
                        && geometry::haversine_distance(head, new_tail) <= tolerance_meters
                    {
                        if head != new_tail {
                            working.line.0.push(head);
                        }
                        state = ChainState::Closed;
                    }
                }
                None => {
                    if reseed_tail && !flipped {
                        working.line.0.reverse();
                        flipped = true;
                    } else {
                        state = ChainState::Terminal;
                    }
                }
            }
        }

        chains.push(finish_chain(working, state == ChainState::Closed));
    }

    chains
}

/// Re-apply stitching at chain granularity
///
/// Independently extracted categories produce chains that should connect but
/// were seeded separately; this pass absorbs that residual fragmentation.
/// Closed chains pass through untouched.
pub fn merge_connected_chains(chains: Vec<Chain>, tolerance_meters: f64) -> Vec<Chain> {
    let (closed, open): (Vec<_>, Vec<_>) = chains.into_iter().partition(|c| c.closed);

    let mut merged = grow_chains(
        open.into_iter().map(Piece::from_chain).collect(),
        tolerance_meters,
        true,
    );
    merged.extend(closed);
    merged
}

/// Pairwise endpoint distances for open chains, reported as gaps
///
/// A chain's own head/tail pair is included to flag near-closures. Endpoints
/// already within stitch tolerance are not gaps (they would have stitched);
/// the distance is symmetric in visit order.
pub fn detect_gaps(chains: &[Chain], options: &StitchOptions) -> Vec<Gap> {
    let mut endpoints: Vec<Coord<f64>> = Vec::new();
    for chain in chains {
        if let Some((head, tail)) = chain.endpoints() {
            endpoints.push(head);
            endpoints.push(tail);
        }
    }

    let mut gaps = Vec::new();
    for a in 0..endpoints.len() {
        for b in (a + 1)..endpoints.len() {
            let distance = geometry::haversine_distance(endpoints[a], endpoints[b]);
            if distance > options.tolerance_meters && distance <= options.max_gap_meters {
                gaps.push(Gap {
                    endpoint_a: endpoints[a],
                    endpoint_b: endpoints[b],
                    distance_meters: distance,
                    filled: false,
                    fill_method: None,
                    validated_against_water: false,
                });
            }
        }
    }
    gaps
}

/// Build bridging segments for detected gaps, marking each gap's outcome
fn build_bridges(
    gaps: &mut [Gap],
    options: &StitchOptions,
    water: Option<&[ClassifiedPolygon]>,
) -> Vec<Piece> {
    let mut bridges = Vec::new();
    for gap in gaps.iter_mut() {
        // Arc and coastline-following constructions are not yet specified;
        // both currently produce the linear baseline.
        let line = LineString::new(vec![gap.endpoint_a, gap.endpoint_b]);

        if options.validate_with_water {
            if let Some(water) = water {
                let mid = geometry::midpoint(gap.endpoint_a, gap.endpoint_b);
                if !is_point_wet(mid, water) {
                    tracing::debug!(
                        distance = gap.distance_meters,
                        "Discarding gap bridge with dry midpoint"
                    );
                    continue;
                }
                gap.validated_against_water = true;
            }
        }

        gap.filled = true;
        gap.fill_method = Some(options.fill_method);
        bridges.push(Piece::bridge(line));
    }
    bridges
}

/// Count unfilled gaps touching each chain's endpoints
fn assign_gap_counts(chains: &mut [Chain], gaps: &[Gap]) {
    for chain in chains.iter_mut() {
        let Some((head, tail)) = chain.endpoints() else {
            continue;
        };
        chain.gap_count = gaps
            .iter()
            .filter(|g| !g.filled)
            .filter(|g| {
                g.endpoint_a == head
                    || g.endpoint_a == tail
                    || g.endpoint_b == head
                    || g.endpoint_b == tail
            })
            .count();
    }
}

/// Stitch segments into chains, merge residual fragments, detect gaps and
/// optionally bridge them
///
/// When gaps are filled, stitching is re-run over the chains plus the
/// synthesized bridges so each bridge is absorbed into its neighbors. The
/// returned gaps keep their diagnostic records with `filled` flags set.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn stitch_segments(
    segments: Vec<ExtractedSegment>,
    options: &StitchOptions,
    water: Option<&[ClassifiedPolygon]>,
) -> Result<StitchOutcome> {
    options.validate()?;

    let pieces = segments.into_iter().map(Piece::from_segment).collect();
    let chains = grow_chains(pieces, options.tolerance_meters, false);
    let mut chains = merge_connected_chains(chains, options.tolerance_meters);

    let mut gaps = detect_gaps(&chains, options);

    if options.fill_gaps && !gaps.is_empty() {
        let bridges = build_bridges(&mut gaps, options, water);
        if !bridges.is_empty() {
            let mut pieces: Vec<Piece> = chains.into_iter().map(Piece::from_chain).collect();
            pieces.extend(bridges);
            chains = merge_connected_chains(
                grow_chains(pieces, options.tolerance_meters, false),
                options.tolerance_meters,
            );
        }
    }

    assign_gap_counts(&mut chains, &gaps);

    tracing::debug!(
        chain_count = chains.len(),
        gap_count = gaps.len(),
        "Stitching complete"
    );

    Ok(StitchOutcome { chains, gaps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{BoundaryClass, ExtractionMethod};

    fn create_test_segment(source: &str, coords: Vec<(f64, f64)>) -> ExtractedSegment {
        ExtractedSegment::from_line(
            LineString::from(coords),
            source,
            ExtractionMethod::Explicit,
            BoundaryClass::Coastline,
        )
        .unwrap()
    }

    #[test]
    fn test_exact_shared_endpoint_merges() {
        // Two segments sharing (0,1) exactly merge under any tolerance >= 0
        let segments = vec![
            create_test_segment("COALNE", vec![(0.0, 0.0), (0.0, 1.0)]),
            create_test_segment("COALNE", vec![(0.0, 1.0), (0.0, 2.0)]),
        ];
        let options = StitchOptions {
            tolerance_meters: 0.0,
            ..Default::default()
        };
        let outcome = stitch_segments(segments, &options, None).unwrap();

        assert_eq!(outcome.chains.len(), 1);
        let chain = &outcome.chains[0];
        assert_eq!(chain.line.0.len(), 3);
        assert_eq!(chain.line.0[0], Coord { x: 0.0, y: 0.0 });
        assert_eq!(chain.line.0[2], Coord { x: 0.0, y: 2.0 });
        assert!(outcome.gaps.is_empty());
    }

    #[test]
    fn test_two_segment_chain_default_tolerance() {
        let segments = vec![
            create_test_segment("COALNE", vec![(0.0, 0.0), (0.0, 1.0)]),
            create_test_segment("COALNE", vec![(0.0, 1.0), (0.0, 2.0)]),
        ];
        let outcome = stitch_segments(segments, &StitchOptions::default(), None).unwrap();
        assert_eq!(outcome.chains.len(), 1);
        assert!(!outcome.chains[0].closed);
        assert_eq!(outcome.chains[0].merged_segment_count, 2);
        assert_eq!(outcome.gaps.len(), 0);
    }

    #[test]
    fn test_candidate_reversed_to_preserve_adjacency() {
        // Second segment runs (0,2) -> (0,1): must be reversed before appending
        let segments = vec![
            create_test_segment("COALNE", vec![(0.0, 0.0), (0.0, 1.0)]),
            create_test_segment("COALNE", vec![(0.0, 2.0), (0.0, 1.0)]),
        ];
        let outcome = stitch_segments(segments, &StitchOptions::default(), None).unwrap();
        assert_eq!(outcome.chains.len(), 1);
        assert_eq!(
            outcome.chains[0].line.0,
            vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 0.0, y: 1.0 },
                Coord { x: 0.0, y: 2.0 },
            ]
        );
    }

    #[test]
    fn test_length_additivity() {
        let first = create_test_segment("COALNE", vec![(0.0, 0.0), (0.0, 1.0)]);
        let second = create_test_segment("COALNE", vec![(0.0, 1.0), (0.0, 2.0)]);
        let expected = geometry::line_length_meters(&first.line)
            + geometry::line_length_meters(&second.line);

        let outcome =
            stitch_segments(vec![first, second], &StitchOptions::default(), None).unwrap();
        assert!((outcome.chains[0].length_meters - expected).abs() < 1e-6);
    }

    #[test]
    fn test_closure_detection() {
        // Three segments forming a triangle close into a ring
        let segments = vec![
            create_test_segment("COALNE", vec![(0.0, 0.0), (0.1, 0.0)]),
            create_test_segment("COALNE", vec![(0.1, 0.0), (0.05, 0.1)]),
            create_test_segment("COALNE", vec![(0.05, 0.1), (0.0, 0.0)]),
        ];
        let outcome = stitch_segments(segments, &StitchOptions::default(), None).unwrap();
        assert_eq!(outcome.chains.len(), 1);
        assert!(outcome.chains[0].closed);
        assert_eq!(
            outcome.chains[0].line.0.first(),
            outcome.chains[0].line.0.last()
        );
    }

    #[test]
    fn test_ring_seed_is_closed_immediately() {
        let segments = vec![create_test_segment(
            "LNDARE",
            vec![(0.0, 0.0), (0.1, 0.0), (0.05, 0.1), (0.0, 0.0)],
        )];
        let outcome = stitch_segments(segments, &StitchOptions::default(), None).unwrap();
        assert!(outcome.chains[0].closed);
    }

    #[test]
    fn test_gap_reported_but_not_filled_beyond_limit() {
        // Endpoints ~120 m apart with max gap 100 m: no gap, no join
        let segments = vec![
            create_test_segment("COALNE", vec![(0.0, 0.0), (0.0, 0.01)]),
            create_test_segment("COALNE", vec![(0.0, 0.011_08), (0.0, 0.02)]),
        ];
        let outcome = stitch_segments(segments, &StitchOptions::default(), None).unwrap();
        assert_eq!(outcome.chains.len(), 2);
        assert!(outcome.gaps.is_empty());

        // Raise the search radius so the same break is reported
        let wide = StitchOptions {
            max_gap_meters: 150.0,
            ..Default::default()
        };
        let segments = vec![
            create_test_segment("COALNE", vec![(0.0, 0.0), (0.0, 0.01)]),
            create_test_segment("COALNE", vec![(0.0, 0.011_08), (0.0, 0.02)]),
        ];
        let outcome = stitch_segments(segments, &wide, None).unwrap();
        assert_eq!(outcome.gaps.len(), 1);
        assert!(!outcome.gaps[0].filled);
        let d = outcome.gaps[0].distance_meters;
        assert!(d > 100.0 && d < 150.0, "got {d}");
        assert_eq!(outcome.chains[0].gap_count, 1);
    }

    #[test]
    fn test_gap_filling_joins_chains() {
        // ~78 m break, fillable under the default 100 m search radius
        let segments = vec![
            create_test_segment("COALNE", vec![(0.0, 0.0), (0.0, 0.01)]),
            create_test_segment("COALNE", vec![(0.0, 0.0107), (0.0, 0.02)]),
        ];
        let options = StitchOptions {
            fill_gaps: true,
            ..Default::default()
        };
        let outcome = stitch_segments(segments, &options, None).unwrap();
        assert_eq!(outcome.chains.len(), 1);
        assert_eq!(outcome.gaps.len(), 1);
        assert!(outcome.gaps[0].filled);
        assert_eq!(outcome.gaps[0].fill_method, Some(GapFillMethod::Linear));
        assert_eq!(outcome.chains[0].gap_count, 0);
    }

    #[test]
    fn test_gap_symmetry() {
        let a = Coord { x: 0.0, y: 0.01 };
        let b = Coord { x: 0.0, y: 0.0107 };
        assert_eq!(
            geometry::haversine_distance(a, b),
            geometry::haversine_distance(b, a)
        );
    }

    #[test]
    fn test_near_closure_flagged_as_gap() {
        // An almost-ring whose ends are ~78 m apart
        let segments = vec![create_test_segment(
            "COALNE",
            vec![(0.0, 0.0), (0.1, 0.0), (0.05, 0.1), (0.0, 0.0007)],
        )];
        let outcome = stitch_segments(segments, &StitchOptions::default(), None).unwrap();
        assert_eq!(outcome.chains.len(), 1);
        assert!(!outcome.chains[0].closed);
        assert_eq!(outcome.gaps.len(), 1);
    }

    #[test]
    fn test_tie_broken_by_priority_rank() {
        // Two candidates at identical distance: SLCONS (rank 20) wins over
        // DEPARE (rank 110)
        let segments = vec![
            create_test_segment("COALNE", vec![(0.0, 0.0), (0.0, 1.0)]),
            create_test_segment("DEPARE", vec![(0.0, 1.0), (0.1, 1.5)]),
            create_test_segment("SLCONS", vec![(0.0, 1.0), (-0.1, 1.5)]),
        ];
        let outcome = stitch_segments(segments, &StitchOptions::default(), None).unwrap();
        // The seed chain absorbs SLCONS first; DEPARE then attaches at (0,1)
        let main = outcome
            .chains
            .iter()
            .find(|c| c.sources.contains("SLCONS"))
            .unwrap();
        assert!(main.sources.contains("COALNE"));
    }

    #[test]
    fn test_invalid_tolerance_rejected() {
        let options = StitchOptions {
            tolerance_meters: -1.0,
            ..Default::default()
        };
        assert!(stitch_segments(Vec::new(), &options, None).is_err());

        let options = StitchOptions {
            tolerance_meters: 50.0,
            max_gap_meters: 10.0,
            ..Default::default()
        };
        assert!(stitch_segments(Vec::new(), &options, None).is_err());
    }

    #[test]
    fn test_merge_connected_chains_absorbs_fragments() {
        let make_chain = |coords: Vec<(f64, f64)>| {
            finish_chain(
                Piece::from_segment(create_test_segment("COALNE", coords)),
                false,
            )
        };
        // Fragment B connects to A's head, which tail-only growth missed
        let a = make_chain(vec![(0.0, 1.0), (0.0, 2.0)]);
        let b = make_chain(vec![(0.0, 0.0), (0.0, 1.0)]);
        let merged = merge_connected_chains(vec![a, b], 50.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].line.0.len(), 3);
    }

    #[test]
    fn test_sources_accumulate_across_chain() {
        let segments = vec![
            create_test_segment("COALNE", vec![(0.0, 0.0), (0.0, 1.0)]),
            create_test_segment("SLCONS", vec![(0.0, 1.0), (0.0, 2.0)]),
        ];
        let outcome = stitch_segments(segments, &StitchOptions::default(), None).unwrap();
        let chain = &outcome.chains[0];
        assert!(chain.sources.contains("COALNE"));
        assert!(chain.sources.contains("SLCONS"));
        assert_eq!(chain.merged_segment_count, 2);
    }
}
