//! Priority-based deduplication of geometrically coincident segments
//!
//! Several catalog sources routinely describe the same physical boundary (a
//! pier edge may appear as SLCONS, as the LNDARE polygon edge and as the zero
//! contour). Segments are grouped by a quantized coordinate-sequence key and
//! each group collapses to its highest-priority member, keeping the union of
//! all source types so no information is lost.

use crate::extract::ExtractedSegment;
use crate::geometry;
use crate::priority::source_rank;
use std::collections::HashMap;

/// Quantization factor matching [`geometry::DEFAULT_PRECISION`] decimal digits
const KEY_SCALE: f64 = 1e6;

/// Orientation-insensitive quantized key for a coordinate sequence
///
/// The same boundary traced in opposite directions is still the same
/// boundary, so the lexicographically smaller of the forward and reversed
/// integer sequences is used.
fn segment_key(segment: &ExtractedSegment) -> Vec<(i64, i64)> {
    let forward: Vec<(i64, i64)> = segment
        .line
        .0
        .iter()
        .map(|c| {
            let r = geometry::round_coord(*c, geometry::DEFAULT_PRECISION);
            ((r.x * KEY_SCALE).round() as i64, (r.y * KEY_SCALE).round() as i64)
        })
        .collect();

    let mut reversed = forward.clone();
    reversed.reverse();

    if reversed < forward { reversed } else { forward }
}

/// Collapse geometrically coincident segments to their highest-priority source
///
/// The surviving segment's `all_sources` becomes the union of every group
/// member's types with the winner first, `deduplicated` is set and
/// `merged_source_count` records the group size. Idempotent: deduplicating an
/// already-deduplicated set is a no-op.
pub fn dedupe(segments: Vec<ExtractedSegment>) -> Vec<ExtractedSegment> {
    let mut groups: Vec<Vec<ExtractedSegment>> = Vec::new();
    let mut index: HashMap<Vec<(i64, i64)>, usize> = HashMap::new();

    for segment in segments {
        let key = segment_key(&segment);
        match index.get(&key) {
            Some(&i) => groups[i].push(segment),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![segment]);
            }
        }
    }

    let mut result = Vec::with_capacity(groups.len());
    for group in groups {
        if group.len() == 1 {
            result.extend(group);
            continue;
        }

        let group_size = group.len();
        let winner_index = group
            .iter()
            .enumerate()
            .min_by_key(|(i, s)| (source_rank(&s.primary_source), *i))
            .map(|(i, _)| i)
            .unwrap_or(0);

        let mut sources = Vec::new();
        for segment in &group {
            for source in &segment.all_sources {
                if !sources.contains(source) {
                    sources.push(source.clone());
                }
            }
        }

        let mut winner = group.into_iter().nth(winner_index).unwrap_or_else(|| {
            unreachable!("non-empty group")
        });

        // Winner's type leads, the rest follow in encounter order
        sources.retain(|s| *s != winner.primary_source);
        winner.all_sources.clear();
        winner.all_sources.push(winner.primary_source.clone());
        winner.all_sources.extend(sources);
        winner.deduplicated = true;
        winner.merged_source_count = group_size;

        tracing::debug!(
            primary = %winner.primary_source,
            merged = group_size,
            "Collapsed coincident segments"
        );
        result.push(winner);
    }

    result
}
