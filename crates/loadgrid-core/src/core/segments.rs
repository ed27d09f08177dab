// crates/loadgrid-core/src/core/segments.rs
// ============================================================================
// Module: Loadgrid Segment Partitioner
// Description: Contiguous fractional workload segments for workers.
// Purpose: Split [0, 1) across every worker of a run without coordination.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A run with `T` workers divides the virtual workload space `[0, 1)` into
//! `T` equal slices. Workers are numbered in job insertion order, so a job
//! preceded by `P` workers owns slices `P..P+N`. Boundaries are rendered as
//! unreduced fractions (`"2/6"`, never `"1/3"`) with `"0"` and `"1"` at the
//! ends, which is the execution-segment syntax load generators expect.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde::Serializer;

// ============================================================================
// SECTION: Boundaries
// ============================================================================

/// Boundary token `index / total` inside the workload space.
///
/// # Invariants
/// - `index <= total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentBoundary {
    /// Worker ordinal of the boundary.
    pub index: u64,
    /// Total workers across the run.
    pub total: u64,
}

impl SegmentBoundary {
    /// Creates a boundary token.
    #[must_use]
    pub const fn new(index: u64, total: u64) -> Self {
        Self {
            index,
            total,
        }
    }
}

impl fmt::Display for SegmentBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 0 {
            f.write_str("0")
        } else if self.index == self.total {
            f.write_str("1")
        } else {
            write!(f, "{}/{}", self.index, self.total)
        }
    }
}

impl Serialize for SegmentBoundary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// SECTION: Segments
// ============================================================================

/// Half-open workload slice assigned to exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Segment {
    /// 1-based worker ordinal across the whole run.
    pub segment_id: u64,
    /// Inclusive lower boundary.
    pub start: SegmentBoundary,
    /// Exclusive upper boundary.
    pub end: SegmentBoundary,
}

impl Segment {
    /// Returns the boundary pair as strings.
    #[must_use]
    pub fn as_pair(&self) -> [String; 2] {
        [self.start.to_string(), self.end.to_string()]
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Returns every boundary of a run with `total` workers: `0, 1/T, ..., 1`.
///
/// A run without workers has no boundaries.
#[must_use]
pub fn run_boundaries(total: u64) -> Vec<SegmentBoundary> {
    if total == 0 {
        return Vec::new();
    }
    (0..=total).map(|index| SegmentBoundary::new(index, total)).collect()
}

/// Computes the segments owned by the job at `position`.
///
/// `worker_counts` lists `num_workers` of every job of the run in insertion
/// order. Out-of-range positions and runs without workers yield no segments.
#[must_use]
pub fn assigned_segments(worker_counts: &[u32], position: usize) -> Vec<Segment> {
    let Some(own) = worker_counts.get(position) else {
        return Vec::new();
    };
    let total: u64 = worker_counts.iter().map(|count| u64::from(*count)).sum();
    let preceding: u64 = worker_counts[..position].iter().map(|count| u64::from(*count)).sum();
    (preceding..preceding + u64::from(*own))
        .map(|index| Segment {
            segment_id: index + 1,
            start: SegmentBoundary::new(index, total),
            end: SegmentBoundary::new(index + 1, total),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_tokens_are_unreduced() {
        assert_eq!(SegmentBoundary::new(0, 6).to_string(), "0");
        assert_eq!(SegmentBoundary::new(2, 6).to_string(), "2/6");
        assert_eq!(SegmentBoundary::new(6, 6).to_string(), "1");
    }

    #[test]
    fn run_boundaries_cover_unit_interval() {
        let rendered: Vec<String> = run_boundaries(3).iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["0", "1/3", "2/3", "1"]);
        assert!(run_boundaries(0).is_empty());
    }

    #[test]
    fn out_of_range_position_has_no_segments() {
        assert!(assigned_segments(&[2, 1], 2).is_empty());
        assert!(assigned_segments(&[], 0).is_empty());
    }

    #[test]
    fn segment_renders_wire_form() {
        let segments = assigned_segments(&[1, 2], 1);
        let rendered: Vec<String> = segments.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["1/3:2/3", "2/3:1"]);
        assert_eq!(segments[0].segment_id, 2);
    }
}
