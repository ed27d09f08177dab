// crates/loadgrid-core/tests/proptest_segments.rs
// ============================================================================
// Module: Segment Partitioner Property-Based Tests
// Description: Tiling and ordering properties of assigned segments.
// Purpose: Show segments cover [0, 1) exactly once for any worker split.
// ============================================================================

//! Property-based tests for the segment partitioner.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use loadgrid_core::LocationName;
use loadgrid_core::RunName;
use loadgrid_core::RunParams;
use loadgrid_core::RunRecord;
use loadgrid_core::Timestamp;
use loadgrid_core::assigned_segments;
use loadgrid_core::run_boundaries;
use proptest::prelude::*;

fn rendered(segments: &[loadgrid_core::Segment]) -> Vec<[String; 2]> {
    segments.iter().map(loadgrid_core::Segment::as_pair).collect()
}

#[test]
fn two_locations_split_three_workers_in_insertion_order() {
    let params =
        RunParams::new("https://example.com").with_location("l1", 2).with_location("l2", 1);
    let record =
        RunRecord::draft(RunName::new("run"), params, Timestamp::from_unix_seconds(0).unwrap());
    let first = record.segments_for(&LocationName::new("l1")).unwrap();
    let second = record.segments_for(&LocationName::new("l2")).unwrap();
    assert_eq!(
        rendered(&first),
        vec![["0".to_string(), "1/3".to_string()], ["1/3".to_string(), "2/3".to_string()]]
    );
    assert_eq!(rendered(&second), vec![["2/3".to_string(), "1".to_string()]]);
    assert_eq!(second[0].segment_id, 3);
    assert!(record.segments_for(&LocationName::new("l3")).is_none());
}

#[test]
fn single_worker_owns_whole_space() {
    let segments = assigned_segments(&[1], 0);
    assert_eq!(rendered(&segments), vec![["0".to_string(), "1".to_string()]]);
}

proptest! {
    #[test]
    fn segments_tile_the_unit_interval(counts in prop::collection::vec(1u32..=40, 1..8)) {
        let total: u64 = counts.iter().map(|count| u64::from(*count)).sum();
        let mut tokens = vec!["0".to_string()];
        let mut next_id = 1;
        for position in 0..counts.len() {
            let segments = assigned_segments(&counts, position);
            prop_assert_eq!(segments.len(), usize::try_from(counts[position]).unwrap());
            for segment in segments {
                prop_assert_eq!(segment.segment_id, next_id);
                prop_assert_eq!(&segment.start.to_string(), tokens.last().unwrap());
                tokens.push(segment.end.to_string());
                next_id += 1;
            }
        }
        let expected: Vec<String> = run_boundaries(total).iter().map(ToString::to_string).collect();
        prop_assert_eq!(tokens, expected);
    }

    #[test]
    fn boundaries_are_unreduced(total in 2u64..500, index in 1u64..499) {
        prop_assume!(index < total);
        let tokens = run_boundaries(total);
        let token = tokens[usize::try_from(index).unwrap()].to_string();
        prop_assert_eq!(token, format!("{index}/{total}"));
    }
}
