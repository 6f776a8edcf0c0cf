//! Property tests for the chunk splitter.
//!
//! Uses proptest to verify, for arbitrary lists with duplicates:
//! 1. Coverage: the union of chunks equals the deduplicated input
//! 2. Disjointness: no identifier appears in two chunks
//! 3. Bounded count: never more than `max_chunks` chunks
//! 4. Order: concatenated chunks reproduce first-occurrence order

use equicast_core::splitter::{dedup_preserving_order, plan_chunks, Splitter};
use equicast_core::{Mode, Ticker};
use proptest::prelude::*;
use std::collections::HashSet;

// ── Strategies ───────────────────────────────────────────────────────

fn arb_symbols() -> impl Strategy<Value = Vec<String>> {
    // Small alphabet so duplicates are common.
    prop::collection::vec("[A-E]{1,2}", 0..400)
}

proptest! {
    #[test]
    fn union_equals_unique_input(
        symbols in arb_symbols(),
        size in 1usize..50,
        max_chunks in 1usize..40,
    ) {
        let plan = plan_chunks(symbols.clone(), size, max_chunks).unwrap();

        let expected: HashSet<String> = symbols.into_iter().collect();
        let actual: HashSet<String> = plan.chunks.iter().flatten().cloned().collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn chunks_are_disjoint(
        symbols in arb_symbols(),
        size in 1usize..50,
        max_chunks in 1usize..40,
    ) {
        let plan = plan_chunks(symbols, size, max_chunks).unwrap();

        let total: usize = plan.chunks.iter().map(Vec::len).sum();
        let distinct: HashSet<&String> = plan.chunks.iter().flatten().collect();
        prop_assert_eq!(total, distinct.len());
        prop_assert_eq!(total, plan.unique_count);
    }

    #[test]
    fn chunk_count_is_bounded(
        symbols in arb_symbols(),
        size in 1usize..50,
        max_chunks in 1usize..40,
    ) {
        let plan = plan_chunks(symbols, size, max_chunks).unwrap();

        prop_assert!(plan.chunks.len() <= max_chunks);
        prop_assert!(plan.chunks.iter().all(|c| !c.is_empty() && c.len() <= plan.chunk_size));
        prop_assert!(plan.chunk_size >= size);
        prop_assert_eq!(plan.capped, plan.chunk_size > size);
    }

    #[test]
    fn concatenation_preserves_first_occurrence_order(
        symbols in arb_symbols(),
        size in 1usize..50,
    ) {
        let plan = plan_chunks(symbols.clone(), size, 256).unwrap();
        let flattened: Vec<String> = plan.chunks.into_iter().flatten().collect();
        prop_assert_eq!(flattened, dedup_preserving_order(symbols));
    }
}

#[test]
fn split_to_disk_matches_in_memory_plan() {
    let dir = tempfile::tempdir().unwrap();
    let tickers: Vec<Ticker> = (0..600).map(|i| Ticker::new(format!("T{i}"))).collect();

    let output = Splitter::new(Mode::Stock, dir.path(), 1)
        .with_max_chunks(10)
        .split_items(tickers)
        .unwrap();

    assert!(output.capped);
    assert_eq!(output.chunk_size, 60);
    assert_eq!(output.chunk_files.len(), 10);

    let manifest: Vec<usize> =
        serde_json::from_str(&std::fs::read_to_string(&output.manifest_path).unwrap()).unwrap();
    assert_eq!(manifest, (1..=10).collect::<Vec<_>>());
}
