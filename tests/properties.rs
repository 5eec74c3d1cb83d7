//! Property-based tests for the invariants listed as testable properties.

use geopack::coord::BBox;
use geopack::rtree::{RTree, RTreeBuilder};
use geopack::sort::SortMethod;
use proptest::prelude::*;

fn arb_box() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    (0.0..1000.0_f64, 0.0..1000.0_f64, 0.0..50.0_f64, 0.0..50.0_f64).prop_map(
        |(x, y, w, h)| (x, y, x + w, y + h),
    )
}

fn arb_method() -> impl Strategy<Value = SortMethod> {
    prop_oneof![Just(SortMethod::Hilbert), Just(SortMethod::Str)]
}

fn build(boxes: &[(f64, f64, f64, f64)], method: SortMethod) -> RTree<f64> {
    let mut builder = RTreeBuilder::<f64>::new(boxes.len()).unwrap();
    for &(min_x, min_y, max_x, max_y) in boxes {
        builder.add(min_x, min_y, max_x, max_y).unwrap();
    }
    builder.finish(method).unwrap()
}

fn brute_force(boxes: &[(f64, f64, f64, f64)], query: &BBox<f64>) -> Vec<u32> {
    boxes
        .iter()
        .enumerate()
        .filter_map(|(i, &(min_x, min_y, max_x, max_y))| {
            BBox::new(min_x, min_y, max_x, max_y).intersects(query).then_some(i as u32)
        })
        .collect()
}

proptest! {
    #[test]
    fn universe_query_returns_every_index(
        boxes in prop::collection::vec(arb_box(), 0..40),
        method in arb_method(),
    ) {
        let tree = build(&boxes, method);
        let mut hits = tree.search(&BBox::new(f64::MIN, f64::MIN, f64::MAX, f64::MAX));
        hits.sort_unstable();
        let mut expected: Vec<u32> = (0..boxes.len() as u32).collect();
        expected.sort_unstable();
        prop_assert_eq!(hits, expected);
    }

    #[test]
    fn random_query_matches_brute_force(
        boxes in prop::collection::vec(arb_box(), 0..40),
        method in arb_method(),
        query in arb_box(),
    ) {
        let tree = build(&boxes, method);
        let query_box = BBox::new(query.0, query.1, query.2, query.3);
        let mut hits = tree.search(&query_box);
        hits.sort_unstable();
        let mut expected = brute_force(&boxes, &query_box);
        expected.sort_unstable();
        prop_assert_eq!(hits, expected);
    }

    #[test]
    fn buffer_roundtrip_preserves_every_level(
        boxes in prop::collection::vec(arb_box(), 0..40),
        method in arb_method(),
    ) {
        let tree = build(&boxes, method);
        let restored = RTree::<f64>::from_buffer(tree.to_buffer()).unwrap();
        prop_assert_eq!(restored.num_items(), tree.num_items());
        prop_assert_eq!(restored.num_levels(), tree.num_levels());
        for level in 0..tree.num_levels() {
            prop_assert_eq!(restored.boxes_at_level(level), tree.boxes_at_level(level));
        }
    }

    #[test]
    fn first_byte_is_always_magic(
        boxes in prop::collection::vec(arb_box(), 0..10),
        method in arb_method(),
    ) {
        let tree = build(&boxes, method);
        prop_assert_eq!(tree.as_bytes()[0], 0xFB);
    }

    #[test]
    fn num_bytes_matches_exposed_view(
        boxes in prop::collection::vec(arb_box(), 0..10),
        method in arb_method(),
    ) {
        let tree = build(&boxes, method);
        prop_assert_eq!(tree.num_bytes(), tree.as_bytes().len());
    }

    #[test]
    fn join_matches_brute_force_cartesian_intersection(
        boxes_a in prop::collection::vec(arb_box(), 0..20),
        boxes_b in prop::collection::vec(arb_box(), 0..20),
    ) {
        let tree_a = build(&boxes_a, SortMethod::Hilbert);
        let tree_b = build(&boxes_b, SortMethod::Str);
        let mut joined = tree_a.join(&tree_b);
        joined.sort_unstable();

        let mut brute = Vec::new();
        for (i, &(ax0, ay0, ax1, ay1)) in boxes_a.iter().enumerate() {
            for (j, &(bx0, by0, bx1, by1)) in boxes_b.iter().enumerate() {
                let a = BBox::new(ax0, ay0, ax1, ay1);
                let b = BBox::new(bx0, by0, bx1, by1);
                if a.intersects(&b) {
                    brute.push((i as u32, j as u32));
                }
            }
        }
        brute.sort_unstable();
        prop_assert_eq!(joined, brute);
    }

    #[test]
    fn partition_view_covers_every_item_exactly_once(
        boxes in prop::collection::vec(arb_box(), 1..40),
    ) {
        let tree = build(&boxes, SortMethod::Hilbert);
        let view = tree.partitions();
        let mut seen = view.indices.clone();
        seen.sort_unstable();
        let expected: Vec<u32> = (0..boxes.len() as u32).collect();
        prop_assert_eq!(seen, expected);

        let mut ids: Vec<u32> = view.partition_id.clone();
        ids.sort_unstable();
        ids.dedup();
        let contiguous: Vec<u32> = (0..ids.len() as u32).collect();
        prop_assert_eq!(ids, contiguous);
    }
}
