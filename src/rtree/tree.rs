//! `RTree`: the immutable, queryable packed R-tree.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::IndexBuffer;
use crate::coord::{BBox, Coord};
use crate::error::{GeoIndexError, Result};
use crate::partition::{PartitionView, chunk_partition_ids};

use super::layout;

/// An immutable, bulk-loaded packed R-tree over boxes of coordinate type
/// `T`. Built by [`super::builder::RTreeBuilder`] or recovered from a
/// foreign buffer via [`RTree::from_buffer`].
#[derive(Debug)]
pub struct RTree<T: Coord> {
    buffer: IndexBuffer,
    level_bounds: Vec<usize>,
    node_size: usize,
    num_items: usize,
    partition_capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: Coord> RTree<T> {
    pub(crate) fn from_parts(
        buffer: IndexBuffer,
        level_bounds: Vec<usize>,
        node_size: usize,
        num_items: usize,
        partition_capacity: usize,
    ) -> Self {
        Self { buffer, level_bounds, node_size, num_items, partition_capacity, _marker: PhantomData }
    }

    /// Number of items the tree was built over.
    #[must_use]
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Number of levels, leaves counted as level 0.
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.level_bounds.len()
    }

    /// Total node count across every level.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        *self.level_bounds.last().unwrap_or(&0)
    }

    /// Length, in bytes, of the serialized buffer.
    #[must_use]
    pub fn num_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Borrows the raw serialized bytes, for zero-copy sharing.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Copies out the serialized buffer.
    #[must_use]
    pub fn to_buffer(&self) -> Vec<u8> {
        self.buffer.as_slice().to_vec()
    }

    /// Produces a reference-counted handle over the serialized bytes,
    /// copying once unless this tree is already buffer-shared.
    #[must_use]
    pub fn to_shared_buffer(&self) -> Arc<[u8]> {
        self.buffer.to_shared()
    }

    /// Reconstitutes a tree from a foreign buffer, validating the header
    /// and every offset it implies before trusting any of it.
    ///
    /// # Errors
    /// Returns [`GeoIndexError::NotFlatbush`] for an unrecognized magic,
    /// version, or coordinate-type nibble, [`GeoIndexError::TypeMismatch`]
    /// if the buffer's stamped coordinate type does not match `T`, and
    /// [`GeoIndexError::Truncated`] if the buffer is shorter than the
    /// header implies.
    pub fn from_buffer(buffer: impl Into<IndexBuffer>) -> Result<Self> {
        let buffer = buffer.into();
        let bytes = buffer.as_slice();
        let header = layout::read_header(bytes)?;
        if header.coord_code != T::CODE {
            return Err(GeoIndexError::TypeMismatch {
                reason: "buffer's coordinate-type code does not match the requested type",
            });
        }
        let num_items = header.num_items as usize;
        let node_size = header.node_size as usize;
        let level_bounds = layout::level_bounds(num_items, node_size);
        let num_nodes = *level_bounds.last().unwrap_or(&0);
        let expected = layout::total_len::<T>(num_nodes);
        if bytes.len() < expected {
            log::warn!("rejecting buffer: expected at least {expected} bytes, found {}", bytes.len());
            return Err(GeoIndexError::Truncated { expected, found: bytes.len() });
        }
        debug_assert!(!level_bounds.is_empty(), "level_bounds always has at least the leaf level");

        let tree = Self::from_parts(buffer, level_bounds, node_size, num_items, node_size);

        if num_nodes > 1 {
            let k = tree.level_bounds.len();
            let child_level_end = tree.level_bounds[k - 2];
            let child_level_start = if k >= 3 { tree.level_bounds[k - 3] } else { 0 };
            let root_idx = num_nodes - 1;
            let mut union = unsafe { layout::read_box::<T>(tree.as_bytes(), child_level_start) };
            for node in (child_level_start + 1)..child_level_end {
                union = union.union(&unsafe { layout::read_box::<T>(tree.as_bytes(), node) });
            }
            let root = unsafe { layout::read_box::<T>(tree.as_bytes(), root_idx) };
            debug_assert_eq!(union, root, "root box must equal the union of the top sub-level");
        }

        Ok(tree)
    }

    /// Returns the box stored at a given node position.
    fn node_box(&self, node: usize) -> BBox<T> {
        // SAFETY: `node` is always produced by traversal logic bounded by
        // `self.num_nodes()`, which matches how the buffer was sized.
        unsafe { layout::read_box(self.as_bytes(), node) }
    }

    fn node_index(&self, node: usize) -> u32 {
        layout::read_index::<T>(self.as_bytes(), self.num_nodes(), node)
    }

    fn is_leaf(&self, node: usize) -> bool {
        node < self.level_bounds[0]
    }

    /// Returns the original-input indices whose box intersects `query`, in
    /// traversal order.
    #[must_use]
    pub fn search(&self, query: &BBox<T>) -> Vec<u32> {
        let mut results = Vec::new();
        if self.num_items == 0 {
            return results;
        }
        let root = self.num_nodes() - 1;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.is_leaf(node) {
                if self.node_box(node).intersects(query) {
                    results.push(self.node_index(node));
                }
                continue;
            }
            let first_child = self.node_index(node) as usize;
            let level_end = self.children_level_end(node);
            let last_child = (first_child + self.node_size).min(level_end);
            for child in first_child..last_child {
                if self.node_box(child).intersects(query) {
                    stack.push(child);
                }
            }
        }
        results
    }

    /// The end (exclusive) of the level containing `first_child`: the
    /// level one below whichever level `node` lives in.
    fn children_level_end(&self, node: usize) -> usize {
        for (level, &end) in self.level_bounds.iter().enumerate().skip(1) {
            let start = self.level_bounds[level - 1];
            if node >= start && node < end {
                return start;
            }
        }
        self.level_bounds[0]
    }

    /// Pairs of original indices `(i, j)` with `box_self[i]` intersecting
    /// `box_other[j]`, via simultaneous dual-tree descent.
    #[must_use]
    pub fn join(&self, other: &Self) -> Vec<(u32, u32)> {
        let mut results = Vec::new();
        if self.num_items == 0 || other.num_items == 0 {
            return results;
        }
        let root_l = self.num_nodes() - 1;
        let root_r = other.num_nodes() - 1;
        let mut stack = vec![(root_l, root_r)];
        while let Some((l, r)) = stack.pop() {
            if !self.node_box(l).intersects(&other.node_box(r)) {
                continue;
            }
            match (self.is_leaf(l), other.is_leaf(r)) {
                (true, true) => results.push((self.node_index(l), other.node_index(r))),
                (true, false) => {
                    for rc in other.children_of(r) {
                        stack.push((l, rc));
                    }
                }
                (false, true) => {
                    for lc in self.children_of(l) {
                        stack.push((lc, r));
                    }
                }
                (false, false) => {
                    for lc in self.children_of(l) {
                        for rc in other.children_of(r) {
                            stack.push((lc, rc));
                        }
                    }
                }
            }
        }
        results
    }

    fn children_of(&self, node: usize) -> std::ops::Range<usize> {
        let first_child = self.node_index(node) as usize;
        let level_end = self.children_level_end(node);
        let last_child = (first_child + self.node_size).min(level_end);
        first_child..last_child
    }

    /// Read-only view of the boxes at a given level (0 = leaves).
    #[must_use]
    pub fn boxes_at_level(&self, level: usize) -> Vec<BBox<T>> {
        if level >= self.level_bounds.len() {
            return Vec::new();
        }
        let start = if level == 0 { 0 } else { self.level_bounds[level - 1] };
        let end = self.level_bounds[level];
        (start..end).map(|n| self.node_box(n)).collect()
    }

    /// The leaf-level (item → partition) view.
    #[must_use]
    pub fn partitions(&self) -> PartitionView {
        let indices: Vec<u32> = (0..self.num_items).map(|n| self.node_index(n)).collect();
        let partition_id = chunk_partition_ids(self.num_items, self.partition_capacity);
        PartitionView { indices, partition_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtree::builder::RTreeBuilder;
    use crate::sort::SortMethod;

    fn build_scenario_s1() -> RTree<f64> {
        let mut b = RTreeBuilder::<f64>::new(5).unwrap();
        for i in 0..5u32 {
            let min = f64::from(i);
            let max = f64::from(i) + 5.0;
            b.add(min, min, max, max).unwrap();
        }
        b.finish(SortMethod::Hilbert).unwrap()
    }

    #[test]
    fn scenario_s1_search() {
        let tree = build_scenario_s1();
        let mut results = tree.search(&BBox::new(0.5, 0.5, 1.5, 1.5));
        results.sort_unstable();
        assert_eq!(results, vec![0, 1], "boxes 0 and 1 intersect the query box");
    }

    #[test]
    fn first_byte_is_magic() {
        let tree = build_scenario_s1();
        assert_eq!(tree.as_bytes()[0], layout::MAGIC);
    }

    #[test]
    fn num_bytes_matches_exposed_view() {
        let tree = build_scenario_s1();
        assert_eq!(tree.num_bytes(), tree.as_bytes().len());
    }

    #[test]
    fn buffer_roundtrips() {
        let tree = build_scenario_s1();
        let bytes = tree.to_buffer();
        let restored = RTree::<f64>::from_buffer(bytes).unwrap();
        assert_eq!(restored.num_items(), tree.num_items());
        assert_eq!(restored.boxes_at_level(0), tree.boxes_at_level(0));
        assert_eq!(restored.search(&BBox::new(0.5, 0.5, 1.5, 1.5)), tree.search(&BBox::new(0.5, 0.5, 1.5, 1.5)));
    }

    #[test]
    fn garbage_buffer_is_not_flatbush() {
        let err = RTree::<f64>::from_buffer(b"Hello world".to_vec()).unwrap_err();
        assert!(matches!(err, GeoIndexError::NotFlatbush));
    }

    #[test]
    fn empty_tree_search_is_empty() {
        let b = RTreeBuilder::<f64>::new(0).unwrap();
        let tree = b.finish(SortMethod::Hilbert).unwrap();
        assert!(tree.search(&BBox::new(0.0, 0.0, 1.0, 1.0)).is_empty());
    }

    #[test]
    fn universe_query_returns_every_item() {
        let tree = build_scenario_s1();
        let mut results = tree.search(&BBox::new(f64::MIN, f64::MIN, f64::MAX, f64::MAX));
        results.sort_unstable();
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn partitions_view_with_explicit_capacity() {
        let mut b = RTreeBuilder::<f64>::new(5).unwrap().with_partitions(2);
        for i in 0..5u32 {
            let v = f64::from(i);
            b.add(v, v, v + 1.0, v + 1.0).unwrap();
        }
        let tree = b.finish(SortMethod::Hilbert).unwrap();
        let view = tree.partitions();
        assert_eq!(view.num_partitions(), 3, "ceil(5/2) = 3 partitions");
    }

    #[test]
    fn join_matches_brute_force() {
        let tree_a = build_scenario_s1();
        let tree_b = build_scenario_s1();
        let joined = tree_a.join(&tree_b);

        let boxes_a = tree_a.boxes_at_level(0);
        let boxes_b = tree_b.boxes_at_level(0);
        let idx_a: Vec<u32> = (0..tree_a.num_items).map(|n| tree_a.node_index(n)).collect();
        let idx_b: Vec<u32> = (0..tree_b.num_items).map(|n| tree_b.node_index(n)).collect();

        let mut brute: Vec<(u32, u32)> = Vec::new();
        for (pa, ba) in boxes_a.iter().enumerate() {
            for (pb, bb) in boxes_b.iter().enumerate() {
                if ba.intersects(bb) {
                    brute.push((idx_a[pa], idx_b[pb]));
                }
            }
        }

        let mut joined_sorted = joined.clone();
        joined_sorted.sort_unstable();
        let mut brute_sorted = brute.clone();
        brute_sorted.sort_unstable();
        assert_eq!(joined_sorted, brute_sorted);
    }
}
