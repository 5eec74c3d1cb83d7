//! `RTreeBuilder`: mutable transient state for bulk-loading a packed R-tree.

use std::marker::PhantomData;

use crate::buffer::IndexBuffer;
use crate::coord::{BBox, Coord, validate_box};
use crate::error::{GeoIndexError, Result};
use crate::sort::{SortMethod, sort_order};

use super::layout;
use super::tree::RTree;

/// Default fanout when none is given, matching the Flatbush default.
pub const DEFAULT_NODE_SIZE: u16 = 16;

/// Bulk-load builder for a packed R-tree over `num_items` boxes of
/// coordinate type `T`.
#[derive(Debug)]
pub struct RTreeBuilder<T: Coord> {
    capacity: usize,
    node_size: u16,
    partitions: Option<usize>,
    boxes: Vec<BBox<T>>,
    finished: bool,
    _marker: PhantomData<T>,
}

impl<T: Coord> RTreeBuilder<T> {
    /// Creates a builder for exactly `num_items` boxes with the default
    /// node size.
    ///
    /// # Errors
    /// Returns [`GeoIndexError::InvalidCapacity`] if `num_items` exceeds
    /// `u32::MAX` (the on-wire header's `num_items` field width).
    pub fn new(num_items: usize) -> Result<Self> {
        Self::with_node_size(num_items, DEFAULT_NODE_SIZE)
    }

    /// Creates a builder with an explicit node size (permitted range
    /// `2..=65535`).
    ///
    /// # Errors
    /// Returns [`GeoIndexError::InvalidCapacity`] if `node_size` is outside
    /// `2..=65535` or `num_items` exceeds `u32::MAX`.
    pub fn with_node_size(num_items: usize, node_size: u16) -> Result<Self> {
        if !(2..=65535).contains(&node_size) {
            return Err(GeoIndexError::InvalidCapacity { node_size: node_size as usize });
        }
        if num_items > u32::MAX as usize {
            // num_items overflowing the header's u32 field is the unsigned
            // analogue of a negative item count; InvalidCapacity is the
            // closed error list's home for both.
            return Err(GeoIndexError::InvalidCapacity { node_size: num_items });
        }
        Ok(Self {
            capacity: num_items,
            node_size,
            partitions: None,
            boxes: Vec::with_capacity(num_items),
            finished: false,
            _marker: PhantomData,
        })
    }

    /// Overrides the partition-view grouping capacity. Does not affect the
    /// tree's internal fanout, only `Tree::partitions()`.
    #[must_use]
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = Some(partitions);
        self
    }

    /// Appends one box. May be called repeatedly; the total added across
    /// all calls must equal the declared capacity before [`Self::finish`].
    ///
    /// # Errors
    /// Returns [`GeoIndexError::AlreadyFinished`] if called after
    /// `finish`, [`GeoIndexError::InvalidBox`] if the box is inverted or
    /// NaN, or [`GeoIndexError::CountMismatch`] if this call would exceed
    /// the declared capacity.
    pub fn add(&mut self, min_x: T, min_y: T, max_x: T, max_y: T) -> Result<()> {
        if self.finished {
            return Err(GeoIndexError::AlreadyFinished);
        }
        validate_box(min_x, min_y, max_x, max_y)?;
        if self.boxes.len() >= self.capacity {
            return Err(GeoIndexError::CountMismatch {
                expected: self.capacity,
                actual: self.boxes.len() + 1,
            });
        }
        self.boxes.push(BBox::new(min_x, min_y, max_x, max_y));
        Ok(())
    }

    /// Appends boxes from an interleaved `[minx, miny, maxx, maxy, ...]`
    /// array of length `4 * n`.
    ///
    /// # Errors
    /// Returns [`GeoIndexError::TypeMismatch`] if the slice length is not a
    /// multiple of four, and otherwise propagates [`Self::add`]'s errors.
    pub fn add_interleaved(&mut self, boxes: &[T]) -> Result<()> {
        if boxes.len() % 4 != 0 {
            return Err(GeoIndexError::TypeMismatch {
                reason: "interleaved box array length must be a multiple of 4",
            });
        }
        for chunk in boxes.chunks_exact(4) {
            self.add(chunk[0], chunk[1], chunk[2], chunk[3])?;
        }
        Ok(())
    }

    /// Appends boxes from four parallel arrays of equal length.
    ///
    /// # Errors
    /// Returns [`GeoIndexError::TypeMismatch`] if the four arrays disagree
    /// in length, and otherwise propagates [`Self::add`]'s errors.
    pub fn add_separated(&mut self, min_x: &[T], min_y: &[T], max_x: &[T], max_y: &[T]) -> Result<()> {
        let n = min_x.len();
        if min_y.len() != n || max_x.len() != n || max_y.len() != n {
            return Err(GeoIndexError::TypeMismatch {
                reason: "separated coordinate arrays must share one length",
            });
        }
        for i in 0..n {
            self.add(min_x[i], min_y[i], max_x[i], max_y[i])?;
        }
        Ok(())
    }

    /// Consumes the builder, sorts items by `method`, packs leaves and
    /// parent levels, and serializes the result into an immutable
    /// [`RTree`].
    ///
    /// # Errors
    /// Returns [`GeoIndexError::CountMismatch`] if fewer items were added
    /// than declared, or [`GeoIndexError::AlreadyFinished`] if already
    /// finished.
    pub fn finish(mut self, method: SortMethod) -> Result<RTree<T>> {
        if self.finished {
            return Err(GeoIndexError::AlreadyFinished);
        }
        if self.boxes.len() != self.capacity {
            return Err(GeoIndexError::CountMismatch {
                expected: self.capacity,
                actual: self.boxes.len(),
            });
        }
        self.finished = true;

        let partition_capacity = self.partitions.unwrap_or(self.node_size as usize);

        if self.capacity == 0 {
            log::debug!("finishing empty builder: emitting sentinel root");
            return build_buffer::<T>(&[BBox::empty()], &[0], vec![1], 0, self.node_size, partition_capacity);
        }

        let order = sort_order(&self.boxes, method, self.node_size as usize);
        let leaf_boxes: Vec<BBox<T>> = order.iter().map(|&i| self.boxes[i as usize]).collect();

        let (node_boxes, node_indices, bounds) =
            pack_levels(leaf_boxes, order, self.node_size as usize);

        log::debug!(
            "built r-tree: {} items, node_size {}, {} levels, method {method:?}",
            self.capacity,
            self.node_size,
            bounds.len()
        );
        log::trace!("level bounds: {bounds:?}");

        build_buffer::<T>(
            &node_boxes,
            &node_indices,
            bounds,
            self.capacity,
            self.node_size,
            partition_capacity,
        )
    }
}

/// Packs a leaf level plus every parent level above it, returning the full
/// node-boxes array, the parallel `indices` array, and the level bounds.
fn pack_levels<T: Coord>(
    leaf_boxes: Vec<BBox<T>>,
    leaf_indices: Vec<u32>,
    node_size: usize,
) -> (Vec<BBox<T>>, Vec<u32>, Vec<usize>) {
    let mut node_boxes = leaf_boxes;
    let mut node_indices = leaf_indices;
    let mut bounds = vec![node_boxes.len()];
    let mut cur_start = 0usize;
    let mut cur_end = node_boxes.len();

    // A level is always built at least once, even when there's only a
    // single leaf: its "parent" is a separate root entry that happens to
    // carry the same box, not the leaf doubling as the root in place.
    loop {
        let mut pos = cur_start;
        while pos < cur_end {
            let chunk_end = (pos + node_size).min(cur_end);
            let mut union = node_boxes[pos];
            for sibling in node_boxes.iter().take(chunk_end).skip(pos + 1) {
                union = union.union(sibling);
            }
            node_boxes.push(union);
            node_indices.push(pos as u32);
            pos = chunk_end;
        }
        cur_start = cur_end;
        cur_end = node_boxes.len();
        bounds.push(cur_end);
        if cur_end - cur_start == 1 {
            break;
        }
    }

    (node_boxes, node_indices, bounds)
}

fn build_buffer<T: Coord>(
    node_boxes: &[BBox<T>],
    node_indices: &[u32],
    level_bounds: Vec<usize>,
    num_items: usize,
    node_size: u16,
    partition_capacity: usize,
) -> Result<RTree<T>> {
    let num_nodes = node_boxes.len();
    let total = layout::total_len::<T>(num_nodes);
    let mut buf = vec![0u8; total];
    layout::write_header(&mut buf, T::CODE, node_size, num_items as u32);
    for (i, b) in node_boxes.iter().enumerate() {
        // SAFETY: `i < num_nodes` and `buf` was sized by `total_len` above.
        unsafe { layout::write_box(&mut buf, i, *b) };
    }
    for (i, &idx) in node_indices.iter().enumerate() {
        layout::write_index::<T>(&mut buf, num_nodes, i, idx);
    }

    Ok(RTree::from_parts(
        IndexBuffer::from(buf),
        level_bounds,
        node_size as usize,
        num_items,
        partition_capacity,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_node_size_outside_range() {
        assert!(RTreeBuilder::<f64>::with_node_size(1, 1).is_err());
        assert!(RTreeBuilder::<f64>::with_node_size(1, 2).is_ok());
    }

    #[test]
    fn add_beyond_capacity_is_count_mismatch() {
        let mut b = RTreeBuilder::<f64>::new(1).unwrap();
        b.add(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!(matches!(b.add(0.0, 0.0, 1.0, 1.0), Err(GeoIndexError::CountMismatch { .. })));
    }

    #[test]
    fn finish_before_capacity_reached_is_count_mismatch() {
        let mut b = RTreeBuilder::<f64>::new(2).unwrap();
        b.add(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!(matches!(b.finish(SortMethod::Hilbert), Err(GeoIndexError::CountMismatch { .. })));
    }

    #[test]
    fn empty_builder_finishes_to_a_sentinel_root() {
        let b = RTreeBuilder::<f64>::new(0).unwrap();
        let tree = b.finish(SortMethod::Hilbert).unwrap();
        assert_eq!(tree.num_items(), 0);
        assert_eq!(tree.num_levels(), 1);
    }
}
