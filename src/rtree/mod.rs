//! Packed, Flatbush-compatible R-tree for rectangle queries.

mod builder;
mod layout;
mod tree;

pub use builder::{DEFAULT_NODE_SIZE, RTreeBuilder};
pub use tree::RTree;

use crate::coord::{BBox, Coord};
use crate::error::Result;
use crate::sort::SortMethod;

impl<T: Coord> RTree<T> {
    /// One-shot convenience constructor over an interleaved
    /// `[minx, miny, maxx, maxy, ...]` array, matching the source
    /// ecosystem's `from_interleaved` wrapper around the builder.
    ///
    /// # Errors
    /// Propagates [`RTreeBuilder::add_interleaved`] and
    /// [`RTreeBuilder::finish`] errors.
    pub fn from_interleaved(boxes: &[T], node_size: u16, method: SortMethod) -> Result<Self> {
        let num_items = boxes.len() / 4;
        let mut builder = RTreeBuilder::with_node_size(num_items, node_size)?;
        builder.add_interleaved(boxes)?;
        builder.finish(method)
    }

    /// One-shot convenience constructor over four parallel coordinate
    /// arrays, matching the source ecosystem's `from_separated` wrapper.
    ///
    /// # Errors
    /// Propagates [`RTreeBuilder::add_separated`] and
    /// [`RTreeBuilder::finish`] errors.
    pub fn from_separated(
        min_x: &[T],
        min_y: &[T],
        max_x: &[T],
        max_y: &[T],
        node_size: u16,
        method: SortMethod,
    ) -> Result<Self> {
        let mut builder = RTreeBuilder::with_node_size(min_x.len(), node_size)?;
        builder.add_separated(min_x, min_y, max_x, max_y)?;
        builder.finish(method)
    }
}
