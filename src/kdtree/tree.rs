//! `KdTree`: the immutable, queryable packed KD-tree.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::IndexBuffer;
use crate::coord::KdCoord;
use crate::error::{GeoIndexError, Result};

use super::layout;

/// An immutable, bulk-loaded packed KD-tree over points of coordinate
/// type `T`. Built by [`super::builder::KdBuilder`] or recovered from a
/// foreign buffer via [`KdTree::from_buffer`].
#[derive(Debug)]
pub struct KdTree<T: KdCoord> {
    buffer: IndexBuffer,
    num_items: usize,
    _marker: PhantomData<T>,
}

impl<T: KdCoord> KdTree<T> {
    pub(crate) fn from_parts(buffer: IndexBuffer, num_items: usize) -> Self {
        Self { buffer, num_items, _marker: PhantomData }
    }

    /// Number of points the tree was built over.
    #[must_use]
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Length, in bytes, of the serialized buffer.
    #[must_use]
    pub fn num_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Borrows the raw serialized bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Copies out the serialized buffer.
    #[must_use]
    pub fn to_buffer(&self) -> Vec<u8> {
        self.buffer.as_slice().to_vec()
    }

    /// Produces a reference-counted handle over the serialized bytes.
    #[must_use]
    pub fn to_shared_buffer(&self) -> Arc<[u8]> {
        self.buffer.to_shared()
    }

    /// Reconstitutes a tree from a foreign buffer, validating the header
    /// and its implied length before trusting any of it.
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
        let expected = layout::total_len::<T>(num_items);
        if bytes.len() < expected {
            log::warn!("rejecting kd-tree buffer: expected at least {expected} bytes, found {}", bytes.len());
            return Err(GeoIndexError::Truncated { expected, found: bytes.len() });
        }
        Ok(Self::from_parts(buffer, num_items))
    }

    fn point(&self, pos: usize) -> (T, T) {
        // SAFETY: `pos` is always bounded by `self.num_items`, matching how
        // the buffer was sized.
        unsafe { layout::read_point(self.as_bytes(), pos) }
    }

    fn original_index(&self, pos: usize) -> u32 {
        layout::read_index::<T>(self.as_bytes(), self.num_items, pos)
    }

    /// Returns the original-input indices of points inside the axis-aligned
    /// box `[min_x, max_x] x [min_y, max_y]` (inclusive).
    #[must_use]
    pub fn range(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<u32> {
        let mut results = Vec::new();
        if self.num_items == 0 {
            return results;
        }
        let mut stack = vec![(0usize, self.num_items, 0usize)];
        while let Some((lo, hi, depth)) = stack.pop() {
            if lo >= hi {
                continue;
            }
            let mid = lo + (hi - lo) / 2;
            let (x, y) = self.point(mid);
            let (xf, yf) = (x.to_f64(), y.to_f64());
            if xf >= min_x && xf <= max_x && yf >= min_y && yf <= max_y {
                results.push(self.original_index(mid));
            }
            let axis_is_x = depth % 2 == 0;
            let split = if axis_is_x { xf } else { yf };
            let (query_min, query_max) = if axis_is_x { (min_x, max_x) } else { (min_y, max_y) };
            if query_min <= split {
                stack.push((lo, mid, depth + 1));
            }
            if query_max >= split {
                stack.push((mid + 1, hi, depth + 1));
            }
        }
        results
    }

    /// Returns the original-input indices of points within Euclidean
    /// distance `radius` of `(x, y)`.
    #[must_use]
    pub fn within(&self, x: f64, y: f64, radius: f64) -> Vec<u32> {
        let mut results = Vec::new();
        if self.num_items == 0 {
            return results;
        }
        let radius_sq = radius * radius;
        let mut stack = vec![(0usize, self.num_items, 0usize)];
        while let Some((lo, hi, depth)) = stack.pop() {
            if lo >= hi {
                continue;
            }
            let mid = lo + (hi - lo) / 2;
            let (px, py) = self.point(mid);
            let (pxf, pyf) = (px.to_f64(), py.to_f64());
            let dx = pxf - x;
            let dy = pyf - y;
            if dx * dx + dy * dy <= radius_sq {
                results.push(self.original_index(mid));
            }
            let axis_is_x = depth % 2 == 0;
            let split = if axis_is_x { pxf } else { pyf };
            let query_val = if axis_is_x { x } else { y };
            if query_val - radius <= split {
                stack.push((lo, mid, depth + 1));
            }
            if query_val + radius >= split {
                stack.push((mid + 1, hi, depth + 1));
            }
        }
        results
    }
}
