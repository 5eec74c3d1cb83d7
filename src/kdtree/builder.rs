//! `KdBuilder`: mutable transient state for bulk-loading a packed KD-tree.

use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::buffer::IndexBuffer;
use crate::coord::KdCoord;
use crate::error::{GeoIndexError, Result};

use super::layout;
use super::tree::KdTree;

/// Bulk-load builder for a packed KD-tree over `num_items` points of
/// coordinate type `T`.
#[derive(Debug)]
pub struct KdBuilder<T: KdCoord> {
    capacity: usize,
    xs: Vec<T>,
    ys: Vec<T>,
    finished: bool,
    _marker: PhantomData<T>,
}

impl<T: KdCoord> KdBuilder<T> {
    /// Creates a builder for exactly `num_items` points.
    ///
    /// # Errors
    /// Returns [`GeoIndexError::InvalidCapacity`] if `num_items` exceeds
    /// `u32::MAX` (the on-wire header's `num_items` field width).
    pub fn new(num_items: usize) -> Result<Self> {
        if num_items > u32::MAX as usize {
            return Err(GeoIndexError::InvalidCapacity { node_size: num_items });
        }
        Ok(Self {
            capacity: num_items,
            xs: Vec::with_capacity(num_items),
            ys: Vec::with_capacity(num_items),
            finished: false,
            _marker: PhantomData,
        })
    }

    /// Appends one point. May be called repeatedly; the total added must
    /// equal the declared capacity before [`Self::finish`].
    ///
    /// # Errors
    /// Returns [`GeoIndexError::AlreadyFinished`] if called after
    /// `finish`, [`GeoIndexError::InvalidBox`] if `x` or `y` is NaN, or
    /// [`GeoIndexError::CountMismatch`] if this call would exceed the
    /// declared capacity.
    pub fn add(&mut self, x: T, y: T) -> Result<()> {
        if self.finished {
            return Err(GeoIndexError::AlreadyFinished);
        }
        if x.is_nan() || y.is_nan() {
            return Err(GeoIndexError::InvalidBox {
                min_x: x.to_f64(),
                min_y: y.to_f64(),
                max_x: x.to_f64(),
                max_y: y.to_f64(),
            });
        }
        if self.xs.len() >= self.capacity {
            return Err(GeoIndexError::CountMismatch {
                expected: self.capacity,
                actual: self.xs.len() + 1,
            });
        }
        self.xs.push(x);
        self.ys.push(y);
        Ok(())
    }

    /// Consumes the builder, recursively median-partitions the points, and
    /// serializes the result into an immutable [`KdTree`].
    ///
    /// # Errors
    /// Returns [`GeoIndexError::CountMismatch`] if fewer items were added
    /// than declared, or [`GeoIndexError::AlreadyFinished`] if already
    /// finished.
    pub fn finish(mut self) -> Result<KdTree<T>> {
        if self.finished {
            return Err(GeoIndexError::AlreadyFinished);
        }
        if self.xs.len() != self.capacity {
            return Err(GeoIndexError::CountMismatch {
                expected: self.capacity,
                actual: self.xs.len(),
            });
        }
        self.finished = true;

        let num_items = self.capacity;
        let mut perm: Vec<u32> = (0..num_items as u32).collect();
        partition(&mut perm, &self.xs, &self.ys, 0);

        log::debug!("built kd-tree: {num_items} points");

        let total = layout::total_len::<T>(num_items);
        let mut buf = vec![0u8; total];
        layout::write_header(&mut buf, T::CODE, num_items as u32);
        for (pos, &orig) in perm.iter().enumerate() {
            // SAFETY: `pos < num_items` and `buf` was sized by `total_len`.
            unsafe { layout::write_point(&mut buf, pos, self.xs[orig as usize], self.ys[orig as usize]) };
            layout::write_index::<T>(&mut buf, num_items, pos, orig);
        }

        Ok(KdTree::from_parts(IndexBuffer::from(buf), num_items))
    }
}

/// Recursively splits `perm[..]` in place by alternating axis with
/// recursion depth, fixing the median of each range at its middle
/// position via linear-time selection.
fn partition<T: KdCoord>(perm: &mut [u32], xs: &[T], ys: &[T], depth: usize) {
    if perm.len() <= 1 {
        return;
    }
    let axis_is_x = depth % 2 == 0;
    let mid = perm.len() / 2;
    perm.select_nth_unstable_by(mid, |&a, &b| {
        let (va, vb) = if axis_is_x {
            (xs[a as usize].to_f64(), xs[b as usize].to_f64())
        } else {
            (ys[a as usize].to_f64(), ys[b as usize].to_f64())
        };
        va.partial_cmp(&vb).unwrap_or(Ordering::Equal)
    });
    let (left, rest) = perm.split_at_mut(mid);
    let right = &mut rest[1..];
    partition(left, xs, ys, depth + 1);
    partition(right, xs, ys, depth + 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_beyond_capacity_is_count_mismatch() {
        let mut b = KdBuilder::<f64>::new(1).unwrap();
        b.add(0.0, 0.0).unwrap();
        assert!(matches!(b.add(0.0, 0.0), Err(GeoIndexError::CountMismatch { .. })));
    }

    #[test]
    fn nan_point_is_rejected() {
        let mut b = KdBuilder::<f64>::new(1).unwrap();
        assert!(b.add(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn empty_builder_finishes() {
        let b = KdBuilder::<f64>::new(0).unwrap();
        let tree = b.finish().unwrap();
        assert_eq!(tree.num_items(), 0);
    }
}
