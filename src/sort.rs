//! Sort-key computation for the bulk loader: Hilbert-curve ordering and
//! Sort-Tile-Recursive (STR) ordering.

use crate::coord::{BBox, Coord};
use crate::hilbert::{hilbert_xy_to_index, quantize};

/// The two bulk-load orderings `Builder::finish` accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortMethod {
    /// Order leaves by Hilbert-curve code of their centroid.
    Hilbert,
    /// Order leaves by Sort-Tile-Recursive slabbing.
    Str,
}

/// Computes the permutation that places items in the requested sort order.
///
/// `order[i]` is the original index of the item that should occupy leaf
/// position `i`. Ties are broken by original index, which falls out for
/// free from using a stable sort.
#[must_use]
pub fn sort_order<T: Coord>(boxes: &[BBox<T>], method: SortMethod, node_size: usize) -> Vec<u32> {
    let n = boxes.len();
    if n == 0 {
        return Vec::new();
    }

    match method {
        SortMethod::Hilbert => hilbert_order(boxes),
        SortMethod::Str => str_order(boxes, node_size),
    }
}

fn global_extent<T: Coord>(boxes: &[BBox<T>]) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for b in boxes {
        min_x = min_x.min(b.min_x.to_f64());
        min_y = min_y.min(b.min_y.to_f64());
        max_x = max_x.max(b.max_x.to_f64());
        max_y = max_y.max(b.max_y.to_f64());
    }
    (min_x, min_y, max_x, max_y)
}

fn hilbert_order<T: Coord>(boxes: &[BBox<T>]) -> Vec<u32> {
    let (min_x, min_y, max_x, max_y) = global_extent(boxes);
    let width = max_x - min_x;
    let height = max_y - min_y;

    let codes: Vec<u32> = boxes
        .iter()
        .map(|b| {
            let (cx, cy) = b.centroid();
            let hx = quantize(cx, min_x, width);
            let hy = quantize(cy, min_y, height);
            hilbert_xy_to_index(hx, hy)
        })
        .collect();

    let mut order: Vec<u32> = (0..boxes.len() as u32).collect();
    order.sort_by_key(|&i| codes[i as usize]);
    order
}

fn str_order<T: Coord>(boxes: &[BBox<T>], node_size: usize) -> Vec<u32> {
    let n = boxes.len();
    let m = node_size.max(1);

    let mut by_x: Vec<u32> = (0..n as u32).collect();
    by_x.sort_by(|&a, &b| {
        boxes[a as usize]
            .centroid()
            .0
            .partial_cmp(&boxes[b as usize].centroid().0)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let num_slabs = ((n as f64 / m as f64).sqrt().ceil() as usize).max(1);
    let slab_size = (((n * m) as f64).sqrt().ceil() as usize).max(1);
    let _ = num_slabs; // slab count follows from slab_size; kept for readability alongside it

    let mut order = Vec::with_capacity(n);
    for chunk in by_x.chunks(slab_size) {
        let mut slab = chunk.to_vec();
        slab.sort_by(|&a, &b| {
            boxes[a as usize]
                .centroid()
                .1
                .partial_cmp(&boxes[b as usize].centroid().1)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.extend(slab);
    }
    order
}
