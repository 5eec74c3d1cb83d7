//! # geopack - packed spatial indexes
//!
//! Static, bulk-loaded spatial indexes over axis-aligned bounding boxes and
//! 2D points, serialized into a compact, self-describing byte buffer that
//! can be memory-mapped, shipped across a process boundary, or handed to a
//! host runtime without copying. Two index flavors are provided:
//!
//! - [`rtree`] — a packed, Hilbert- or STR-ordered R-tree for rectangle
//!   queries, wire-compatible with the Flatbush format.
//! - [`kdtree`] — a packed KD-tree for point queries.
//!
//! Both are built once via a `Builder`, then queried through an immutable
//! `Tree`. There is no insertion or deletion after `finish()`; rebuilding
//! from scratch is the supported way to reflect new data.
//!
//! ## Quick start
//!
//! ```rust
//! use geopack::prelude::*;
//!
//! let mut builder = RTreeBuilder::<f64>::new(5).unwrap();
//! for i in 0..5u32 {
//!     let v = f64::from(i);
//!     builder.add(v, v, v + 5.0, v + 5.0).unwrap();
//! }
//! let tree = builder.finish(SortMethod::Hilbert).unwrap();
//!
//! let mut hits = tree.search(&BBox::new(0.5, 0.5, 1.5, 1.5));
//! hits.sort_unstable();
//! assert_eq!(hits, vec![0, 1]);
//! ```
//!
//! Trees round-trip through a byte buffer with [`rtree::RTree::to_buffer`]
//! and [`rtree::RTree::from_buffer`] (and the `KdTree` equivalents),
//! without re-sorting or rebuilding.

pub mod buffer;
pub mod coord;
pub mod error;
pub mod hilbert;
pub mod kdtree;
pub mod partition;
pub mod prelude;
pub mod rtree;
pub mod sort;

pub use error::{GeoIndexError, Result};
