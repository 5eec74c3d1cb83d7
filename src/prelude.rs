//! Convenient re-exports of the crate's most commonly used types.
//!
//! ```
//! use geopack::prelude::*;
//! ```

pub use crate::coord::{BBox, Coord, KdCoord};
pub use crate::error::{GeoIndexError, Result};
pub use crate::kdtree::{KdBuilder, KdTree};
pub use crate::rtree::{RTree, RTreeBuilder};
pub use crate::sort::SortMethod;
