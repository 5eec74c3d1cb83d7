//! Packed KD-tree for point queries.

mod builder;
mod layout;
mod tree;

pub use builder::KdBuilder;
pub use tree::KdTree;
