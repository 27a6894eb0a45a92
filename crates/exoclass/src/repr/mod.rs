//! Canonical tree-ensemble representation used for inference.

/// Node identifier: an index into a tree's arrays.
pub type NodeId = u32;

pub mod forest;
pub mod tree;

pub use forest::{Forest, ForestValidationError};
pub use tree::{Node, Tree, TreeValidationError};
