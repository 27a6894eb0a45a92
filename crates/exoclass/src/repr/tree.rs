//! Immutable decision tree storage (structure of arrays).
//!
//! Trees are built once from a list of [`Node`]s, validated, and then frozen
//! into flat arrays for traversal. Only numeric splits are represented; a
//! missing feature value (NaN) follows the split's default direction.

use ndarray::ArrayView1;

use super::NodeId;

/// A node in tree-construction form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node {
    /// Numeric split: go left if `value < threshold`, follow `default_left`
    /// when the value is missing.
    Split {
        feature: u32,
        threshold: f32,
        default_left: bool,
        left: NodeId,
        right: NodeId,
    },
    /// Terminal node carrying the leaf weight.
    Leaf(f32),
}

impl Node {
    pub fn split(feature: u32, threshold: f32, default_left: bool, left: NodeId, right: NodeId) -> Self {
        Node::Split {
            feature,
            threshold,
            default_left,
            left,
            right,
        }
    }

    pub fn leaf(value: f32) -> Self {
        Node::Leaf(value)
    }
}

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,
    #[error("node {node} references {side} child {child} but tree has {n_nodes} nodes")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },
    #[error("node {node} references itself as a child")]
    SelfLoop { node: NodeId },
    /// A node was reached by more than one path (DAG) or due to a cycle.
    #[error("node {node} is reachable more than once from the root")]
    DuplicateVisit { node: NodeId },
}

/// Structure-of-Arrays tree for traversal.
///
/// Child indices are local to this tree (0 = root).
#[derive(Debug, Clone)]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f32]>,
    left_children: Box<[NodeId]>,
    right_children: Box<[NodeId]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[f32]>,
}

impl Tree {
    /// Build a tree from nodes stored in index order.
    pub fn new(nodes: Vec<Node>) -> Result<Self, TreeValidationError> {
        let n_nodes = nodes.len();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        let mut split_indices = Vec::with_capacity(n_nodes);
        let mut split_thresholds = Vec::with_capacity(n_nodes);
        let mut left_children = Vec::with_capacity(n_nodes);
        let mut right_children = Vec::with_capacity(n_nodes);
        let mut default_left = Vec::with_capacity(n_nodes);
        let mut is_leaf = Vec::with_capacity(n_nodes);
        let mut leaf_values = Vec::with_capacity(n_nodes);

        for (idx, node) in nodes.into_iter().enumerate() {
            let idx = idx as NodeId;
            match node {
                Node::Split {
                    feature,
                    threshold,
                    default_left: dl,
                    left,
                    right,
                } => {
                    check_child(idx, "left", left, n_nodes)?;
                    check_child(idx, "right", right, n_nodes)?;
                    split_indices.push(feature);
                    split_thresholds.push(threshold);
                    left_children.push(left);
                    right_children.push(right);
                    default_left.push(dl);
                    is_leaf.push(false);
                    leaf_values.push(0.0);
                }
                Node::Leaf(value) => {
                    split_indices.push(0);
                    split_thresholds.push(0.0);
                    left_children.push(0);
                    right_children.push(0);
                    default_left.push(false);
                    is_leaf.push(true);
                    leaf_values.push(value);
                }
            }
        }

        let tree = Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
        };
        tree.check_reachability()?;
        Ok(tree)
    }

    /// Every node reachable from the root must be reached exactly once.
    fn check_reachability(&self) -> Result<(), TreeValidationError> {
        let mut visited = vec![false; self.n_nodes()];
        let mut stack: Vec<NodeId> = vec![0];

        while let Some(node) = stack.pop() {
            if visited[node as usize] {
                return Err(TreeValidationError::DuplicateVisit { node });
            }
            visited[node as usize] = true;
            if !self.is_leaf(node) {
                stack.push(self.left_children[node as usize]);
                stack.push(self.right_children[node as usize]);
            }
        }

        Ok(())
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> f32 {
        self.leaf_values[node as usize]
    }

    /// Largest feature index referenced by any split, if the tree has splits.
    pub fn max_feature_index(&self) -> Option<u32> {
        self.split_indices
            .iter()
            .zip(self.is_leaf.iter())
            .filter(|&(_, &leaf)| !leaf)
            .map(|(&f, _)| f)
            .max()
    }

    /// Walk from the root to a leaf.
    ///
    /// Features beyond the end of `row` are treated as missing.
    #[inline]
    pub fn traverse_to_leaf(&self, row: ArrayView1<'_, f32>) -> NodeId {
        let mut node: NodeId = 0;

        while !self.is_leaf(node) {
            let idx = node as usize;
            let fvalue = row
                .get(self.split_indices[idx] as usize)
                .copied()
                .unwrap_or(f32::NAN);

            let go_left = if fvalue.is_nan() {
                self.default_left[idx]
            } else {
                fvalue < self.split_thresholds[idx]
            };

            node = if go_left {
                self.left_children[idx]
            } else {
                self.right_children[idx]
            };
        }

        node
    }

    /// Leaf value reached by `row`.
    #[inline]
    pub fn predict_row(&self, row: ArrayView1<'_, f32>) -> f32 {
        self.leaf_value(self.traverse_to_leaf(row))
    }
}

fn check_child(
    node: NodeId,
    side: &'static str,
    child: NodeId,
    n_nodes: usize,
) -> Result<(), TreeValidationError> {
    if child as usize >= n_nodes {
        return Err(TreeValidationError::ChildOutOfBounds {
            node,
            side,
            child,
            n_nodes,
        });
    }
    if child == node {
        return Err(TreeValidationError::SelfLoop { node });
    }
    Ok(())
}
