//! Forest of decision trees with per-group accumulation.

use ndarray::ArrayView1;

use super::tree::Tree;

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestValidationError {
    #[error("base score has {len} entries for {n_groups} output groups")]
    BaseScoreLenMismatch { n_groups: u32, len: usize },
    #[error("tree {tree_idx} is assigned to group {group} but forest has {n_groups} groups")]
    TreeGroupOutOfRange {
        tree_idx: usize,
        group: u32,
        n_groups: u32,
    },
    #[error("forest has {n_trees} trees but {len} tree weights")]
    TreeWeightsLenMismatch { n_trees: usize, len: usize },
}

/// Forest of decision trees.
///
/// Each tree contributes to one output group; multiclass models use one group
/// per class. Optional per-tree weights scale each tree's output (DART).
#[derive(Debug, Clone)]
pub struct Forest {
    trees: Vec<Tree>,
    tree_groups: Vec<u32>,
    tree_weights: Option<Box<[f32]>>,
    n_groups: u32,
    base_score: Vec<f32>,
}

impl Forest {
    /// Create an empty forest with the given number of output groups.
    pub fn new(n_groups: u32) -> Self {
        Self {
            trees: Vec::new(),
            tree_groups: Vec::new(),
            tree_weights: None,
            n_groups,
            base_score: vec![0.0; n_groups as usize],
        }
    }

    /// Set the base score (margin space) for all groups.
    pub fn with_base_score(mut self, base_score: Vec<f32>) -> Self {
        self.base_score = base_score;
        self
    }

    /// Attach per-tree output weights.
    pub fn with_tree_weights(mut self, weights: Vec<f32>) -> Self {
        self.tree_weights = Some(weights.into_boxed_slice());
        self
    }

    pub fn push_tree(&mut self, tree: Tree, group: u32) {
        self.trees.push(tree);
        self.tree_groups.push(group);
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn n_groups(&self) -> u32 {
        self.n_groups
    }

    #[inline]
    pub fn base_score(&self) -> &[f32] {
        &self.base_score
    }

    pub fn tree_weights(&self) -> Option<&[f32]> {
        self.tree_weights.as_deref()
    }

    /// Iterate over trees with their group assignments.
    pub fn trees_with_groups(&self) -> impl Iterator<Item = (&Tree, u32)> {
        self.trees.iter().zip(self.tree_groups.iter().copied())
    }

    /// Largest feature index referenced by any split.
    pub fn max_feature_index(&self) -> Option<u32> {
        self.trees.iter().filter_map(Tree::max_feature_index).max()
    }

    /// Check group assignments, base score and weights against the group count.
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        if self.base_score.len() != self.n_groups as usize {
            return Err(ForestValidationError::BaseScoreLenMismatch {
                n_groups: self.n_groups,
                len: self.base_score.len(),
            });
        }
        if let Some(weights) = &self.tree_weights {
            if weights.len() != self.trees.len() {
                return Err(ForestValidationError::TreeWeightsLenMismatch {
                    n_trees: self.trees.len(),
                    len: weights.len(),
                });
            }
        }
        for (tree_idx, &group) in self.tree_groups.iter().enumerate() {
            if group >= self.n_groups {
                return Err(ForestValidationError::TreeGroupOutOfRange {
                    tree_idx,
                    group,
                    n_groups: self.n_groups,
                });
            }
        }
        Ok(())
    }

    /// Raw margins (one per group) for a single row.
    pub fn predict_row(&self, row: ArrayView1<'_, f32>) -> Vec<f32> {
        let mut output = self.base_score.clone();

        for (tree_idx, (tree, group)) in self.trees_with_groups().enumerate() {
            let weight = self
                .tree_weights
                .as_ref()
                .map_or(1.0, |w| w[tree_idx]);
            output[group as usize] += weight * tree.predict_row(row);
        }

        output
    }
}
