//! Conversion from XGBoost JSON types to native classifier types.

use crate::model::{ClassificationObjective, GbdtClassifier};
use crate::repr::{Forest, ForestValidationError, Node, Tree, TreeValidationError};

use super::json::{GradientBooster, ModelTrees, Tree as XgbTree, XgbModel};

/// Error type for XGBoost model conversion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("unsupported booster '{0}': only gbtree and dart tree ensembles can be served")]
    UnsupportedBooster(&'static str),
    #[error("unsupported objective '{0}': expected a binary:* or multi:* classification objective")]
    UnsupportedObjective(String),
    #[error("objective {objective} requires num_class in 2..=4294967295, model declares {num_class}")]
    InvalidClassCount { objective: String, num_class: i64 },
    #[error("tree {tree} node {node} uses a categorical split, which is not supported")]
    CategoricalSplit { tree: usize, node: usize },
    #[error("tree {tree} has vector leaves (size_leaf_vector = {size}), which are not supported")]
    VectorLeaf { tree: usize, size: i64 },
    #[error("tree {tree}: {field} has {actual} entries, expected {expected}")]
    ArrayLenMismatch {
        tree: usize,
        field: &'static str,
        actual: usize,
        expected: usize,
    },
    #[error("tree {tree} is assigned to negative output group {group}")]
    InvalidTreeGroup { tree: usize, group: i32 },
    #[error("tree_info has {actual} entries for {expected} trees")]
    TreeInfoLenMismatch { actual: usize, expected: usize },
    #[error("tree {tree} node {node} has invalid child index {child}")]
    InvalidNodeIndex { tree: usize, node: usize, child: i32 },
    #[error("tree {tree} node {node} splits on feature {feature}, model has {num_feature} features")]
    FeatureOutOfRange {
        tree: usize,
        node: usize,
        feature: i32,
        num_feature: i64,
    },
    #[error("tree {tree}: {source}")]
    InvalidTree {
        tree: usize,
        #[source]
        source: TreeValidationError,
    },
    #[error(transparent)]
    InvalidForest(#[from] ForestValidationError),
}

/// Convert base_score from probability space to margin space.
///
/// XGBoost stores base_score in the objective's output space; the trees
/// accumulate in margin space. Multiclass base scores are already margins.
fn prob_to_margin(base_score: f32, objective: ClassificationObjective) -> f32 {
    match objective {
        ClassificationObjective::BinaryLogistic | ClassificationObjective::BinaryLogitRaw => {
            // logitraw models also report base_score as a probability.
            let p = base_score.clamp(1e-7, 1.0 - 1e-7);
            (p / (1.0 - p)).ln()
        }
        _ => base_score,
    }
}

fn parse_objective(name: &str) -> Result<ClassificationObjective, ConversionError> {
    Ok(match name {
        "binary:logistic" => ClassificationObjective::BinaryLogistic,
        "binary:logitraw" => ClassificationObjective::BinaryLogitRaw,
        "binary:hinge" => ClassificationObjective::BinaryHinge,
        "multi:softprob" => ClassificationObjective::MultiSoftprob,
        "multi:softmax" => ClassificationObjective::MultiSoftmax,
        other => return Err(ConversionError::UnsupportedObjective(other.to_string())),
    })
}

impl XgbModel {
    /// Returns true if this model uses the DART booster.
    pub fn is_dart(&self) -> bool {
        matches!(&self.learner.gradient_booster, GradientBooster::Dart { .. })
    }

    /// Classification objective of this model.
    pub fn classification_objective(&self) -> Result<ClassificationObjective, ConversionError> {
        parse_objective(&self.learner.objective.name)
    }

    /// Number of classes the model distinguishes, checked before any
    /// per-class storage is allocated.
    pub fn n_classes(&self) -> Result<usize, ConversionError> {
        let objective = self.classification_objective()?;
        if objective.is_binary() {
            return Ok(2);
        }

        let num_class = self.num_class();
        match u32::try_from(num_class) {
            Ok(n) if n >= 2 => Ok(n as usize),
            _ => Err(ConversionError::InvalidClassCount {
                objective: self.learner.objective.name.clone(),
                num_class,
            }),
        }
    }

    /// Convert into a native classifier.
    ///
    /// Accepts gbtree and dart boosters with a classification objective.
    pub fn to_classifier(&self) -> Result<GbdtClassifier, ConversionError> {
        let objective = self.classification_objective()?;
        let n_classes = self.n_classes()?;
        let n_groups = if objective.is_binary() {
            1
        } else {
            n_classes as u32
        };

        let (model_trees, weights) = match &self.learner.gradient_booster {
            GradientBooster::Gbtree { model } => (model, None),
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => (&gbtree.model, Some(weight_drop.clone())),
            other @ GradientBooster::Gblinear { .. } => {
                return Err(ConversionError::UnsupportedBooster(other.name()));
            }
        };

        let params = &self.learner.learner_model_param;
        let margin_base_score = prob_to_margin(params.base_score, objective);
        let mut forest =
            Forest::new(n_groups).with_base_score(vec![margin_base_score; n_groups as usize]);
        if let Some(weights) = weights {
            forest = forest.with_tree_weights(weights);
        }

        push_trees(&mut forest, model_trees, params.num_feature)?;
        forest.validate()?;

        // Models that omit num_feature are sized by their widest split.
        let n_features = if params.num_feature > 0 {
            params.num_feature as usize
        } else {
            forest.max_feature_index().map_or(0, |f| f as usize + 1)
        };

        Ok(GbdtClassifier::new(forest, objective, n_features)
            .with_feature_names(self.learner.feature_names.clone()))
    }
}

fn push_trees(
    forest: &mut Forest,
    model_trees: &ModelTrees,
    num_feature: i64,
) -> Result<(), ConversionError> {
    let n_trees = model_trees.trees.len();
    if model_trees.tree_info.len() != n_trees {
        return Err(ConversionError::TreeInfoLenMismatch {
            actual: model_trees.tree_info.len(),
            expected: n_trees,
        });
    }

    for (tree_idx, (xgb_tree, &group)) in model_trees
        .trees
        .iter()
        .zip(model_trees.tree_info.iter())
        .enumerate()
    {
        let group = u32::try_from(group)
            .map_err(|_| ConversionError::InvalidTreeGroup { tree: tree_idx, group })?;
        let tree = convert_tree(xgb_tree, tree_idx, num_feature)?;
        forest.push_tree(tree, group);
    }
    Ok(())
}

/// Convert a single XGBoost tree to a native [`Tree`].
fn convert_tree(xgb_tree: &XgbTree, tree_idx: usize, num_feature: i64) -> Result<Tree, ConversionError> {
    let num_nodes = xgb_tree.tree_param.num_nodes.max(0) as usize;

    if xgb_tree.tree_param.size_leaf_vector > 1 {
        return Err(ConversionError::VectorLeaf {
            tree: tree_idx,
            size: xgb_tree.tree_param.size_leaf_vector,
        });
    }
    if let Some(&node) = xgb_tree.categories_nodes.first() {
        return Err(ConversionError::CategoricalSplit {
            tree: tree_idx,
            node: node.max(0) as usize,
        });
    }

    let check_len = |field: &'static str, actual: usize| {
        if actual == num_nodes {
            Ok(())
        } else {
            Err(ConversionError::ArrayLenMismatch {
                tree: tree_idx,
                field,
                actual,
                expected: num_nodes,
            })
        }
    };
    check_len("left_children", xgb_tree.left_children.len())?;
    check_len("right_children", xgb_tree.right_children.len())?;
    check_len("split_indices", xgb_tree.split_indices.len())?;
    check_len("split_conditions", xgb_tree.split_conditions.len())?;
    check_len("default_left", xgb_tree.default_left.len())?;

    let mut nodes = Vec::with_capacity(num_nodes);
    for node_idx in 0..num_nodes {
        let left = xgb_tree.left_children[node_idx];

        // XGBoost marks leaves with left_child == -1. The leaf value lives in
        // split_conditions; base_weights is unscaled on pruned nodes.
        if left == -1 {
            nodes.push(Node::leaf(xgb_tree.split_conditions[node_idx]));
            continue;
        }

        if xgb_tree.split_type.get(node_idx).copied().unwrap_or(0) != 0 {
            return Err(ConversionError::CategoricalSplit {
                tree: tree_idx,
                node: node_idx,
            });
        }

        let right = xgb_tree.right_children[node_idx];
        for child in [left, right] {
            if child < 0 {
                return Err(ConversionError::InvalidNodeIndex {
                    tree: tree_idx,
                    node: node_idx,
                    child,
                });
            }
        }

        let feature = xgb_tree.split_indices[node_idx];
        if feature < 0 || (num_feature > 0 && i64::from(feature) >= num_feature) {
            return Err(ConversionError::FeatureOutOfRange {
                tree: tree_idx,
                node: node_idx,
                feature,
                num_feature,
            });
        }

        nodes.push(Node::split(
            feature as u32,
            xgb_tree.split_conditions[node_idx],
            xgb_tree.default_left[node_idx] != 0,
            left as u32,
            right as u32,
        ));
    }

    Tree::new(nodes).map_err(|source| ConversionError::InvalidTree {
        tree: tree_idx,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Classifier;
    use crate::testing::{XgbModelBuilder, xgb_stump};
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    #[test]
    fn convert_multiclass_softprob() {
        let model = XgbModelBuilder::new("multi:softprob", 4)
            .num_class(3)
            .tree(xgb_stump(0, 0.5, 1.0, -1.0), 0)
            .tree(xgb_stump(1, 0.5, -1.0, 1.0), 1)
            .tree(xgb_stump(2, 0.5, 0.0, 0.0), 2)
            .build_model();

        let classifier = model.to_classifier().expect("conversion failed");
        assert_eq!(classifier.forest().n_groups(), 3);
        assert_eq!(classifier.forest().n_trees(), 3);
        assert_eq!(classifier.n_features(), 4);
        assert_eq!(classifier.n_classes(), 3);
        assert!(classifier.as_probabilistic().is_some());
    }

    #[test]
    fn binary_logistic_base_score_in_margin_space() {
        let model = XgbModelBuilder::new("binary:logistic", 2)
            .base_score(0.5)
            .tree(xgb_stump(0, 0.5, -1.0, 1.0), 0)
            .build_model();

        let classifier = model.to_classifier().unwrap();
        assert_eq!(classifier.forest().n_groups(), 1);
        assert_abs_diff_eq!(classifier.forest().base_score()[0], 0.0, epsilon = 1e-6);

        let model = XgbModelBuilder::new("binary:logistic", 2)
            .base_score(0.8)
            .tree(xgb_stump(0, 0.5, -1.0, 1.0), 0)
            .build_model();
        let classifier = model.to_classifier().unwrap();
        assert_abs_diff_eq!(classifier.forest().base_score()[0], 4.0f32.ln(), epsilon = 1e-5);
    }

    #[test]
    fn dart_weights_are_applied() {
        let model = XgbModelBuilder::new("multi:softmax", 1)
            .num_class(2)
            .tree(xgb_stump(0, 0.5, 1.0, 1.0), 0)
            .tree(xgb_stump(0, 0.5, 1.0, 1.0), 1)
            .dart(vec![0.5, 2.0])
            .build_model();
        assert!(model.is_dart());

        let classifier = model.to_classifier().unwrap();
        assert_eq!(classifier.forest().tree_weights(), Some(&[0.5, 2.0][..]));

        let margins = classifier.forest().predict_row(Array1::from(vec![0.0f32]).view());
        assert_abs_diff_eq!(margins[0], 0.5 + 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(margins[1], 0.5 + 2.0, epsilon = 1e-6);
    }

    #[test]
    fn feature_names_are_carried() {
        let model = XgbModelBuilder::new("binary:logistic", 2)
            .feature_names(&["koi_period", "koi_prad"])
            .tree(xgb_stump(0, 0.5, -1.0, 1.0), 0)
            .build_model();
        let classifier = model.to_classifier().unwrap();
        assert_eq!(
            classifier.feature_names().unwrap(),
            &["koi_period".to_string(), "koi_prad".to_string()]
        );
    }

    #[test]
    fn missing_num_feature_is_inferred_from_splits() {
        let model = XgbModelBuilder::new("binary:logistic", 0)
            .tree(xgb_stump(3, 0.5, -1.0, 1.0), 0)
            .build_model();
        assert_eq!(model.to_classifier().unwrap().n_features(), 4);
    }

    #[test]
    fn rejects_regression_objective() {
        let model = XgbModelBuilder::new("reg:squarederror", 2)
            .tree(xgb_stump(0, 0.5, -1.0, 1.0), 0)
            .build_model();
        assert_eq!(
            model.to_classifier().unwrap_err(),
            ConversionError::UnsupportedObjective("reg:squarederror".into())
        );
    }

    #[test]
    fn rejects_multiclass_without_classes() {
        let model = XgbModelBuilder::new("multi:softprob", 2)
            .tree(xgb_stump(0, 0.5, -1.0, 1.0), 0)
            .build_model();
        assert!(matches!(
            model.to_classifier().unwrap_err(),
            ConversionError::InvalidClassCount { num_class: 0, .. }
        ));
    }

    #[test]
    fn rejects_split_on_unknown_feature() {
        let model = XgbModelBuilder::new("binary:logistic", 2)
            .tree(xgb_stump(5, 0.5, -1.0, 1.0), 0)
            .build_model();
        assert!(matches!(
            model.to_classifier().unwrap_err(),
            ConversionError::FeatureOutOfRange { feature: 5, .. }
        ));
    }

    #[test]
    fn rejects_gblinear() {
        let mut value = XgbModelBuilder::new("binary:logistic", 2).build_value();
        value["learner"]["gradient_booster"] =
            serde_json::json!({"name": "gblinear", "model": {"weights": [0.0, 0.0, 0.0]}});
        let model = XgbModel::from_value(value).unwrap();
        assert_eq!(
            model.to_classifier().unwrap_err(),
            ConversionError::UnsupportedBooster("gblinear")
        );
    }

    #[test]
    fn rejects_categorical_split() {
        let mut value = XgbModelBuilder::new("binary:logistic", 2)
            .tree(xgb_stump(0, 0.5, -1.0, 1.0), 0)
            .build_value();
        value["learner"]["gradient_booster"]["model"]["trees"][0]["split_type"] =
            serde_json::json!([1, 0, 0]);
        let model = XgbModel::from_value(value).unwrap();
        assert_eq!(
            model.to_classifier().unwrap_err(),
            ConversionError::CategoricalSplit { tree: 0, node: 0 }
        );
    }

    #[test]
    fn rejects_truncated_arrays() {
        let mut value = XgbModelBuilder::new("binary:logistic", 2)
            .tree(xgb_stump(0, 0.5, -1.0, 1.0), 0)
            .build_value();
        value["learner"]["gradient_booster"]["model"]["trees"][0]["split_conditions"] =
            serde_json::json!([0.5, -1.0]);
        let model = XgbModel::from_value(value).unwrap();
        assert!(matches!(
            model.to_classifier().unwrap_err(),
            ConversionError::ArrayLenMismatch {
                field: "split_conditions",
                actual: 2,
                expected: 3,
                ..
            }
        ));
    }

    #[test]
    fn rejects_tree_info_length_mismatch() {
        let mut value = XgbModelBuilder::new("multi:softprob", 3)
            .num_class(3)
            .tree(xgb_stump(0, 0.5, 1.0, -1.0), 0)
            .tree(xgb_stump(1, 0.5, 1.0, -1.0), 1)
            .tree(xgb_stump(2, 0.5, 1.0, -1.0), 2)
            .build_value();
        value["learner"]["gradient_booster"]["model"]["tree_info"] = serde_json::json!([]);
        let model = XgbModel::from_value(value).unwrap();
        assert_eq!(
            model.to_classifier().unwrap_err(),
            ConversionError::TreeInfoLenMismatch {
                actual: 0,
                expected: 3
            }
        );
    }

    #[test]
    fn rejects_negative_tree_group() {
        let model = XgbModelBuilder::new("multi:softprob", 3)
            .num_class(3)
            .tree(xgb_stump(0, 0.5, 1.0, -1.0), 0)
            .tree(xgb_stump(1, 0.5, 1.0, -1.0), -7)
            .tree(xgb_stump(2, 0.5, 1.0, -1.0), 2)
            .build_model();
        assert_eq!(
            model.to_classifier().unwrap_err(),
            ConversionError::InvalidTreeGroup { tree: 1, group: -7 }
        );
    }

    #[rstest::rstest]
    #[case("4294967299")]
    #[case("1")]
    fn rejects_out_of_range_class_count(#[case] num_class: &str) {
        let mut value = XgbModelBuilder::new("multi:softprob", 3)
            .num_class(3)
            .tree(xgb_stump(0, 0.5, 1.0, -1.0), 0)
            .build_value();
        value["learner"]["learner_model_param"]["num_class"] = serde_json::json!(num_class);
        let model = XgbModel::from_value(value).unwrap();
        assert!(matches!(
            model.n_classes().unwrap_err(),
            ConversionError::InvalidClassCount { .. }
        ));
        assert!(matches!(
            model.to_classifier().unwrap_err(),
            ConversionError::InvalidClassCount { .. }
        ));
    }

    #[test]
    fn leaf_values_come_from_split_conditions() {
        let mut value = XgbModelBuilder::new("binary:logistic", 2)
            .tree(xgb_stump(0, 0.5, -1.0, 1.0), 0)
            .build_value();
        // Pruned leaves keep an unscaled base weight.
        value["learner"]["gradient_booster"]["model"]["trees"][0]["base_weights"] =
            serde_json::json!([0.0, -99.0, 99.0]);
        let classifier = XgbModel::from_value(value).unwrap().to_classifier().unwrap();

        let margins = classifier.forest().predict_row(Array1::from(vec![0.9f32, 0.0]).view());
        assert_abs_diff_eq!(margins[0], 1.0, epsilon = 1e-6);
    }
}
