//! Testing utilities for exoclass.
//!
//! Builders for small XGBoost JSON models and bundle documents, plus
//! assertion helpers shared by unit and integration tests.
//!
//! ```ignore
//! use exoclass::testing::{XgbModelBuilder, xgb_stump, bundle_value};
//!
//! let model = XgbModelBuilder::new("multi:softprob", 43)
//!     .num_class(3)
//!     .tree(xgb_stump(0, 0.5, 1.0, -1.0), 0)
//!     .build_value();
//! let bundle = bundle_value(model, &["CONFIRMED", "CANDIDATE", "FALSE POSITIVE"]);
//! ```

use std::io;
use std::path::Path;

use approx::AbsDiffEq;
use serde_json::{Value, json};

use crate::compat::xgboost::XgbModel;

/// Default tolerance for probability comparisons.
pub const DEFAULT_TOLERANCE: f32 = 1e-5;

/// Class labels of the deployed exoplanet classifier.
pub const EXOPLANET_CLASSES: [&str; 3] = ["CONFIRMED", "CANDIDATE", "FALSE POSITIVE"];

/// Feature width of the deployed exoplanet classifier.
pub const EXOPLANET_FEATURES: usize = 43;

// =============================================================================
// XGBoost JSON builders
// =============================================================================

/// A depth-1 XGBoost tree: `feature < threshold` goes to `left`, otherwise
/// `right`; missing values go left.
pub fn xgb_stump(feature: i32, threshold: f32, left: f32, right: f32) -> Value {
    json!({
        "tree_param": {
            "num_nodes": "3",
            "size_leaf_vector": "1",
            "num_feature": "0",
            "num_deleted": "0"
        },
        "id": 0,
        "loss_changes": [1.0, 0.0, 0.0],
        "sum_hessian": [10.0, 5.0, 5.0],
        "base_weights": [0.0, left, right],
        "left_children": [1, -1, -1],
        "right_children": [2, -1, -1],
        "parents": [2147483647, 0, 0],
        "split_indices": [feature, 0, 0],
        "split_conditions": [threshold, left, right],
        "split_type": [0, 0, 0],
        "default_left": [1, 0, 0],
        "categories": [],
        "categories_nodes": [],
        "categories_segments": [],
        "categories_sizes": []
    })
}

/// Builder for XGBoost JSON model documents in the shape `save_model` writes.
#[derive(Debug, Clone)]
pub struct XgbModelBuilder {
    objective: String,
    num_feature: usize,
    num_class: usize,
    base_score: f32,
    trees: Vec<(Value, i32)>,
    dart_weights: Option<Vec<f32>>,
    feature_names: Vec<String>,
}

impl XgbModelBuilder {
    pub fn new(objective: &str, num_feature: usize) -> Self {
        Self {
            objective: objective.to_string(),
            num_feature,
            num_class: 0,
            base_score: 0.5,
            trees: Vec::new(),
            dart_weights: None,
            feature_names: Vec::new(),
        }
    }

    pub fn num_class(mut self, num_class: usize) -> Self {
        self.num_class = num_class;
        self
    }

    pub fn base_score(mut self, base_score: f32) -> Self {
        self.base_score = base_score;
        self
    }

    pub fn tree(mut self, tree: Value, group: i32) -> Self {
        self.trees.push((tree, group));
        self
    }

    /// Wrap the trees in a DART booster with the given drop weights.
    pub fn dart(mut self, weights: Vec<f32>) -> Self {
        self.dart_weights = Some(weights);
        self
    }

    pub fn feature_names(mut self, names: &[&str]) -> Self {
        self.feature_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn build_value(&self) -> Value {
        let trees: Vec<Value> = self
            .trees
            .iter()
            .enumerate()
            .map(|(idx, (tree, _))| {
                let mut tree = tree.clone();
                tree["id"] = json!(idx);
                tree
            })
            .collect();
        let tree_info: Vec<i32> = self.trees.iter().map(|(_, group)| *group).collect();

        let model_trees = json!({
            "gbtree_model_param": {
                "num_trees": trees.len().to_string(),
                "num_parallel_tree": "1"
            },
            "trees": trees,
            "tree_info": tree_info
        });

        let gradient_booster = match &self.dart_weights {
            None => json!({"name": "gbtree", "model": model_trees}),
            Some(weights) => json!({
                "name": "dart",
                "gbtree": {"name": "gbtree", "model": model_trees},
                "weight_drop": weights
            }),
        };

        let mut objective = json!({"name": self.objective});
        if self.objective.starts_with("multi:") {
            objective["softmax_multiclass_param"] =
                json!({"num_class": self.num_class.to_string()});
        } else {
            objective["reg_loss_param"] = json!({"scale_pos_weight": "1"});
        }

        json!({
            "version": [2, 0, 3],
            "learner": {
                "attributes": {},
                "feature_names": self.feature_names,
                "feature_types": [],
                "gradient_booster": gradient_booster,
                "objective": objective,
                "learner_model_param": {
                    "base_score": format!("{:E}", self.base_score),
                    "boost_from_average": "1",
                    "num_class": self.num_class.to_string(),
                    "num_feature": self.num_feature.to_string(),
                    "num_target": "1"
                }
            }
        })
    }

    /// Parse the built document.
    ///
    /// # Panics
    ///
    /// Panics if the document does not parse, which indicates a builder bug.
    pub fn build_model(&self) -> XgbModel {
        XgbModel::from_value(self.build_value()).expect("builder produced an invalid model")
    }
}

// =============================================================================
// Bundle documents
// =============================================================================

/// Bundle document `{model, classes_}`.
pub fn bundle_value(model: Value, classes: &[&str]) -> Value {
    json!({"model": model, "classes_": classes})
}

/// Three-class probability model over 43 features, shaped like the deployed
/// exoplanet classifier. Features 0..3 drive the three classes.
pub fn exoplanet_model() -> XgbModelBuilder {
    XgbModelBuilder::new("multi:softprob", EXOPLANET_FEATURES)
        .num_class(EXOPLANET_CLASSES.len())
        .tree(xgb_stump(0, 0.5, 0.2, 1.5), 0)
        .tree(xgb_stump(1, 1.0, 0.4, -0.3), 1)
        .tree(xgb_stump(2, 0.0, -0.6, 0.9), 2)
}

/// Bundle document for [`exoplanet_model`].
pub fn exoplanet_bundle() -> Value {
    bundle_value(exoplanet_model().build_value(), &EXOPLANET_CLASSES)
}

/// Write a bundle document to `path`.
pub fn write_bundle(path: &Path, bundle: &Value) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer(file, bundle).map_err(io::Error::from)
}

// =============================================================================
// Assertions
// =============================================================================

/// Assert a probability vector is well formed: expected length, entries in
/// [0, 1], summing to 1 within [`DEFAULT_TOLERANCE`].
///
/// # Panics
///
/// Panics with a descriptive message when any condition fails.
pub fn assert_valid_probabilities(probabilities: &[f32], n_classes: usize) {
    assert_eq!(
        probabilities.len(),
        n_classes,
        "expected {n_classes} probabilities, got {probabilities:?}"
    );
    for (i, &p) in probabilities.iter().enumerate() {
        assert!((0.0..=1.0).contains(&p), "probability[{i}] = {p} outside [0, 1]");
    }
    let sum: f32 = probabilities.iter().sum();
    assert!(
        sum.abs_diff_eq(&1.0, DEFAULT_TOLERANCE * n_classes as f32),
        "probabilities sum to {sum}, expected 1"
    );
}
