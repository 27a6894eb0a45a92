//! Classifier capabilities and the tree-ensemble implementation.
//!
//! [`Classifier`] is the label-output capability every model has.
//! [`ProbabilisticClassifier`] is the optional probability-output capability,
//! discovered at runtime through [`Classifier::as_probabilistic`].

use std::fmt;

use ndarray::ArrayView1;

use super::transform::OutputTransform;
use crate::repr::Forest;

/// Failure inside a model's inference call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("feature row has {actual} columns, model expects {expected}")]
    RowWidth { expected: usize, actual: usize },
    #[error("model produced a non-finite margin for class group {group}")]
    NonFiniteMargin { group: usize },
}

/// Label-output inference capability.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Number of input features the model was trained on.
    fn n_features(&self) -> usize;

    /// Number of classes the model distinguishes.
    fn n_classes(&self) -> usize;

    /// Predicted class index for one row.
    fn predict(&self, row: ArrayView1<'_, f32>) -> Result<usize, InferenceError>;

    /// Probability-output view of this model, if it has one.
    fn as_probabilistic(&self) -> Option<&dyn ProbabilisticClassifier> {
        None
    }

    /// Training column names, when the model carries them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }
}

/// Probability-output inference capability.
pub trait ProbabilisticClassifier: Classifier {
    /// Class probabilities for one row, index-aligned with class labels.
    fn predict_proba(&self, row: ArrayView1<'_, f32>) -> Result<Vec<f32>, InferenceError>;
}

/// Classification objectives a tree ensemble can be trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationObjective {
    /// `binary:logistic`: sigmoid probability of the positive class.
    BinaryLogistic,
    /// `binary:logitraw`: raw margin, positive when > 0.
    BinaryLogitRaw,
    /// `binary:hinge`: hard 0/1 output.
    BinaryHinge,
    /// `multi:softprob`: softmax probabilities over classes.
    MultiSoftprob,
    /// `multi:softmax`: argmax class only.
    MultiSoftmax,
}

impl ClassificationObjective {
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            Self::BinaryLogistic | Self::BinaryLogitRaw | Self::BinaryHinge
        )
    }

    /// Whether this objective yields calibrated class probabilities.
    pub fn is_probabilistic(&self) -> bool {
        matches!(self, Self::BinaryLogistic | Self::MultiSoftprob)
    }

    pub fn output_transform(&self) -> OutputTransform {
        match self {
            Self::BinaryLogistic => OutputTransform::Sigmoid,
            Self::MultiSoftprob => OutputTransform::Softmax,
            _ => OutputTransform::Identity,
        }
    }
}

/// Gradient-boosted tree classifier.
#[derive(Debug, Clone)]
pub struct GbdtClassifier {
    forest: Forest,
    objective: ClassificationObjective,
    n_features: usize,
    feature_names: Option<Vec<String>>,
}

impl GbdtClassifier {
    pub fn new(forest: Forest, objective: ClassificationObjective, n_features: usize) -> Self {
        Self {
            forest,
            objective,
            n_features,
            feature_names: None,
        }
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = if names.is_empty() { None } else { Some(names) };
        self
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn objective(&self) -> ClassificationObjective {
        self.objective
    }

    /// Raw margins, checked for row width and finiteness.
    fn margins(&self, row: ArrayView1<'_, f32>) -> Result<Vec<f32>, InferenceError> {
        if row.len() != self.n_features {
            return Err(InferenceError::RowWidth {
                expected: self.n_features,
                actual: row.len(),
            });
        }

        let margins = self.forest.predict_row(row);
        if let Some(group) = margins.iter().position(|m| !m.is_finite()) {
            return Err(InferenceError::NonFiniteMargin { group });
        }
        Ok(margins)
    }
}

impl Classifier for GbdtClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        if self.objective.is_binary() {
            2
        } else {
            self.forest.n_groups() as usize
        }
    }

    fn predict(&self, row: ArrayView1<'_, f32>) -> Result<usize, InferenceError> {
        let margins = self.margins(row)?;
        if self.objective.is_binary() {
            // sigmoid(m) > 0.5 and m > 0 agree; both binary heads split at zero margin.
            Ok(usize::from(margins[0] > 0.0))
        } else {
            Ok(argmax(&margins))
        }
    }

    fn as_probabilistic(&self) -> Option<&dyn ProbabilisticClassifier> {
        if self.objective.is_probabilistic() {
            Some(self)
        } else {
            None
        }
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }
}

impl ProbabilisticClassifier for GbdtClassifier {
    fn predict_proba(&self, row: ArrayView1<'_, f32>) -> Result<Vec<f32>, InferenceError> {
        let mut margins = self.margins(row)?;
        self.objective.output_transform().apply(&mut margins);
        if self.objective.is_binary() {
            // One positive-class probability; report both columns.
            let p = margins[0];
            return Ok(vec![1.0 - p, p]);
        }
        Ok(margins)
    }
}

/// Index of the first maximum.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (idx, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = idx;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::transform::sigmoid;
    use crate::repr::{Node, Tree};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn stump(left: f32, right: f32) -> Tree {
        Tree::new(vec![Node::split(0, 0.5, true, 1, 2), Node::leaf(left), Node::leaf(right)]).unwrap()
    }

    fn three_class(objective: ClassificationObjective) -> GbdtClassifier {
        let mut forest = Forest::new(3);
        forest.push_tree(stump(2.0, -1.0), 0);
        forest.push_tree(stump(0.0, 2.0), 1);
        forest.push_tree(stump(-1.0, 0.0), 2);
        GbdtClassifier::new(forest, objective, 2)
    }

    fn binary(objective: ClassificationObjective) -> GbdtClassifier {
        let mut forest = Forest::new(1);
        forest.push_tree(stump(-1.5, 1.5), 0);
        GbdtClassifier::new(forest, objective, 2)
    }

    #[test]
    fn softprob_exposes_probabilities() {
        let model = three_class(ClassificationObjective::MultiSoftprob);
        let proba_model = model.as_probabilistic().expect("softprob is probabilistic");

        let proba = proba_model.predict_proba(array![0.9f32, 0.0].view()).unwrap();
        assert_eq!(proba.len(), 3);
        assert_abs_diff_eq!(proba.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert_eq!(argmax(&proba), 1);
        assert_eq!(model.predict(array![0.9f32, 0.0].view()).unwrap(), 1);
    }

    #[test]
    fn softmax_is_label_only() {
        let model = three_class(ClassificationObjective::MultiSoftmax);
        assert!(model.as_probabilistic().is_none());
        assert_eq!(model.n_classes(), 3);
        assert_eq!(model.predict(array![0.1f32, 0.0].view()).unwrap(), 0);
    }

    #[test]
    fn binary_logistic_expands_to_two_columns() {
        let model = binary(ClassificationObjective::BinaryLogistic);
        assert_eq!(model.n_classes(), 2);

        let proba = model
            .as_probabilistic()
            .unwrap()
            .predict_proba(array![0.9f32, 0.0].view())
            .unwrap();
        assert_abs_diff_eq!(proba[1], sigmoid(1.5), epsilon = 1e-6);
        assert_abs_diff_eq!(proba[0] + proba[1], 1.0, epsilon = 1e-6);
        assert_eq!(model.predict(array![0.9f32, 0.0].view()).unwrap(), 1);
        assert_eq!(model.predict(array![0.1f32, 0.0].view()).unwrap(), 0);
    }

    #[test]
    fn probabilities_follow_objective_transform() {
        let model = binary(ClassificationObjective::BinaryLogistic);
        assert_eq!(model.objective().output_transform(), OutputTransform::Sigmoid);

        let mut expected = vec![-1.5f32];
        model.objective().output_transform().apply(&mut expected);
        let proba = model.predict_proba(array![0.1f32, 0.0].view()).unwrap();
        assert_abs_diff_eq!(proba[1], expected[0], epsilon = 1e-7);
        assert_abs_diff_eq!(proba[0], 1.0 - expected[0], epsilon = 1e-7);

        let model = three_class(ClassificationObjective::MultiSoftprob);
        assert_eq!(model.objective().output_transform(), OutputTransform::Softmax);
    }

    #[test]
    fn binary_hinge_and_logitraw_are_label_only() {
        for objective in [
            ClassificationObjective::BinaryHinge,
            ClassificationObjective::BinaryLogitRaw,
        ] {
            let model = binary(objective);
            assert!(model.as_probabilistic().is_none());
            assert_eq!(model.predict(array![0.9f32, 0.0].view()).unwrap(), 1);
        }
    }

    #[test]
    fn rejects_wrong_row_width() {
        let model = three_class(ClassificationObjective::MultiSoftprob);
        assert_eq!(
            model.predict(array![0.1f32].view()).unwrap_err(),
            InferenceError::RowWidth {
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn non_finite_margin_is_an_error() {
        let mut forest = Forest::new(1);
        forest.push_tree(stump(f32::NAN, 0.0), 0);
        let model = GbdtClassifier::new(forest, ClassificationObjective::BinaryLogistic, 1);
        assert_eq!(
            model.predict(array![0.0f32].view()).unwrap_err(),
            InferenceError::NonFiniteMargin { group: 0 }
        );
    }

    #[test]
    fn argmax_takes_first_maximum() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[1.0]), 0);
    }
}
