//! Model bundles: the fitted classifier plus its class labels.
//!
//! A bundle document is JSON with two required members and one optional one:
//!
//! ```text
//! {
//!   "model":         { ...XGBoost JSON model... },
//!   "classes_":      ["CONFIRMED", "CANDIDATE", "FALSE POSITIVE"],
//!   "feature_names": ["koi_period", ...]
//! }
//! ```
//!
//! Use [`BundleLoader`] to load one lazily and share it across requests.

mod loader;

pub use loader::{BundleLoader, BundleSource, FileSource, LoadState};

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::compat::xgboost::XgbModel;
use crate::error::{LoadFailure, PredictionError};
use crate::features::{AlignmentPolicy, FeatureMap, build_row};
use crate::model::{Classifier, argmax};

/// Class labels may be written as strings, integers or booleans; they are
/// served as their string form.
fn deserialize_labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .map(|label| match label {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(D::Error::custom(format!(
                "class label must be a scalar, got {other}"
            ))),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct BundleDocument {
    model: XgbModel,
    #[serde(rename = "classes_", deserialize_with = "deserialize_labels")]
    classes: Vec<String>,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
}

/// Output of one prediction: the label and, when the model has a
/// probability head, the full class distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub probabilities: Option<Vec<f32>>,
}

/// A loaded model with its class labels. Immutable once built.
pub struct Bundle {
    model: Box<dyn Classifier>,
    class_labels: Vec<String>,
    feature_names: Option<Vec<String>>,
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("n_features", &self.model.n_features())
            .field("class_labels", &self.class_labels)
            .field("probabilistic", &self.is_probabilistic())
            .finish()
    }
}

impl Bundle {
    /// Assemble a bundle from an already-built classifier.
    ///
    /// Fails when the number of labels differs from the number of classes
    /// the model distinguishes.
    pub fn new(
        model: Box<dyn Classifier>,
        class_labels: Vec<String>,
        feature_names: Option<Vec<String>>,
    ) -> Result<Self, LoadFailure> {
        if class_labels.len() != model.n_classes() {
            return Err(LoadFailure::ClassCountMismatch {
                labels: class_labels.len(),
                classes: model.n_classes(),
            });
        }

        let feature_names = feature_names
            .filter(|names| !names.is_empty())
            .or_else(|| model.feature_names().map(<[String]>::to_vec));
        if let Some(names) = &feature_names {
            if names.len() != model.n_features() {
                return Err(LoadFailure::FeatureNamesMismatch {
                    names: names.len(),
                    expected: model.n_features(),
                });
            }
        }

        Ok(Self {
            model,
            class_labels,
            feature_names,
        })
    }

    /// Parse and convert a bundle document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, LoadFailure> {
        let doc: BundleDocument = serde_json::from_slice(bytes)?;
        Self::from_document(doc)
    }

    /// Parse and convert a bundle document held as a JSON value.
    pub fn from_value(value: Value) -> Result<Self, LoadFailure> {
        let doc: BundleDocument = serde_json::from_value(value)?;
        Self::from_document(doc)
    }

    fn from_document(doc: BundleDocument) -> Result<Self, LoadFailure> {
        // Checked before conversion sizes anything by the declared class count.
        let classes = doc.model.n_classes()?;
        if doc.classes.len() != classes {
            return Err(LoadFailure::ClassCountMismatch {
                labels: doc.classes.len(),
                classes,
            });
        }

        let classifier = doc.model.to_classifier()?;
        Self::new(Box::new(classifier), doc.classes, doc.feature_names)
    }

    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    pub fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    /// Training column names from the bundle or, failing that, the model.
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Width of the feature row the model expects.
    pub fn n_features(&self) -> usize {
        self.model.n_features()
    }

    pub fn is_probabilistic(&self) -> bool {
        self.model.as_probabilistic().is_some()
    }

    fn label(&self, index: usize) -> Result<String, PredictionError> {
        self.class_labels
            .get(index)
            .cloned()
            .ok_or(PredictionError::LabelOutOfRange {
                index,
                n_labels: self.class_labels.len(),
            })
    }

    /// Align `features` into a row and classify it.
    pub fn predict(
        &self,
        features: &FeatureMap,
        policy: AlignmentPolicy,
    ) -> Result<Prediction, PredictionError> {
        let row = build_row(
            features,
            self.n_features(),
            policy,
            self.feature_names(),
        )?;

        match self.model.as_probabilistic() {
            Some(model) => {
                let probabilities = model.predict_proba(row.view())?;
                let label = self.label(argmax(&probabilities))?;
                Ok(Prediction {
                    label,
                    probabilities: Some(probabilities),
                })
            }
            None => {
                let index = self.model.predict(row.view())?;
                Ok(Prediction {
                    label: self.label(index)?,
                    probabilities: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureValue;
    use crate::testing::{
        EXOPLANET_CLASSES, EXOPLANET_FEATURES, XgbModelBuilder, assert_valid_probabilities,
        bundle_value, exoplanet_bundle, exoplanet_model, xgb_stump,
    };
    use serde_json::json;

    fn features(values: &[f64]) -> FeatureMap {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("f{i}"), FeatureValue::Number(*v)))
            .collect()
    }

    #[test]
    fn loads_exoplanet_bundle() {
        let bundle = Bundle::from_value(exoplanet_bundle()).unwrap();
        assert_eq!(bundle.n_features(), EXOPLANET_FEATURES);
        assert_eq!(bundle.class_labels(), &EXOPLANET_CLASSES);
        assert!(bundle.is_probabilistic());
        assert!(bundle.feature_names().is_none());
    }

    #[test]
    fn probability_path_labels_the_argmax() {
        let bundle = Bundle::from_value(exoplanet_bundle()).unwrap();
        // f0 >= 0.5 boosts CONFIRMED to 1.5; f1 and f2 missing go left.
        let prediction = bundle
            .predict(&features(&[1.0]), AlignmentPolicy::Positional)
            .unwrap();
        let probabilities = prediction.probabilities.unwrap();
        assert_valid_probabilities(&probabilities, 3);
        assert_eq!(argmax(&probabilities), 0);
        assert_eq!(prediction.label, "CONFIRMED");
    }

    #[test]
    fn label_only_path() {
        let model = XgbModelBuilder::new("multi:softmax", 2)
            .num_class(3)
            .tree(xgb_stump(0, 0.5, 1.0, -1.0), 0)
            .tree(xgb_stump(0, 0.5, -1.0, 0.0), 1)
            .tree(xgb_stump(0, 0.5, -1.0, 2.0), 2)
            .build_value();
        let bundle = Bundle::from_value(bundle_value(model, &EXOPLANET_CLASSES)).unwrap();
        assert!(!bundle.is_probabilistic());

        let prediction = bundle
            .predict(&features(&[0.9, 0.0]), AlignmentPolicy::Positional)
            .unwrap();
        assert_eq!(prediction.label, "FALSE POSITIVE");
        assert!(prediction.probabilities.is_none());
    }

    #[test]
    fn numeric_class_labels_are_stringified() {
        let model = XgbModelBuilder::new("binary:logistic", 1)
            .tree(xgb_stump(0, 0.5, -2.0, 2.0), 0)
            .build_value();
        let bundle = Bundle::from_value(json!({"model": model, "classes_": [0, 1]})).unwrap();
        assert_eq!(bundle.class_labels(), &["0".to_string(), "1".to_string()]);

        let prediction = bundle
            .predict(&features(&[1.0]), AlignmentPolicy::Positional)
            .unwrap();
        assert_eq!(prediction.label, "1");
    }

    #[test]
    fn class_count_must_match_model() {
        let err = Bundle::from_value(bundle_value(
            exoplanet_model().build_value(),
            &["CONFIRMED", "FALSE POSITIVE"],
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            LoadFailure::ClassCountMismatch {
                labels: 2,
                classes: 3
            }
        ));
    }

    #[test]
    fn huge_class_count_fails_before_conversion() {
        let mut model = exoplanet_model().build_value();
        model["learner"]["learner_model_param"]["num_class"] = json!("2000000000");
        let err = Bundle::from_value(bundle_value(model, &EXOPLANET_CLASSES)).unwrap_err();
        assert!(matches!(
            err,
            LoadFailure::ClassCountMismatch {
                labels: 3,
                classes: 2_000_000_000
            }
        ));

        let mut model = exoplanet_model().build_value();
        model["learner"]["learner_model_param"]["num_class"] = json!("4294967299");
        let err = Bundle::from_value(bundle_value(model, &EXOPLANET_CLASSES)).unwrap_err();
        assert!(matches!(err, LoadFailure::Model(_)));
    }

    #[test]
    fn corrupt_tree_groups_fail_to_load() {
        let mut model = exoplanet_model().build_value();
        model["learner"]["gradient_booster"]["model"]["tree_info"] = json!([0, -7, 2]);
        let err = Bundle::from_value(bundle_value(model, &EXOPLANET_CLASSES)).unwrap_err();
        assert!(matches!(err, LoadFailure::Model(_)));

        let mut model = exoplanet_model().build_value();
        model["learner"]["gradient_booster"]["model"]["tree_info"] = json!([]);
        let err = Bundle::from_value(bundle_value(model, &EXOPLANET_CLASSES)).unwrap_err();
        assert!(matches!(err, LoadFailure::Model(_)));
    }

    #[test]
    fn missing_members_are_malformed() {
        let err = Bundle::from_value(json!({"classes_": ["a", "b"]})).unwrap_err();
        assert!(matches!(err, LoadFailure::Format(_)));

        let err = Bundle::from_slice(b"\x80\x04\x95 not json").unwrap_err();
        assert!(matches!(err, LoadFailure::Format(_)));
    }

    #[test]
    fn unsupported_objective_is_a_model_failure() {
        let model = XgbModelBuilder::new("reg:squarederror", 1)
            .tree(xgb_stump(0, 0.5, -2.0, 2.0), 0)
            .build_value();
        let err = Bundle::from_value(bundle_value(model, &["a", "b"])).unwrap_err();
        assert!(matches!(err, LoadFailure::Model(_)));
    }

    #[test]
    fn feature_names_fall_back_to_model() {
        let model = XgbModelBuilder::new("binary:logistic", 2)
            .feature_names(&["koi_period", "koi_prad"])
            .tree(xgb_stump(1, 0.5, -2.0, 2.0), 0)
            .build_value();
        let bundle = Bundle::from_value(bundle_value(model, &["no", "yes"])).unwrap();
        assert_eq!(
            bundle.feature_names().unwrap(),
            &["koi_period".to_string(), "koi_prad".to_string()]
        );

        let mut map = FeatureMap::new();
        map.insert("koi_prad".into(), 1.0.into());
        let prediction = bundle.predict(&map, AlignmentPolicy::ByName).unwrap();
        assert_eq!(prediction.label, "yes");

        // Positional would have put koi_prad into slot 0.
        let prediction = bundle.predict(&map, AlignmentPolicy::Positional).unwrap();
        assert_eq!(prediction.label, "no");
    }

    #[test]
    fn bundle_feature_names_must_match_width() {
        let mut doc = exoplanet_bundle();
        doc["feature_names"] = json!(["koi_period"]);
        let err = Bundle::from_value(doc).unwrap_err();
        assert!(matches!(
            err,
            LoadFailure::FeatureNamesMismatch {
                names: 1,
                expected: 43
            }
        ));
    }

    #[test]
    fn invalid_feature_fails_prediction() {
        let bundle = Bundle::from_value(exoplanet_bundle()).unwrap();
        let mut map = FeatureMap::new();
        map.insert("koi_period".into(), "fast".into());
        let err = bundle.predict(&map, AlignmentPolicy::Positional).unwrap_err();
        assert!(matches!(err, PredictionError::InvalidFeature { .. }));
    }
}
