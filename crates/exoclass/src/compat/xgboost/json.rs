//! XGBoost JSON model format.
//!
//! Foreign types mirroring the document written by `Booster.save_model("*.json")`
//! (XGBoost >= 1.0). Only the members inference needs are declared; serde
//! ignores the rest (loss changes, hessian sums, training parameters).
//! XGBoost writes most scalars as strings, hence the `DisplayFromStr` adapters.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{DisplayFromStr, serde_as};

// =============================================================================
// Custom deserializers for XGBoost-specific formats
// =============================================================================

/// `base_score` appears as `0.5`, `"0.5"`, `[0.5]` or `"[5E-1]"` depending on version.
fn deserialize_base_score<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    let mut cur = Value::deserialize(deserializer)?;
    loop {
        cur = match cur {
            Value::Number(n) => {
                return n
                    .as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| SerdeError::custom("invalid number"));
            }
            Value::String(s) => {
                let t = s.trim();
                if let Ok(f) = t.parse::<f32>() {
                    return Ok(f);
                }
                if let Some(inner) = t.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                    if let Ok(f) = inner.trim().parse::<f32>() {
                        return Ok(f);
                    }
                }
                match serde_json::from_str::<Vec<Value>>(t) {
                    Ok(arr) => first_element(arr).map_err(D::Error::custom)?,
                    Err(_) => {
                        return Err(SerdeError::custom(format!(
                            "cannot parse base_score from string: {s}"
                        )));
                    }
                }
            }
            Value::Array(arr) => first_element(arr).map_err(D::Error::custom)?,
            _ => {
                return Err(SerdeError::custom(
                    "base_score must be number, string, or array",
                ));
            }
        };
    }
}

fn first_element(arr: Vec<Value>) -> Result<Value, &'static str> {
    arr.into_iter().next().ok_or("empty base_score array")
}

/// Booleans written as `true`, `1`, `"1"` or `"true"`.
fn deserialize_bool_any<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(i != 0),
            (None, Some(f)) => Ok(f != 0.0),
            _ => Err(SerdeError::custom("invalid number for bool")),
        },
        Value::String(s) => match s.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            t if t.eq_ignore_ascii_case("true") => Ok(true),
            t if t.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(SerdeError::custom(format!("cannot parse bool from string: {s}"))),
        },
        _ => Err(SerdeError::custom("unsupported type for bool")),
    }
}

fn default_num_class() -> i64 {
    0
}

fn default_boost_from_average() -> bool {
    true
}

// =============================================================================
// Trees
// =============================================================================

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_nodes: i64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub size_leaf_vector: i64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub num_feature: i64,
}

/// One regression tree, stored as parallel per-node arrays.
///
/// Leaf values are read from `split_conditions`; `base_weights` is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub tree_param: TreeParam,
    #[serde(default)]
    pub id: i32,
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i32>,
    pub split_conditions: Vec<f32>,
    /// 0 = numeric, 1 = categorical. Absent in models without categorical support.
    #[serde(default)]
    pub split_type: Vec<i32>,
    pub default_left: Vec<i32>,
    #[serde(default)]
    pub categories_nodes: Vec<i32>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GBTreeModelParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_trees: i64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub num_parallel_tree: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrees {
    pub gbtree_model_param: GBTreeModelParam,
    pub trees: Vec<Tree>,
    /// Output group of each tree.
    pub tree_info: Vec<i32>,
}

// =============================================================================
// Gradient booster variants (gbtree | dart | gblinear)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GBTreeDefinition {
    pub name: String,
    pub model: ModelTrees,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GradientBooster {
    Gbtree {
        model: ModelTrees,
    },
    Dart {
        gbtree: GBTreeDefinition,
        weight_drop: Vec<f32>,
    },
    /// Parsed so the loader can reject it with a clear message.
    Gblinear {
        #[serde(default)]
        model: Value,
    },
}

impl GradientBooster {
    pub fn name(&self) -> &'static str {
        match self {
            GradientBooster::Gbtree { .. } => "gbtree",
            GradientBooster::Dart { .. } => "dart",
            GradientBooster::Gblinear { .. } => "gblinear",
        }
    }
}

// =============================================================================
// Objective / learner
// =============================================================================

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoftmaxMulticlassParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_class: i64,
}

/// Training objective. Only the name and the multiclass parameters matter
/// for inference; other parameter blocks are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub softmax_multiclass_param: Option<SoftmaxMulticlassParam>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_score")]
    pub base_score: f32,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_num_class")]
    pub num_class: i64,
    #[serde_as(as = "DisplayFromStr")]
    pub num_feature: i64,
    #[serde(deserialize_with = "deserialize_bool_any")]
    #[serde(default = "default_boost_from_average")]
    pub boost_from_average: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learner {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub gradient_booster: GradientBooster,
    pub objective: Objective,
    pub learner_model_param: LearnerModelParam,
}

// =============================================================================
// Top-level XGBoost model
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XgbModel {
    pub version: [u32; 3],
    pub learner: Learner,
}

impl XgbModel {
    /// Parse a model from a serde_json Value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Number of classes declared by the learner or the objective.
    pub fn num_class(&self) -> i64 {
        let declared = self.learner.learner_model_param.num_class;
        if declared > 0 {
            return declared;
        }
        self.learner
            .objective
            .softmax_multiclass_param
            .as_ref()
            .map_or(0, |p| p.num_class)
    }
}
