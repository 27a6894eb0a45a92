//! Output transformation from margins to probabilities.
//!
//! - [`Identity`](OutputTransform::Identity): raw margins
//! - [`Sigmoid`](OutputTransform::Sigmoid): binary classification
//! - [`Softmax`](OutputTransform::Softmax): multiclass classification

/// Inference-time output transformation for a single row of margins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputTransform {
    /// No transformation; output = margin.
    #[default]
    Identity,

    /// Logistic sigmoid: output = 1 / (1 + exp(-margin)).
    Sigmoid,

    /// Softmax: output_i = exp(margin_i) / sum(exp(margin_j)).
    Softmax,
}

impl OutputTransform {
    /// Apply the transformation in place to one row of margins.
    ///
    /// NaN and Inf inputs propagate through without panics.
    #[inline]
    pub fn apply(&self, row: &mut [f32]) {
        match self {
            OutputTransform::Identity => {}
            OutputTransform::Sigmoid => {
                for x in row.iter_mut() {
                    *x = sigmoid(*x);
                }
            }
            OutputTransform::Softmax => softmax_inplace(row),
        }
    }
}

/// Numerically stable sigmoid; input clamped to [-500, 500].
#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    let clamped = x.clamp(-500.0, 500.0);
    if clamped >= 0.0 {
        1.0 / (1.0 + (-clamped).exp())
    } else {
        let e = clamped.exp();
        e / (1.0 + e)
    }
}

/// Softmax in place, shifted by the row max.
#[inline]
fn softmax_inplace(row: &mut [f32]) {
    if row.is_empty() {
        return;
    }

    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let mut sum = 0.0f32;
    for x in row.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }

    if sum > 0.0 {
        for x in row.iter_mut() {
            *x /= sum;
        }
    }
}
