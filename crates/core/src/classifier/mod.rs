//! Gesture classifiers
//!
//! A classifier maps one full window of feature vectors to a probability
//! vector whose positions line up with the label vocabulary.
//!
//! - `ScriptedClassifier` - replays fixed probability vectors (tests, replay tool)
//! - `OnnxClassifier` - ONNX Runtime model (`onnx` feature)

mod scripted;

#[cfg(feature = "onnx")]
mod onnx;

pub use scripted::{ScriptedClassifier, ScriptExhausted};

#[cfg(feature = "onnx")]
pub use onnx::{OnnxClassifier, OnnxClassifierConfig};

use crate::error::Result;
use crate::features::FeatureVector;

/// Probability per label, indexed like the vocabulary
pub type ProbabilityVector = Vec<f32>;

/// Window classifier
///
/// Implementations must be shareable across threads: the async frame loop
/// runs `classify` on the blocking pool.
pub trait Classifier: Send + Sync {
    /// Classify one full window, oldest vector first
    fn classify(&self, window: &[FeatureVector]) -> Result<ProbabilityVector>;

    /// Number of labels this classifier emits, when known up front
    fn num_labels(&self) -> Option<usize> {
        None
    }

    /// Name used in logs
    fn name(&self) -> &str {
        "classifier"
    }
}

impl<C: Classifier + ?Sized> Classifier for std::sync::Arc<C> {
    fn classify(&self, window: &[FeatureVector]) -> Result<ProbabilityVector> {
        (**self).classify(window)
    }

    fn num_labels(&self) -> Option<usize> {
        (**self).num_labels()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(&self, window: &[FeatureVector]) -> Result<ProbabilityVector> {
        (**self).classify(window)
    }

    fn num_labels(&self) -> Option<usize> {
        (**self).num_labels()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> ProbabilityVector {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return exps;
    }
    exps.into_iter().map(|v| v / sum).collect()
}
