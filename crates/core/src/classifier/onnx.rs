//! ONNX Runtime gesture classifier
//!
//! Expects a model with one f32 input shaped `[1, window, features]` and one
//! f32 output shaped `[1, labels]`.

use super::{softmax, Classifier, ProbabilityVector};
use crate::error::{Error, Result};
use crate::features::FeatureVector;
use ort::{
    execution_providers::CPUExecutionProvider,
    session::{Session, SessionOutputs},
    value::Tensor,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for `OnnxClassifier`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnnxClassifierConfig {
    /// Path to the `.onnx` model file
    pub model_path: PathBuf,

    /// Apply softmax to the model output (for models that emit logits)
    #[serde(default)]
    pub apply_softmax: bool,

    /// Intra-op thread count (None = runtime default)
    #[serde(default)]
    pub intra_threads: Option<usize>,
}

impl OnnxClassifierConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            apply_softmax: false,
            intra_threads: None,
        }
    }
}

/// Classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    apply_softmax: bool,
    model_path: PathBuf,
}

impl OnnxClassifier {
    /// Load the model and create the runtime session
    pub fn load(config: &OnnxClassifierConfig) -> Result<Self> {
        let path: &Path = &config.model_path;
        if !path.exists() {
            return Err(Error::classifier(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        tracing::info!("Loading gesture classifier from {}", path.display());

        let mut builder =
            Session::builder()?.with_execution_providers([CPUExecutionProvider::default().build()])?;
        if let Some(threads) = config.intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        let session = builder.commit_from_file(path)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| Error::classifier("model declares no inputs"))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| Error::classifier("model declares no outputs"))?;

        tracing::info!(
            "Gesture classifier loaded (input '{}', output '{}')",
            input_name,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            apply_softmax: config.apply_softmax,
            model_path: config.model_path.clone(),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, window: &[FeatureVector]) -> Result<ProbabilityVector> {
        let frames = window.len();
        let width = window
            .first()
            .map(|v| v.len())
            .ok_or_else(|| Error::contract("cannot classify an empty window"))?;

        let mut flat = Vec::with_capacity(frames * width);
        for vector in window {
            flat.extend_from_slice(vector);
        }

        let input = Tensor::from_array(([1usize, frames, width], flat))?;

        let mut session = self.session.lock();
        let outputs: SessionOutputs = session.run(ort::inputs![
            self.input_name.as_str() => input,
        ])?;

        let (_, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        let raw = data.to_vec();

        tracing::trace!("ONNX classifier produced {} values", raw.len());

        Ok(if self.apply_softmax { softmax(&raw) } else { raw })
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
