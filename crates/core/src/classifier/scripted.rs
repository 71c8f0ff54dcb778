//! Deterministic classifier that replays a fixed list of outputs

use super::{Classifier, ProbabilityVector};
use crate::error::{Error, Result};
use crate::features::FeatureVector;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What happens after the last scripted output has been returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptExhausted {
    /// Start over from the first output
    Cycle,
    /// Keep returning the last output
    RepeatLast,
    /// Return a classifier error
    Fail,
}

/// Classifier returning pre-recorded probability vectors in order
///
/// Ignores the window contents; only counts calls.
pub struct ScriptedClassifier {
    outputs: Vec<ProbabilityVector>,
    cursor: AtomicUsize,
    exhausted: ScriptExhausted,
}

impl ScriptedClassifier {
    pub fn new(outputs: Vec<ProbabilityVector>, exhausted: ScriptExhausted) -> Result<Self> {
        let width = outputs
            .first()
            .map(|o| o.len())
            .ok_or_else(|| Error::config("scripted classifier needs at least one output"))?;
        if let Some(bad) = outputs.iter().position(|o| o.len() != width) {
            return Err(Error::config(format!(
                "scripted output {} has {} values, expected {}",
                bad,
                outputs[bad].len(),
                width
            )));
        }

        Ok(Self {
            outputs,
            cursor: AtomicUsize::new(0),
            exhausted,
        })
    }

    /// Always return the same output
    pub fn constant(output: ProbabilityVector) -> Result<Self> {
        Self::new(vec![output], ScriptExhausted::RepeatLast)
    }

    /// Load outputs from a JSONL file, one JSON array of probabilities per line
    pub fn from_jsonl(path: impl AsRef<Path>, exhausted: ScriptExhausted) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut outputs = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            outputs.push(serde_json::from_str::<ProbabilityVector>(line)?);
        }
        Self::new(outputs, exhausted)
    }

    /// Number of calls served so far
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&self, _window: &[FeatureVector]) -> Result<ProbabilityVector> {
        let call = self.cursor.fetch_add(1, Ordering::SeqCst);
        let len = self.outputs.len();

        let index = if call < len {
            call
        } else {
            match self.exhausted {
                ScriptExhausted::Cycle => call % len,
                ScriptExhausted::RepeatLast => len - 1,
                ScriptExhausted::Fail => {
                    return Err(Error::classifier(format!(
                        "script exhausted after {} outputs",
                        len
                    )))
                }
            }
        };

        Ok(self.outputs[index].clone())
    }

    fn num_labels(&self) -> Option<usize> {
        self.outputs.first().map(|o| o.len())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
