//! SignCaption core: real-time sign language captioning
//!
//! Turns a stream of per-frame body/hand landmarks into a short rolling
//! caption. Each frame is flattened into a feature vector, buffered into a
//! sliding window, classified once the window is full, and stabilized so a
//! label only reaches the caption when recent predictions agree and the
//! classifier is confident.
//!
//! # Features
//!
//! - `onnx` - ONNX Runtime gesture classifier (`OnnxClassifier`)
//!
//! # Example
//!
//! ```ignore
//! use signcaption_core::{
//!     CaptionSession, FrameLoop, HolisticFeatureExtractor, IterSource, PipelineConfig,
//!     ScriptedClassifier,
//! };
//!
//! let config = PipelineConfig::from_file("pipeline.yaml")?;
//! let session = CaptionSession::new(&config)?;
//! let mut frame_loop = FrameLoop::new(session, HolisticFeatureExtractor::new(), classifier);
//! let stats = frame_loop.run(&mut IterSource::new(frames), &mut |_, caption: &str| {
//!     println!("{caption}");
//! })?;
//! ```

pub mod caption;
pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod features;
pub mod frame_loop;
pub mod labels;
pub mod landmarks;
pub mod session;
pub mod sink;
pub mod stabilizer;
pub mod window;

pub use caption::CaptionLog;
pub use classifier::{softmax, Classifier, ProbabilityVector, ScriptExhausted, ScriptedClassifier};
pub use config::{PipelineConfig, DEFAULT_LABELS};
pub use error::{Error, Result};
pub use events::CaptionEvent;
pub use features::{FeatureExtractor, FeatureVector, HolisticFeatureExtractor};
pub use frame_loop::{
    AsyncFrameLoop, AsyncFrameLoopHandle, AsyncStopHandle, CaptionPresenter, FrameLoop, FrameRead,
    FrameSource, IterSource, StopHandle,
};
pub use labels::{Label, LabelVocabulary};
pub use landmarks::{Landmark, LandmarkFrame, LandmarkGroup};
pub use session::{CaptionSession, FrameOutcome, SessionState, SessionStats};
pub use sink::{CaptionSink, CaptionSinkError, ChannelSink, EventFilter, JsonlSink, NullSink};
pub use stabilizer::{
    argmax, AgreementRule, PredictionHistory, PredictionStabilizer, StabilizerDecision,
};
pub use window::{WindowBuffer, WindowSnapshot};

#[cfg(feature = "onnx")]
pub use classifier::{OnnxClassifier, OnnxClassifierConfig};
