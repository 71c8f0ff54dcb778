//! Per-session caption pipeline and its lifecycle
//!
//! A `CaptionSession` owns the window buffer, the prediction history (inside
//! the stabilizer) and the caption log. Nothing is shared between sessions.
//!
//! # Lifecycle
//!
//! 1. `Idle`: created, nothing processed
//! 2. `Streaming`: `start()` resets all buffers; frames are accepted
//! 3. `Stopped`: `stop()` freezes the buffers; they stay readable
//!
//! A stopped session is terminal. Start a new session instead.

use crate::caption::CaptionLog;
use crate::classifier::{Classifier, ProbabilityVector};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::features::FeatureVector;
use crate::labels::Label;
use crate::stabilizer::{PredictionHistory, PredictionStabilizer, StabilizerDecision};
use crate::window::{WindowBuffer, WindowSnapshot};
use serde::{Deserialize, Serialize};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Streaming,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Streaming => "streaming",
            SessionState::Stopped => "stopped",
        }
    }
}

/// Counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Frames handed to the session, including skipped ones
    pub frames_received: u64,
    /// Frames dropped because capture failed
    pub frames_skipped: u64,
    /// Full windows that were classified
    pub windows_classified: u64,
    /// Windows that produced a confirmed label
    pub labels_confirmed: u64,
    /// Confirmed labels that changed the caption
    pub caption_updates: u64,
}

/// Result of feeding one frame's features through the session
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    /// Stabilizer decision, when the window was full and got classified
    pub decision: Option<StabilizerDecision>,
    /// Caption text after this frame
    pub caption: String,
}

impl FrameOutcome {
    pub fn confirmed_label(&self) -> Option<&Label> {
        self.decision.as_ref().and_then(|d| d.label.as_ref())
    }

    pub fn caption_changed(&self) -> bool {
        self.decision.as_ref().is_some_and(|d| d.caption_changed)
    }
}

/// Single-owner caption pipeline for one stream
#[derive(Debug)]
pub struct CaptionSession {
    session_id: String,
    state: SessionState,
    window: WindowBuffer,
    stabilizer: PredictionStabilizer,
    caption: CaptionLog,
    stats: SessionStats,
}

impl CaptionSession {
    /// Create an idle session from a validated config
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            state: SessionState::Idle,
            window: WindowBuffer::with_width(config.window_size, config.feature_width),
            stabilizer: PredictionStabilizer::from_config(config)?,
            caption: CaptionLog::new(config.caption_capacity),
            stats: SessionStats::default(),
        })
    }

    /// Override the generated session id
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Idle -> Streaming; resets window, history and caption
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(self.invalid_state("start"));
        }

        self.window.clear();
        self.stabilizer.reset();
        self.caption.clear();
        self.stats = SessionStats::default();
        self.state = SessionState::Streaming;

        tracing::info!("Session {} started", self.session_id);
        Ok(())
    }

    /// Move to the terminal Stopped state; repeated calls are no-ops
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.state = SessionState::Stopped;
        tracing::info!(
            "Session {} stopped after {} frames ({} skipped), caption: '{}'",
            self.session_id,
            self.stats.frames_received,
            self.stats.frames_skipped,
            self.caption.render()
        );
    }

    /// Record a frame that could not be captured or decoded
    ///
    /// Buffers are left untouched.
    pub fn record_skip(&mut self) -> Result<()> {
        self.ensure_streaming("skip frame")?;
        self.stats.frames_received += 1;
        self.stats.frames_skipped += 1;
        Ok(())
    }

    /// Append one frame's features; returns a snapshot once the window is full
    ///
    /// A vector of the wrong width stops the session and is not counted as
    /// received.
    pub fn append_features(&mut self, vector: FeatureVector) -> Result<Option<WindowSnapshot>> {
        self.ensure_streaming("append")?;
        if let Err(e) = self.window.append(vector) {
            return Err(self.abort(e));
        }
        self.stats.frames_received += 1;

        if self.window.is_full() {
            Ok(Some(self.window.snapshot()?))
        } else {
            Ok(None)
        }
    }

    /// Apply a classifier result for a previously returned snapshot
    ///
    /// A malformed probability vector stops the session.
    pub fn apply_probabilities(&mut self, probabilities: &[f32]) -> Result<StabilizerDecision> {
        self.ensure_streaming("observe")?;

        let decision = match self
            .stabilizer
            .observe_detailed(probabilities, &mut self.caption)
        {
            Ok(decision) => decision,
            Err(e) => return Err(self.abort(e)),
        };

        self.stats.windows_classified += 1;
        if let Some(label) = &decision.label {
            self.stats.labels_confirmed += 1;
            if decision.caption_changed {
                self.stats.caption_updates += 1;
                tracing::info!(
                    "Session {} confirmed '{}' ({:.3}), caption: '{}'",
                    self.session_id,
                    label,
                    decision.top_confidence,
                    self.caption.render()
                );
            }
        }

        Ok(decision)
    }

    /// Append features and, when the window is full, classify synchronously
    pub fn process_features<C>(&mut self, vector: FeatureVector, classifier: &C) -> Result<FrameOutcome>
    where
        C: Classifier + ?Sized,
    {
        let decision = match self.append_features(vector)? {
            Some(snapshot) => {
                let probabilities: ProbabilityVector = classifier.classify(&snapshot)?;
                Some(self.apply_probabilities(&probabilities)?)
            }
            None => None,
        };

        Ok(FrameOutcome {
            decision,
            caption: self.caption.render(),
        })
    }

    /// Current caption text
    pub fn render(&self) -> String {
        self.caption.render()
    }

    pub fn caption(&self) -> &CaptionLog {
        &self.caption
    }

    pub fn window(&self) -> &WindowBuffer {
        &self.window
    }

    pub fn history(&self) -> &PredictionHistory {
        self.stabilizer.history()
    }

    pub fn stabilizer(&self) -> &PredictionStabilizer {
        &self.stabilizer
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    fn abort(&mut self, err: Error) -> Error {
        tracing::error!("Session {}: {}", self.session_id, err);
        if err.is_contract_violation() {
            self.stop();
        }
        err
    }

    fn ensure_streaming(&self, operation: &'static str) -> Result<()> {
        if self.state != SessionState::Streaming {
            return Err(self.invalid_state(operation));
        }
        Ok(())
    }

    fn invalid_state(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ScriptExhausted, ScriptedClassifier};

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            window_size: 3,
            labels: vec!["a".into(), "b".into(), "hello".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut session = CaptionSession::new(&small_config()).unwrap();
        assert_eq!(session.state(), SessionState::Idle);

        session.start().unwrap();
        assert!(session.is_streaming());
        assert!(session.start().is_err());

        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        session.stop();
        assert!(matches!(
            session.start(),
            Err(Error::InvalidState { operation: "start", state: "stopped" })
        ));
    }

    #[test]
    fn test_debug_output_names_session() {
        let session = CaptionSession::new(&small_config()).unwrap().with_session_id("dbg-1");
        let debug = format!("{:?}", session);
        assert!(debug.contains("dbg-1"));
        assert!(debug.contains("Idle"));
    }

    #[test]
    fn test_append_requires_streaming() {
        let mut session = CaptionSession::new(&small_config()).unwrap();
        assert!(session.append_features(vec![0.0]).unwrap_err().is_contract_violation());

        session.start().unwrap();
        session.append_features(vec![0.0]).unwrap();
        session.stop();

        assert!(session.append_features(vec![0.0]).is_err());
        assert!(session.apply_probabilities(&[0.0, 0.0, 1.0]).is_err());
        assert_eq!(session.window().len(), 1);
    }

    #[test]
    fn test_classifies_once_window_is_full() {
        let mut session = CaptionSession::new(&small_config()).unwrap();
        let classifier = ScriptedClassifier::constant(vec![0.05, 0.05, 0.9]).unwrap();
        session.start().unwrap();

        let first = session.process_features(vec![0.0; 2], &classifier).unwrap();
        let second = session.process_features(vec![0.0; 2], &classifier).unwrap();
        assert!(first.decision.is_none());
        assert!(second.decision.is_none());
        assert_eq!(classifier.calls(), 0);

        let third = session.process_features(vec![0.0; 2], &classifier).unwrap();
        assert_eq!(third.confirmed_label().unwrap(), "hello");
        assert!(third.caption_changed());
        assert_eq!(third.caption, "hello");

        let fourth = session.process_features(vec![0.0; 2], &classifier).unwrap();
        assert!(!fourth.caption_changed());
        assert_eq!(classifier.calls(), 2);

        let stats = session.stats();
        assert_eq!(stats.frames_received, 4);
        assert_eq!(stats.windows_classified, 2);
        assert_eq!(stats.labels_confirmed, 2);
        assert_eq!(stats.caption_updates, 1);
    }

    #[test]
    fn test_skip_leaves_buffers_untouched() {
        let mut session = CaptionSession::new(&small_config()).unwrap();
        session.start().unwrap();
        session.append_features(vec![1.0]).unwrap();

        session.record_skip().unwrap();
        assert_eq!(session.window().len(), 1);
        assert_eq!(session.stats().frames_skipped, 1);
        assert_eq!(session.state(), SessionState::Streaming);
    }

    #[test]
    fn test_stopped_session_keeps_caption_readable() {
        let mut session = CaptionSession::new(&small_config()).unwrap();
        let classifier = ScriptedClassifier::new(vec![vec![0.9, 0.05, 0.05]], ScriptExhausted::Fail).unwrap();
        session.start().unwrap();
        for _ in 0..3 {
            session.process_features(vec![0.0], &classifier).unwrap();
        }
        session.stop();

        assert_eq!(session.render(), "a");
        assert_eq!(session.history().to_vec(), vec![0]);
    }

    #[test]
    fn test_classifier_error_propagates() {
        let mut session = CaptionSession::new(&small_config()).unwrap();
        let classifier = ScriptedClassifier::constant(vec![0.5, 0.5]).unwrap();
        session.start().unwrap();
        session.process_features(vec![0.0], &classifier).unwrap();
        session.process_features(vec![0.0], &classifier).unwrap();

        let err = session.process_features(vec![0.0], &classifier).unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_label_count_mismatch_stops_session() {
        let mut session = CaptionSession::new(&small_config()).unwrap();
        let classifier = ScriptedClassifier::constant(vec![0.9, 0.1]).unwrap();
        session.start().unwrap();
        for _ in 0..2 {
            session.process_features(vec![0.0; 2], &classifier).unwrap();
        }

        let err = session.process_features(vec![0.0; 2], &classifier).unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(session.state(), SessionState::Stopped);

        assert!(matches!(
            session.process_features(vec![0.0; 2], &classifier),
            Err(Error::InvalidState { operation: "append", state: "stopped" })
        ));
        assert_eq!(session.render(), "");
        assert_eq!(session.stats().windows_classified, 0);
    }

    #[test]
    fn test_non_finite_probabilities_stop_session() {
        let mut session = CaptionSession::new(&small_config()).unwrap();
        session.start().unwrap();

        let err = session.apply_probabilities(&[f32::NAN, 0.5, 0.5]).unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.apply_probabilities(&[0.0, 0.0, 1.0]).is_err());
    }

    #[test]
    fn test_width_mismatch_stops_session_uncounted() {
        let mut session = CaptionSession::new(&small_config()).unwrap();
        session.start().unwrap();
        session.append_features(vec![0.0; 2]).unwrap();

        let err = session.append_features(vec![0.0; 3]).unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.stats().frames_received, 1);
        assert_eq!(session.window().len(), 1);
    }
}
