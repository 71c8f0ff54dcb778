//! Frame loops driving a caption session
//!
//! - `FrameLoop` - blocking; pulls from a `FrameSource` or is pushed frames one at a time
//! - `AsyncFrameLoop` - tokio; frames arrive over a channel and classification
//!   runs on the blocking pool, with results applied in arrival order
//!
//! Both loops absorb capture failures (skip the frame, keep going) and abort
//! the session on any other error.

mod async_loop;

pub use async_loop::{AsyncFrameLoop, AsyncFrameLoopHandle, AsyncStopHandle};

use crate::classifier::Classifier;
use crate::error::Result;
use crate::events::CaptionEvent;
use crate::features::FeatureExtractor;
use crate::session::{CaptionSession, SessionStats};
use crate::sink::{CaptionSink, NullSink};
use crate::stabilizer::StabilizerDecision;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One read from a capture source
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRead<F> {
    /// A captured frame
    Frame(F),
    /// Capture failed or the frame could not be decoded
    Skipped(String),
    /// Source is exhausted
    End,
}

/// Pull-style capture source
pub trait FrameSource {
    type Frame;

    fn next_frame(&mut self) -> FrameRead<Self::Frame>;
}

/// Adapts an iterator of optional frames; `None` items are capture failures
pub struct IterSource<I> {
    inner: I,
}

impl<I> IterSource<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<I, F> FrameSource for IterSource<I>
where
    I: Iterator<Item = Option<F>>,
{
    type Frame = F;

    fn next_frame(&mut self) -> FrameRead<F> {
        match self.inner.next() {
            Some(Some(frame)) => FrameRead::Frame(frame),
            Some(None) => FrameRead::Skipped("frame unavailable".to_string()),
            None => FrameRead::End,
        }
    }
}

/// Receives the caption after every processed frame
pub trait CaptionPresenter<F> {
    /// Called once per processed frame with the current caption text
    fn present(&mut self, frame: &F, caption: &str);

    /// Called when a frame was skipped
    fn warn(&mut self, _reason: &str) {}
}

impl<F, T> CaptionPresenter<F> for T
where
    T: FnMut(&F, &str),
{
    fn present(&mut self, frame: &F, caption: &str) {
        self(frame, caption)
    }
}

/// Cloneable stop signal checked at every iteration boundary
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Emit the events that follow one classified window
pub(crate) fn emit_decision(
    sink: &dyn CaptionSink,
    session: &CaptionSession,
    decision: &StabilizerDecision,
) -> Result<()> {
    if let Some(label) = &decision.label {
        sink.emit(CaptionEvent::label_confirmed(
            session.session_id(),
            label.as_str(),
            decision.top_index,
            decision.top_confidence,
        ))?;
        if decision.caption_changed {
            sink.emit(CaptionEvent::caption_updated(
                session.session_id(),
                session.render(),
            ))?;
        }
    }
    Ok(())
}

/// Record a skipped frame on the session and the sink
pub(crate) fn record_skip(sink: &dyn CaptionSink, session: &mut CaptionSession, reason: &str) -> Result<()> {
    session.record_skip()?;
    let frame_index = session.stats().frames_received - 1;
    tracing::warn!(
        "Session {}: skipping frame {}: {}",
        session.session_id(),
        frame_index,
        reason
    );
    sink.emit(CaptionEvent::frame_skipped(session.session_id(), frame_index, reason))?;
    Ok(())
}

/// Stop the session and report its final state
pub(crate) fn finish(sink: &dyn CaptionSink, session: &mut CaptionSession) -> Result<SessionStats> {
    session.stop();
    let stats = session.stats();
    sink.emit(CaptionEvent::session_stopped(
        session.session_id(),
        session.render(),
        stats,
    ))?;
    sink.close()?;
    Ok(stats)
}

/// Blocking, single-threaded frame loop
///
/// Every frame is extracted, buffered, and (when the window is full)
/// classified and stabilized before the next frame is accepted.
pub struct FrameLoop<E, C> {
    session: CaptionSession,
    extractor: E,
    classifier: C,
    sink: Arc<dyn CaptionSink>,
    stop: StopHandle,
}

impl<E, C> FrameLoop<E, C>
where
    E: FeatureExtractor,
    C: Classifier,
{
    pub fn new(session: CaptionSession, extractor: E, classifier: C) -> Self {
        Self {
            session,
            extractor,
            classifier,
            sink: Arc::new(NullSink),
            stop: StopHandle::new(),
        }
    }

    /// Deliver caption events to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn CaptionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Handle that stops the loop at the next iteration boundary
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn session(&self) -> &CaptionSession {
        &self.session
    }

    /// Take the session back (for final display after the loop)
    pub fn into_session(self) -> CaptionSession {
        self.session
    }

    /// Start the session
    pub fn start(&mut self) -> Result<()> {
        self.session.start()?;
        tracing::debug!(
            "Session {} classifying with {}",
            self.session.session_id(),
            self.classifier.name()
        );
        self.sink
            .emit(CaptionEvent::session_started(self.session.session_id()))?;
        Ok(())
    }

    /// Push one read into the session; returns the caption after it
    ///
    /// Any error other than a capture failure stops the session before it
    /// is returned.
    pub fn push(&mut self, read: FrameRead<E::Frame>) -> Result<Option<String>> {
        let result = match read {
            FrameRead::Frame(frame) => self.process_frame(&frame).map(Some),
            FrameRead::Skipped(reason) => {
                record_skip(self.sink.as_ref(), &mut self.session, &reason).map(|_| None)
            }
            FrameRead::End => Ok(None),
        };
        self.abort_on_error(result)
    }

    fn process_frame(&mut self, frame: &E::Frame) -> Result<String> {
        let vector = self.extractor.extract(frame)?;
        let outcome = self.session.process_features(vector, &self.classifier)?;
        if let Some(decision) = &outcome.decision {
            emit_decision(self.sink.as_ref(), &self.session, decision)?;
        }
        Ok(outcome.caption)
    }

    fn abort_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::error!("Session {} aborted: {}", self.session.session_id(), e);
            self.session.stop();
        }
        result
    }

    /// Stop the session and emit the final event
    pub fn finish(&mut self) -> Result<SessionStats> {
        finish(self.sink.as_ref(), &mut self.session)
    }

    /// Run until the source ends or the stop handle fires
    ///
    /// The session is stopped and `session_stopped` emitted on every exit,
    /// including an abort; the abort error is the one returned.
    pub fn run<S, P>(&mut self, source: &mut S, presenter: &mut P) -> Result<SessionStats>
    where
        S: FrameSource<Frame = E::Frame>,
        P: CaptionPresenter<E::Frame>,
    {
        self.start()?;
        let result = self.drive(source, presenter);
        let finished = self.finish();
        result?;
        finished
    }

    fn drive<S, P>(&mut self, source: &mut S, presenter: &mut P) -> Result<()>
    where
        S: FrameSource<Frame = E::Frame>,
        P: CaptionPresenter<E::Frame>,
    {
        while !self.stop.is_stopped() {
            match source.next_frame() {
                FrameRead::End => break,
                FrameRead::Skipped(reason) => {
                    self.push(FrameRead::Skipped(reason.clone()))?;
                    presenter.warn(&reason);
                }
                FrameRead::Frame(frame) => {
                    let result = self.process_frame(&frame);
                    let caption = self.abort_on_error(result)?;
                    presenter.present(&frame, &caption);
                }
            }
        }
        Ok(())
    }
}
