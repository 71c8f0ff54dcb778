//! Tokio frame loop
//!
//! Frames arrive over an mpsc channel; a watch channel carries the stop
//! signal. Full windows are classified on the blocking pool so capture can
//! keep feeding the window buffer, with at most `max_in_flight`
//! classifications outstanding. Results are applied strictly in the order
//! their windows were produced.

use super::{emit_decision, finish, record_skip, FrameRead};
use crate::classifier::{Classifier, ProbabilityVector};
use crate::error::{Error, Result};
use crate::events::CaptionEvent;
use crate::features::FeatureExtractor;
use crate::session::CaptionSession;
use crate::sink::{CaptionSink, NullSink};
use futures::stream::{FuturesOrdered, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

type Classification = JoinHandle<Result<ProbabilityVector>>;

/// Frame loop running on the tokio runtime
pub struct AsyncFrameLoop<E> {
    session: CaptionSession,
    extractor: E,
    classifier: Arc<dyn Classifier>,
    sink: Arc<dyn CaptionSink>,
    max_in_flight: usize,
}

impl<E> AsyncFrameLoop<E>
where
    E: FeatureExtractor,
    E::Frame: Send,
{
    pub fn new(session: CaptionSession, extractor: E, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            session,
            extractor,
            classifier,
            sink: Arc::new(NullSink),
            max_in_flight: 1,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn CaptionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Bound on concurrent classifications (at least 1)
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn session(&self) -> &CaptionSession {
        &self.session
    }

    /// Spawn the loop onto the current runtime
    pub fn spawn(self, channel_capacity: usize) -> AsyncFrameLoopHandle<E::Frame>
    where
        E: Send + 'static,
        E::Frame: 'static,
    {
        let (frame_tx, frame_rx) = mpsc::channel(channel_capacity.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(frame_rx, stop_rx));

        AsyncFrameLoopHandle {
            frames: frame_tx,
            stop: AsyncStopHandle {
                stop: Arc::new(stop_tx),
            },
            task,
        }
    }

    /// Run until the frame channel closes, an `End` read arrives, or `stop`
    /// turns true
    ///
    /// Classifications already dispatched are drained and applied before the
    /// session stops. Returns the stopped session so its caption stays
    /// readable.
    pub async fn run(
        mut self,
        mut frames: mpsc::Receiver<FrameRead<E::Frame>>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<CaptionSession> {
        self.session.start()?;
        self.sink
            .emit(CaptionEvent::session_started(self.session.session_id()))?;
        tracing::debug!(
            "Session {} classifying with {} (max {} in flight)",
            self.session.session_id(),
            self.classifier.name(),
            self.max_in_flight
        );

        let result = self.drive(&mut frames, &mut stop).await;
        if let Err(e) = &result {
            tracing::error!("Session {} aborted: {}", self.session.session_id(), e);
        }

        let finished = finish(self.sink.as_ref(), &mut self.session);
        result?;
        finished?;
        Ok(self.session)
    }

    async fn drive(
        &mut self,
        frames: &mut mpsc::Receiver<FrameRead<E::Frame>>,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let mut pending: FuturesOrdered<Classification> = FuturesOrdered::new();
        let mut stop_open = true;

        loop {
            if *stop.borrow() {
                tracing::debug!("Session {} received stop", self.session.session_id());
                break;
            }

            tokio::select! {
                biased;

                changed = stop.changed(), if stop_open => {
                    if changed.is_err() {
                        stop_open = false;
                    }
                }

                Some(joined) = pending.next(), if !pending.is_empty() => {
                    self.apply(joined)?;
                }

                read = frames.recv(), if pending.len() < self.max_in_flight => {
                    match read {
                        None | Some(FrameRead::End) => break,
                        Some(FrameRead::Skipped(reason)) => {
                            record_skip(self.sink.as_ref(), &mut self.session, &reason)?;
                        }
                        Some(FrameRead::Frame(frame)) => {
                            let vector = self.extractor.extract(&frame)?;
                            if let Some(snapshot) = self.session.append_features(vector)? {
                                let classifier = Arc::clone(&self.classifier);
                                pending.push_back(tokio::task::spawn_blocking(move || {
                                    classifier.classify(&snapshot)
                                }));
                            }
                        }
                    }
                }
            }
        }

        if !pending.is_empty() {
            tracing::debug!(
                "Session {} draining {} pending classifications",
                self.session.session_id(),
                pending.len()
            );
        }
        while let Some(joined) = pending.next().await {
            self.apply(joined)?;
        }

        Ok(())
    }

    fn apply(&mut self, joined: std::result::Result<Result<ProbabilityVector>, tokio::task::JoinError>) -> Result<()> {
        let probabilities = joined??;
        let decision = self.session.apply_probabilities(&probabilities)?;
        emit_decision(self.sink.as_ref(), &self.session, &decision)
    }
}

/// Cloneable stop signal for a spawned `AsyncFrameLoop`
#[derive(Debug, Clone)]
pub struct AsyncStopHandle {
    stop: Arc<watch::Sender<bool>>,
}

impl AsyncStopHandle {
    /// Signal the loop to stop at its next iteration boundary
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }
}

/// Producer side of a spawned `AsyncFrameLoop`
pub struct AsyncFrameLoopHandle<F> {
    frames: mpsc::Sender<FrameRead<F>>,
    stop: AsyncStopHandle,
    task: JoinHandle<Result<CaptionSession>>,
}

impl<F> AsyncFrameLoopHandle<F> {
    /// Queue a read; waits while the channel is full
    pub async fn push(&self, read: FrameRead<F>) -> Result<()> {
        self.frames.send(read).await.map_err(|_| Error::InvalidState {
            operation: "push",
            state: "stopped",
        })
    }

    /// Queue a captured frame
    pub async fn push_frame(&self, frame: F) -> Result<()> {
        self.push(FrameRead::Frame(frame)).await
    }

    /// Signal the loop to stop at its next iteration boundary
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Stop signal that outlives this handle
    pub fn stop_handle(&self) -> AsyncStopHandle {
        self.stop.clone()
    }

    /// Close the frame channel and wait for the loop to drain and stop
    pub async fn finish(self) -> Result<CaptionSession> {
        drop(self.frames);
        self.task.await?
    }
}
