//! Delivery targets for caption events
//!
//! A frame loop owns one `Arc<dyn CaptionSink>` and hands it every event of
//! the session, ending with `session_stopped` followed by `close()`.

use crate::events::CaptionEvent;
use std::io::Write;
use tokio::sync::broadcast;

/// Receives the events of a caption session
pub trait CaptionSink: Send + Sync {
    fn emit(&self, event: CaptionEvent) -> Result<(), CaptionSinkError>;

    /// Called once, after `session_stopped`
    fn close(&self) -> Result<(), CaptionSinkError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptionSinkError {
    #[error("Failed to write event: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Event channel closed: {0}")]
    Channel(String),
}

/// Writes one JSON object per event
///
/// Lines are flushed when the caption changes and when the session stops, so
/// a reader tailing the output sees every caption as soon as it exists while
/// skip and confirmation events can sit in the writer's buffer.
pub struct JsonlSink<W: Write + Send> {
    writer: parking_lot::Mutex<W>,
}

impl<W: Write + Send> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: parking_lot::Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonlSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> CaptionSink for JsonlSink<W> {
    fn emit(&self, event: CaptionEvent) -> Result<(), CaptionSinkError> {
        let line = event.to_jsonl()?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        if matches!(
            event,
            CaptionEvent::CaptionUpdated { .. } | CaptionEvent::SessionStopped { .. }
        ) {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), CaptionSinkError> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

/// Which events a `ChannelSink` forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    /// `caption_updated` and `session_stopped` only; enough to keep a
    /// caption display current
    CaptionChanges,
}

impl EventFilter {
    fn accepts(&self, event: &CaptionEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::CaptionChanges => matches!(
                event,
                CaptionEvent::CaptionUpdated { .. } | CaptionEvent::SessionStopped { .. }
            ),
        }
    }
}

/// Broadcasts events to live subscribers
///
/// Nobody listening is not an error; the event is dropped.
pub struct ChannelSink {
    sender: broadcast::Sender<CaptionEvent>,
    filter: EventFilter,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<CaptionEvent>) {
        Self::filtered(capacity, EventFilter::All)
    }

    /// Channel for caption displays
    pub fn captions_only(capacity: usize) -> (Self, broadcast::Receiver<CaptionEvent>) {
        Self::filtered(capacity, EventFilter::CaptionChanges)
    }

    pub fn filtered(
        capacity: usize,
        filter: EventFilter,
    ) -> (Self, broadcast::Receiver<CaptionEvent>) {
        let (sender, receiver) = broadcast::channel(capacity.max(1));
        (Self { sender, filter }, receiver)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptionEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl CaptionSink for ChannelSink {
    fn emit(&self, event: CaptionEvent) -> Result<(), CaptionSinkError> {
        if !self.filter.accepts(&event) || self.sender.receiver_count() == 0 {
            return Ok(());
        }
        self.sender
            .send(event)
            .map_err(|e| CaptionSinkError::Channel(e.to_string()))?;
        Ok(())
    }
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl CaptionSink for NullSink {
    fn emit(&self, _event: CaptionEvent) -> Result<(), CaptionSinkError> {
        Ok(())
    }
}

impl<S: CaptionSink + ?Sized> CaptionSink for std::sync::Arc<S> {
    fn emit(&self, event: CaptionEvent) -> Result<(), CaptionSinkError> {
        (**self).emit(event)
    }

    fn close(&self) -> Result<(), CaptionSinkError> {
        (**self).close()
    }
}
