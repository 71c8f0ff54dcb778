//! Caption events emitted by the frame loops
//!
//! Serialized as one JSON object per line with a `type` tag.

use crate::session::SessionStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event stream of a caption session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptionEvent {
    /// Session moved to streaming
    SessionStarted {
        ts: DateTime<Utc>,
        session_id: String,
    },

    /// A frame could not be captured or decoded and was skipped
    FrameSkipped {
        ts: DateTime<Utc>,
        session_id: String,
        /// Frame index within the session (counting skipped frames)
        frame_index: u64,
        reason: String,
    },

    /// A window passed the agreement and confidence checks
    LabelConfirmed {
        ts: DateTime<Utc>,
        session_id: String,
        label: String,
        /// Classifier output index of the label
        index: usize,
        confidence: f32,
    },

    /// The rendered caption text changed
    CaptionUpdated {
        ts: DateTime<Utc>,
        session_id: String,
        caption: String,
    },

    /// Session reached its terminal state
    SessionStopped {
        ts: DateTime<Utc>,
        session_id: String,
        caption: String,
        stats: SessionStats,
    },
}

impl CaptionEvent {
    pub fn session_started(session_id: impl Into<String>) -> Self {
        Self::SessionStarted {
            ts: Utc::now(),
            session_id: session_id.into(),
        }
    }

    pub fn frame_skipped(session_id: impl Into<String>, frame_index: u64, reason: impl Into<String>) -> Self {
        Self::FrameSkipped {
            ts: Utc::now(),
            session_id: session_id.into(),
            frame_index,
            reason: reason.into(),
        }
    }

    pub fn label_confirmed(
        session_id: impl Into<String>,
        label: impl Into<String>,
        index: usize,
        confidence: f32,
    ) -> Self {
        Self::LabelConfirmed {
            ts: Utc::now(),
            session_id: session_id.into(),
            label: label.into(),
            index,
            confidence,
        }
    }

    pub fn caption_updated(session_id: impl Into<String>, caption: impl Into<String>) -> Self {
        Self::CaptionUpdated {
            ts: Utc::now(),
            session_id: session_id.into(),
            caption: caption.into(),
        }
    }

    pub fn session_stopped(
        session_id: impl Into<String>,
        caption: impl Into<String>,
        stats: SessionStats,
    ) -> Self {
        Self::SessionStopped {
            ts: Utc::now(),
            session_id: session_id.into(),
            caption: caption.into(),
            stats,
        }
    }

    /// Event type tag as serialized
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::FrameSkipped { .. } => "frame_skipped",
            Self::LabelConfirmed { .. } => "label_confirmed",
            Self::CaptionUpdated { .. } => "caption_updated",
            Self::SessionStopped { .. } => "session_stopped",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionStarted { session_id, .. }
            | Self::FrameSkipped { session_id, .. }
            | Self::LabelConfirmed { session_id, .. }
            | Self::CaptionUpdated { session_id, .. }
            | Self::SessionStopped { session_id, .. } => session_id,
        }
    }

    pub fn is_caption_update(&self) -> bool {
        matches!(self, Self::CaptionUpdated { .. })
    }

    /// Serialize as a single JSONL line (no trailing newline)
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let event = CaptionEvent::caption_updated("s1", "hello thanks");
        let line = event.to_jsonl().unwrap();

        assert!(line.contains("\"type\":\"caption_updated\""));
        assert!(line.contains("\"caption\":\"hello thanks\""));
        assert_eq!(event.event_type(), "caption_updated");
    }

    #[test]
    fn test_roundtrip_stopped_event() {
        let stats = SessionStats {
            frames_received: 40,
            windows_classified: 11,
            ..Default::default()
        };
        let event = CaptionEvent::session_stopped("s2", "hello", stats);

        let parsed: CaptionEvent = serde_json::from_str(&event.to_jsonl().unwrap()).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.session_id(), "s2");
    }
}
