//! Render Event Logger
//!
//! Lifecycle events of frame renders (cache hits, coalescing, retries,
//! failures) written through `tracing` under the `render_events` target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::redact::redact_stream_url;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderEvent {
    CacheHit {
        width: u32,
        height: u32,
    },
    Coalesced {
        width: u32,
        height: u32,
    },
    Reused {
        width: u32,
        height: u32,
    },
    DecodeStarted {
        url: String,
        attempt: u32,
    },
    Rendered {
        width: u32,
        height: u32,
        elapsed_ms: u64,
        quality: &'static str,
    },
    Retrying {
        attempt: u32,
        error_msg: String,
    },
    Superseded,
    Failed {
        attempts: u32,
    },
}

impl RenderEvent {
    fn is_problem(&self) -> bool {
        matches!(self, RenderEvent::Retrying { .. } | RenderEvent::Failed { .. })
    }
}

#[derive(Debug, Serialize)]
pub struct RenderEventEntry {
    pub video_id: String,
    pub timestamp_secs: f64,
    pub logged_at: DateTime<Utc>,
    pub event: RenderEvent,
}

pub struct RenderEventLogger;

impl RenderEventLogger {
    /// Logs a render lifecycle event; stream URLs are redacted first.
    pub fn log_event(video_id: &str, timestamp_secs: f64, mut event: RenderEvent) -> RenderEventEntry {
        if let RenderEvent::DecodeStarted { url, .. } = &mut event {
            *url = redact_stream_url(url);
        }

        let entry = RenderEventEntry {
            video_id: video_id.into(),
            timestamp_secs,
            logged_at: Utc::now(),
            event,
        };

        if entry.event.is_problem() {
            warn!(target: "render_events", event = ?entry, "Render event");
        } else {
            info!(target: "render_events", event = ?entry, "Render event");
        }
        entry
    }
}
