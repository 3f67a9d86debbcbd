//! Structured logging for thumbforge.
//!
//! Handles subscriber setup, stream URL redaction, and render lifecycle events.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{RenderEvent, RenderEventEntry, RenderEventLogger};
pub use logger::init_logger;
pub use redact::redact_stream_url;
