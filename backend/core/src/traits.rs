use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;

use crate::types::{Dimensions, StreamFormat, ThumbnailTimestamp, VideoId};

/// Resolves which playable stream to decode for a video.
#[async_trait]
pub trait FormatResolver: Send + Sync {
    /// Return a stream for `dimensions`, or `None` if nothing playable exists.
    ///
    /// `force_fresh` must bypass any resolver-side cache so a failed stream
    /// endpoint can be replaced by a new one.
    async fn resolve(
        &self,
        id: &VideoId,
        dimensions: Dimensions,
        force_fresh: bool,
    ) -> Result<Option<StreamFormat>>;
}

/// Source of custom thumbnail timestamps.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn thumbnail_timestamp(
        &self,
        id: &VideoId,
        include_unsubmitted: bool,
    ) -> Result<Option<ThumbnailTimestamp>>;
}

/// Discrete completion signals delivered by a decode session.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    /// Frame data is available at the start position.
    Loaded,
    /// A seek requested through [`DecodeSession::seek`] finished.
    Seeked,
    Error(String),
}

/// Readiness snapshot of a decode session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub has_current_frame: bool,
    pub seeking: bool,
}

impl PlaybackState {
    pub fn is_ready(&self) -> bool {
        self.has_current_frame && !self.seeking
    }
}

/// Opens decode sessions for stream URLs.
#[async_trait]
pub trait DecodeBackend: Send + Sync {
    async fn open(&self, url: &str, start_time: f64) -> Result<Box<dyn DecodeSession>>;
}

/// One live decode pipeline for one stream.
///
/// Sessions run out of band; callers observe them through events and
/// readiness polling.
#[async_trait]
pub trait DecodeSession: Send {
    /// Wait for the next event. Pends indefinitely when nothing is in flight.
    async fn next_event(&mut self) -> DecodeEvent;

    fn state(&self) -> PlaybackState;

    /// Start seeking to `time`; completion is reported as [`DecodeEvent::Seeked`].
    fn seek(&mut self, time: f64);

    /// Native resolution of the decoded stream. Zero until data has loaded.
    fn native_dimensions(&self) -> Dimensions;

    /// Copy the current frame at native resolution.
    fn capture(&self) -> Result<RgbaImage>;

    /// Stop decoding and free backend resources. Must be idempotent.
    fn release(&mut self);
}
