//! Best-effort progressive thumbnails.
//!
//! The orchestrator decides whether a custom thumbnail can be shown at all,
//! hands back a hidden canvas right away, and fills it in the background:
//! first at the requested resolution, then once more at any available
//! quality. Failures never reach the caller; the canvas simply stays hidden.

use std::sync::Arc;

use thumbforge_core::{Dimensions, FormatResolver, MetadataSource, VideoId};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::canvas::Canvas;
use crate::renderer::FrameRenderer;

/// Called with the canvas once a frame has been drawn into it.
pub type ReadyCallback = Box<dyn FnOnce(Canvas) + Send + 'static>;

/// A canvas handed out before its frame is ready.
#[derive(Debug)]
pub struct Thumbnail {
    pub canvas: Canvas,
    task: JoinHandle<bool>,
}

impl Thumbnail {
    /// Wait for the background render. True when the ready callback fired.
    pub async fn finished(self) -> bool {
        match self.task.await {
            Ok(ready) => ready,
            Err(e) => {
                warn!(error = %e, "Thumbnail task did not complete");
                false
            }
        }
    }
}

pub struct ThumbnailOrchestrator {
    renderer: Arc<FrameRenderer>,
    resolver: Arc<dyn FormatResolver>,
    metadata: Arc<dyn MetadataSource>,
}

impl ThumbnailOrchestrator {
    pub fn new(
        renderer: Arc<FrameRenderer>,
        resolver: Arc<dyn FormatResolver>,
        metadata: Arc<dyn MetadataSource>,
    ) -> Self {
        Self {
            renderer,
            resolver,
            metadata,
        }
    }

    pub fn renderer(&self) -> &Arc<FrameRenderer> {
        &self.renderer
    }

    /// Start producing a custom thumbnail for `id`.
    ///
    /// Returns `None` when the caller should keep showing the default
    /// thumbnail: no playable stream, no custom timestamp, or the uploader
    /// chose the original. Otherwise returns a hidden canvas sized to
    /// `dimensions` (reusing `existing` when given) that is filled in the
    /// background; `on_ready` fires once the frame is drawn.
    pub async fn produce_thumbnail(
        &self,
        existing: Option<Canvas>,
        id: &VideoId,
        dimensions: Dimensions,
        forced_timestamp: Option<f64>,
        retain_decode_handle: bool,
        on_ready: ReadyCallback,
    ) -> Option<Thumbnail> {
        if dimensions.width == 0 || dimensions.height == 0 {
            warn!(video_id = %id, %dimensions, "Refusing to produce a thumbnail without a size");
            return None;
        }

        match self.resolver.resolve(id, dimensions, false).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(video_id = %id, "No playable format, keeping default thumbnail");
                return None;
            }
            Err(e) => {
                warn!(video_id = %id, error = %e, "Format resolution failed, keeping default thumbnail");
                return None;
            }
        }

        let timestamp = match forced_timestamp {
            Some(timestamp) => timestamp,
            None => self.custom_timestamp(id).await?,
        };

        let canvas = existing.unwrap_or_default();
        canvas.reset(dimensions);

        let renderer = Arc::clone(&self.renderer);
        let task_canvas = canvas.clone();
        let id = id.clone();
        let task = tokio::spawn(async move {
            fill_canvas(
                renderer,
                task_canvas,
                id,
                dimensions,
                timestamp,
                retain_decode_handle,
                on_ready,
            )
            .await
        });

        Some(Thumbnail { canvas, task })
    }

    /// The submitted custom timestamp, if any. Metadata failures count as none.
    async fn custom_timestamp(&self, id: &VideoId) -> Option<f64> {
        match self.metadata.thumbnail_timestamp(id, false).await {
            Ok(Some(submission)) if !submission.original => Some(submission.timestamp),
            Ok(Some(_)) => {
                debug!(video_id = %id, "Original thumbnail selected");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(video_id = %id, error = %e, "Thumbnail metadata unavailable");
                None
            }
        }
    }
}

async fn fill_canvas(
    renderer: Arc<FrameRenderer>,
    canvas: Canvas,
    id: VideoId,
    dimensions: Dimensions,
    timestamp: f64,
    retain: bool,
    on_ready: ReadyCallback,
) -> bool {
    let frame = match renderer.render(&id, dimensions, retain, timestamp).await {
        Ok(frame) => frame,
        Err(first) => {
            info!(video_id = %id, error = %first, "Full quality render failed, trying any quality");
            match renderer.render(&id, Dimensions::ANY, retain, timestamp).await {
                Ok(frame) => frame,
                Err(e) => {
                    error!(
                        video_id = %id,
                        timestamp,
                        first_error = %first,
                        error = %e,
                        "Thumbnail render failed"
                    );
                    return false;
                }
            }
        }
    };

    let Some(frame) = frame else {
        debug!(video_id = %id, "Stream disappeared before the thumbnail rendered");
        return false;
    };

    if let Err(e) = canvas.draw_frame(&frame) {
        error!(video_id = %id, error = %e, "Failed to composite thumbnail");
        return false;
    }
    on_ready(canvas);
    true
}
