use image::RgbaImage;
use thumbforge_core::{Dimensions, RenderKey, VideoId};

/// A frame extracted at the decoder's native resolution.
///
/// Shared as `Arc<RenderedFrame>`; every coalesced caller receives the same
/// instance.
#[derive(Debug)]
pub struct RenderedFrame {
    pub video_id: VideoId,
    pub timestamp: f64,
    pub image: RgbaImage,
}

impl RenderedFrame {
    pub fn new(video_id: VideoId, timestamp: f64, image: RgbaImage) -> Self {
        Self {
            video_id,
            timestamp,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    /// Cache key of the rendered entry holding this frame.
    pub fn key(&self) -> RenderKey {
        RenderKey::new(self.dimensions(), self.timestamp)
    }
}
