//! Frame extraction, render caching and thumbnail compositing.

pub mod cache;
pub mod canvas;
pub mod compositor;
pub mod ffmpeg;
pub mod frame;
pub mod handle;
pub mod orchestrator;
pub mod renderer;
pub mod retry;

#[cfg(test)]
mod testing;

pub use cache::{CacheStats, RenderCache, RenderEntry};
pub use canvas::Canvas;
pub use compositor::{Placement, centered_placement, draw_centered};
pub use ffmpeg::FfmpegBackend;
pub use frame::RenderedFrame;
pub use handle::DecodeHandle;
pub use orchestrator::{ReadyCallback, Thumbnail, ThumbnailOrchestrator};
pub use renderer::FrameRenderer;
pub use retry::{RetryPolicy, RetryState};
