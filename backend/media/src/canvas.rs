use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use image::RgbaImage;
use thumbforge_core::{Dimensions, RenderError};

use crate::compositor::{Placement, draw_centered};
use crate::frame::RenderedFrame;

/// Pixels plus visibility of a thumbnail surface.
#[derive(Debug, Default)]
pub struct Surface {
    pub image: RgbaImage,
    pub hidden: bool,
}

/// Shared handle to a thumbnail surface.
///
/// Cloning yields another handle to the same pixels, so the orchestrator can
/// hand the canvas out before the frame is drawn into it.
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    inner: Arc<Mutex<Surface>>,
}

impl Canvas {
    /// A hidden, transparent canvas of `dimensions`.
    pub fn new(dimensions: Dimensions) -> Self {
        let canvas = Self::default();
        canvas.reset(dimensions);
        canvas
    }

    fn surface(&self) -> MutexGuard<'_, Surface> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resize to `dimensions`, clear, and hide.
    pub fn reset(&self, dimensions: Dimensions) {
        let mut surface = self.surface();
        surface.image = RgbaImage::new(dimensions.width, dimensions.height);
        surface.hidden = true;
    }

    pub fn dimensions(&self) -> Dimensions {
        let surface = self.surface();
        Dimensions::new(surface.image.width(), surface.image.height())
    }

    pub fn is_hidden(&self) -> bool {
        self.surface().hidden
    }

    pub fn show(&self) {
        self.surface().hidden = false;
    }

    /// Both handles point at the same surface.
    pub fn same_surface(&self, other: &Canvas) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn snapshot(&self) -> RgbaImage {
        self.surface().image.clone()
    }

    /// Composite `frame` centered into the canvas.
    pub fn draw_frame(&self, frame: &RenderedFrame) -> Result<Placement, RenderError> {
        let mut surface = self.surface();
        let (width, height) = (surface.image.width(), surface.image.height());
        draw_centered(
            &mut surface.image,
            width,
            height,
            frame.width(),
            frame.height(),
            &frame.image,
        )
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.snapshot()
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("Failed to write thumbnail to {}", path.display()))
    }
}
