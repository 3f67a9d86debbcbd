//! Centered compositing of a native-resolution frame into a fixed-size surface.

use image::RgbaImage;
use image::imageops::{FilterType, replace, resize};
use thumbforge_core::{Dimensions, RenderError};

/// Where a source lands on the destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Horizontal offset; negative when the scaled source is wider than the destination.
    pub offset_x: f64,
    pub width: f64,
    pub height: f64,
}

/// Scale `source` to the destination height and center it horizontally.
pub fn centered_placement(destination: Dimensions, source: Dimensions) -> Result<Placement, RenderError> {
    for dims in [destination, source] {
        if dims.width == 0 || dims.height == 0 {
            return Err(RenderError::InvalidDimensions {
                width: dims.width,
                height: dims.height,
            });
        }
    }

    let height = destination.height as f64;
    let width = height * source.width as f64 / source.height as f64;
    Ok(Placement {
        offset_x: (destination.width as f64 - width) / 2.0,
        width,
        height,
    })
}

/// Copy `source` into `destination`, filling its height and cropping or
/// padding the width symmetrically.
pub fn draw_centered(
    destination: &mut RgbaImage,
    dest_width: u32,
    dest_height: u32,
    src_width: u32,
    src_height: u32,
    source: &RgbaImage,
) -> Result<Placement, RenderError> {
    let placement = centered_placement(
        Dimensions::new(dest_width, dest_height),
        Dimensions::new(src_width, src_height),
    )?;

    let scaled_w = placement.width.round().max(1.0) as u32;
    let scaled_h = placement.height.round().max(1.0) as u32;
    let scaled = resize(source, scaled_w, scaled_h, FilterType::Triangle);
    replace(destination, &scaled, placement.offset_x.round() as i64, 0);
    Ok(placement)
}
