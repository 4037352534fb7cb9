use std::path::Path;

use egui::ColorImage;
use image::imageops::FilterType;

use crate::constants::THUMBNAIL_EDGE;
use crate::error::Result;

/// Decode an image file and shrink it to a square preview texture.
pub fn load_thumbnail(path: &Path) -> Result<ColorImage> {
    let decoded = image::open(path)?;
    let thumb = decoded.resize_exact(THUMBNAIL_EDGE, THUMBNAIL_EDGE, FilterType::Triangle);
    let rgba = thumb.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(
        size,
        rgba.as_flat_samples().as_slice(),
    ))
}
