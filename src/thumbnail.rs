//! Occupancy-grid thumbnails.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat};

use crate::error::UploadError;

/// Largest thumbnail edge, in pixels.
pub const THUMBNAIL_MAX_EDGE: u32 = 400;

/// Size of a `width` x `height` raster scaled to fit a `max` x `max` box.
///
/// Aspect ratio is kept up to integer rounding. Rasters already inside the
/// box are not enlarged.
pub fn thumbnail_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let (w, h, m) = (width as u64, height as u64, max as u64);
    if w >= h {
        let scaled = ((h * m + w / 2) / w).max(1);
        (max, scaled as u32)
    } else {
        let scaled = ((w * m + h / 2) / h).max(1);
        (scaled as u32, max)
    }
}

/// Decode a PNG grid and encode a binary PNM thumbnail of it.
pub fn generate(png: &[u8]) -> Result<Vec<u8>, UploadError> {
    let img = image::load_from_memory_with_format(png, ImageFormat::Png)?;
    let (w, h) = thumbnail_dimensions(img.width(), img.height(), THUMBNAIL_MAX_EDGE);
    let resized = if (w, h) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(w, h, FilterType::Triangle)
    };

    // PNM carries no alpha channel and at most 8 bits for our purposes.
    let thumb = match resized.color() {
        ColorType::L8 | ColorType::Rgb8 => resized,
        ColorType::L16 | ColorType::La8 | ColorType::La16 => {
            DynamicImage::ImageLuma8(resized.to_luma8())
        }
        _ => DynamicImage::ImageRgb8(resized.to_rgb8()),
    };

    let mut out = Cursor::new(Vec::new());
    thumb.write_to(&mut out, ImageFormat::Pnm)?;
    Ok(out.into_inner())
}
