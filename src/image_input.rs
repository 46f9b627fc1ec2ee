//! Decoding source images into interleaved 16-bit RGB.

use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::error::{Error, Result};
use crate::transform::promote_rgb8;

/// A decoded image, 3 u16 samples per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage16 {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<u16>,
}

impl RgbImage16 {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Decode `path` (PNG, JPEG, TIFF) and drop alpha.
///
/// 8-bit sources are promoted with `v * 257`; deeper sources are converted
/// straight to 16 bits.
pub fn load_rgb16(path: &Path) -> Result<RgbImage16> {
    let decode_error = |source| Error::ImageDecode {
        path: path.to_path_buf(),
        source,
    };

    // Disable image crate decoding limits (huge scans)
    let mut reader = image::ImageReader::open(path)
        .map_err(|e| decode_error(image::ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| decode_error(image::ImageError::IoError(e)))?;
    reader.no_limits();

    let img = reader.decode().map_err(decode_error)?;
    Ok(to_rgb16(&img))
}

/// Flatten an already decoded image into 16-bit RGB samples.
pub fn to_rgb16(img: &DynamicImage) -> RgbImage16 {
    let (width, height) = img.dimensions();
    let color = img.color();
    let eight_bit = color.bytes_per_pixel() / color.channel_count() == 1;

    let samples = if eight_bit {
        promote_rgb8(img.to_rgb8().as_raw())
    } else {
        img.to_rgb16().into_raw()
    };

    tracing::debug!(width, height, ?color, "Decoded source image");

    RgbImage16 {
        width,
        height,
        samples,
    }
}
