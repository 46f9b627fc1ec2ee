//! 16-bit CMYK TIFF output with an embedded ICC profile.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use tiff::encoder::{Compression, Rational, TiffEncoder, TiffValue, colortype};
use tiff::tags::{ResolutionUnit, Tag, Type as TiffType};

use crate::error::{BoxError, Error, Result};
use crate::transform::CMYK_CHANNELS;

/// TIFF tag number of ICCProfile.
pub const TAG_ICC_PROFILE: u16 = 34675;

const PLANAR_CONTIG: u16 = 1;
const ORIENTATION_TOP_LEFT: u16 = 1;

/// Knobs for the TIFF container; pixel format is always CMYK16.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TiffOptions {
    /// Resolution written to X/YResolution, in dots per inch.
    pub dpi: u32,
    pub rows_per_strip: u32,
}

impl Default for TiffOptions {
    fn default() -> Self {
        Self {
            dpi: 300,
            rows_per_strip: 64,
        }
    }
}

/// Ensure ICC tag (34675) is written as TIFF type UNDEFINED (7), not BYTE (1),
/// to satisfy strict validators like JHOVE TIFF-hul.
struct UndefinedBytes<'a>(&'a [u8]);

impl<'a> TiffValue for UndefinedBytes<'a> {
    const BYTE_LEN: u8 = 1;
    const FIELD_TYPE: TiffType = TiffType::UNDEFINED;

    fn count(&self) -> usize {
        self.0.len()
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.0)
    }
}

/// Write `cmyk` (interleaved C, M, Y, K u16 samples, row-major) as an
/// LZW-compressed, 4-sample, 16-bit separated TIFF.
///
/// If the file cannot be created nothing on disk changes. If encoding fails
/// after that, the partially written file is removed.
pub fn write_cmyk_tiff(
    path: &Path,
    width: u32,
    height: u32,
    cmyk: &[u16],
    icc: Option<&[u8]>,
    options: &TiffOptions,
) -> Result<()> {
    let pixels = (width as usize).checked_mul(height as usize);
    let need = pixels.and_then(|p| p.checked_mul(CMYK_CHANNELS));
    let (pixels, need) = match (pixels, need) {
        (Some(p), Some(n)) if cmyk.len() >= n => (p, n),
        (p, n) => {
            return Err(Error::buffer_too_small(
                "CMYK",
                p.unwrap_or(usize::MAX),
                n.unwrap_or(usize::MAX),
                cmyk.len(),
            ));
        }
    };

    let tiff_error = |source: BoxError| Error::TiffWrite {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(|e| tiff_error(Box::new(e)))?;

    if let Err(source) = encode(file, width, height, &cmyk[..need], icc, options) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), "Could not remove partial TIFF: {e}");
        }
        return Err(tiff_error(source));
    }

    tracing::info!(
        path = %path.display(),
        width,
        height,
        pixels,
        icc_bytes = icc.map_or(0, <[u8]>::len),
        "Wrote CMYK TIFF"
    );
    Ok(())
}

fn encode(
    file: File,
    width: u32,
    height: u32,
    cmyk: &[u16],
    icc: Option<&[u8]>,
    options: &TiffOptions,
) -> std::result::Result<(), BoxError> {
    let mut tiff = TiffEncoder::new(BufWriter::new(file))?.with_compression(Compression::Lzw);

    let mut img = tiff.new_image::<colortype::CMYK16>(width, height)?;

    img.resolution_unit(ResolutionUnit::Inch);
    img.x_resolution(Rational { n: options.dpi, d: 1 });
    img.y_resolution(Rational { n: options.dpi, d: 1 });

    let dir = img.encoder();
    dir.write_tag(Tag::PlanarConfiguration, PLANAR_CONTIG)?;
    dir.write_tag(Tag::Orientation, ORIENTATION_TOP_LEFT)?;
    if let Some(icc_bytes) = icc {
        dir.write_tag(Tag::Unknown(TAG_ICC_PROFILE), UndefinedBytes(icc_bytes))?;
    }

    img.rows_per_strip(options.rows_per_strip.max(1))?;

    // write_data compresses strip by strip and finishes the directory.
    img.write_data(cmyk)?;
    Ok(())
}
