//! Whole-image conversion: decode, separate, write TIFF.

use std::path::Path;

use crate::converter::RgbToCmykConverter;
use crate::error::Result;
use crate::image_input::load_rgb16;
use crate::tiff_writer::{TiffOptions, write_cmyk_tiff};
use crate::transform::CMYK_CHANNELS;

/// What [`convert_image_file`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReport {
    pub width: u32,
    pub height: u32,
    pub pixels: usize,
    pub stats: [ChannelStats; CMYK_CHANNELS],
}

/// Min / max / mean of one output channel, in 16-bit units.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct ChannelStats {
    pub min: u16,
    pub max: u16,
    pub mean: f64,
}

/// Per-channel statistics over interleaved CMYK samples.
pub fn channel_stats(cmyk: &[u16]) -> [ChannelStats; CMYK_CHANNELS] {
    let mut min = [u16::MAX; CMYK_CHANNELS];
    let mut max = [0u16; CMYK_CHANNELS];
    let mut sum = [0u64; CMYK_CHANNELS];
    let mut n = 0u64;

    for px in cmyk.chunks_exact(CMYK_CHANNELS) {
        for (ch, &v) in px.iter().enumerate() {
            min[ch] = min[ch].min(v);
            max[ch] = max[ch].max(v);
            sum[ch] += u64::from(v);
        }
        n += 1;
    }

    let mut out = [ChannelStats::default(); CMYK_CHANNELS];
    if n == 0 {
        return out;
    }
    for ch in 0..CMYK_CHANNELS {
        out[ch] = ChannelStats {
            min: min[ch],
            max: max[ch],
            mean: sum[ch] as f64 / n as f64,
        };
    }
    out
}

/// Convert one image file into a CMYK TIFF carrying the destination profile.
pub fn convert_image_file(
    converter: &RgbToCmykConverter,
    input: &Path,
    output: &Path,
    options: &TiffOptions,
) -> Result<ImageReport> {
    // Fail before decoding if the converter is unusable.
    let icc = converter.destination_icc()?;

    let rgb = load_rgb16(input)?;
    let (w, h) = (rgb.width as usize, rgb.height as usize);

    let mut cmyk = vec![0u16; rgb.pixel_count() * CMYK_CHANNELS];
    converter.convert_rows(&rgb.samples, &mut cmyk, w, h)?;

    write_cmyk_tiff(output, rgb.width, rgb.height, &cmyk, Some(&icc), options)?;

    Ok(ImageReport {
        width: rgb.width,
        height: rgb.height,
        pixels: rgb.pixel_count(),
        stats: channel_stats(&cmyk),
    })
}
