//! The RGB -> CMYK converter and its lifecycle.
//!
//! ```text
//! Uninitialized --initialize--> Loading --ok--> Ready
//!                                  \---err--> Failed (terminal)
//! ```
//!
//! A failed converter cannot be retried; build a new one.

use std::fmt;

use rayon::prelude::*;
use rgb::{FromSlice, RGB16};

use crate::error::{Error, Result};
use crate::profile::{ColorProfile, ProfileRole, ProfileSource};
use crate::transform::{
    CMYK_CHANNELS, Cmyk16, ColorTransform, RGB_CHANNELS, TransformOptions, build_transform,
};

/// Rows handed to one rayon task by [`RgbToCmykConverter::convert_rows`].
pub const ROWS_PER_BAND: usize = 64;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConverterState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for ConverterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConverterState::Uninitialized => "uninitialized",
            ConverterState::Loading => "loading",
            ConverterState::Ready => "ready",
            ConverterState::Failed => "failed",
        };
        f.write_str(s)
    }
}

// Field order is drop order: transform first, then the profiles.
struct Pipeline {
    transform: ColorTransform,
    source: ColorProfile,
    destination: ColorProfile,
}

impl Pipeline {
    fn build(
        source: &ProfileSource,
        destination: &ProfileSource,
        options: &TransformOptions,
    ) -> Result<Self> {
        let source = ColorProfile::load(source, ProfileRole::Source)?;
        let destination = ColorProfile::load(destination, ProfileRole::Destination)?;
        let transform = build_transform(&source, &destination, options)?;
        Ok(Pipeline {
            transform,
            source,
            destination,
        })
    }
}

/// Converts interleaved 16-bit RGB samples into interleaved 16-bit CMYK.
pub struct RgbToCmykConverter {
    state: ConverterState,
    pipeline: Option<Pipeline>,
}

impl Default for RgbToCmykConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl RgbToCmykConverter {
    /// An uninitialized converter. Call [`initialize`](Self::initialize) before converting.
    pub fn new() -> Self {
        Self {
            state: ConverterState::Uninitialized,
            pipeline: None,
        }
    }

    /// Load both profiles and build the transform in one step.
    pub fn open(
        source: impl Into<ProfileSource>,
        destination: impl Into<ProfileSource>,
        options: &TransformOptions,
    ) -> Result<Self> {
        let mut converter = Self::new();
        converter.initialize(source, destination, options)?;
        Ok(converter)
    }

    /// Load the source and destination profiles and build the transform.
    ///
    /// On any failure the converter moves to [`ConverterState::Failed`] and
    /// every handle acquired so far has already been released.
    pub fn initialize(
        &mut self,
        source: impl Into<ProfileSource>,
        destination: impl Into<ProfileSource>,
        options: &TransformOptions,
    ) -> Result<()> {
        if self.state != ConverterState::Uninitialized {
            return Err(Error::InvalidState { state: self.state });
        }
        self.state = ConverterState::Loading;

        match Pipeline::build(&source.into(), &destination.into(), options) {
            Ok(pipeline) => {
                tracing::debug!(
                    source = %pipeline.source.origin(),
                    destination = %pipeline.destination.origin(),
                    "Converter ready"
                );
                self.pipeline = Some(pipeline);
                self.state = ConverterState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = ConverterState::Failed;
                Err(e)
            }
        }
    }

    pub fn state(&self) -> ConverterState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConverterState::Ready
    }

    fn ready(&self) -> Result<&Pipeline> {
        match (self.state, self.pipeline.as_ref()) {
            (ConverterState::Ready, Some(p)) => Ok(p),
            (state, _) => Err(Error::TransformNotReady { state }),
        }
    }

    pub fn transform(&self) -> Result<&ColorTransform> {
        Ok(&self.ready()?.transform)
    }

    pub fn options(&self) -> Option<&TransformOptions> {
        self.pipeline.as_ref().map(|p| p.transform.options())
    }

    pub fn source_profile(&self) -> Option<&ColorProfile> {
        self.pipeline.as_ref().map(|p| &p.source)
    }

    pub fn destination_profile(&self) -> Option<&ColorProfile> {
        self.pipeline.as_ref().map(|p| &p.destination)
    }

    /// Destination profile serialized for embedding.
    pub fn destination_icc(&self) -> Result<Vec<u8>> {
        self.ready()?.destination.icc_bytes()
    }

    /// Convert `pixel_count` pixels from `rgb` (3 samples each) into `cmyk`
    /// (4 samples each).
    ///
    /// All checks run before the engine is called, so on error `cmyk` is
    /// untouched. Samples past `pixel_count` are left as they were.
    pub fn convert(&self, rgb: &[u16], cmyk: &mut [u16], pixel_count: usize) -> Result<()> {
        let pipeline = self.ready()?;
        let (src, dst) = split_buffers(rgb, cmyk, pixel_count)?;
        tracing::trace!(pixel_count, "Converting");
        pipeline.transform.apply(src, dst)
    }

    /// Typed variant of [`convert`](Self::convert); converts `src.len()` pixels.
    pub fn convert_pixels(&self, src: &[RGB16], dst: &mut [Cmyk16]) -> Result<()> {
        self.ready()?.transform.apply(src, dst)
    }

    /// Convert and return a freshly allocated CMYK buffer.
    pub fn convert_to_vec(&self, rgb: &[u16], pixel_count: usize) -> Result<Vec<u16>> {
        self.ready()?;
        let len = pixel_count
            .checked_mul(CMYK_CHANNELS)
            .ok_or_else(|| Error::buffer_too_small("output", pixel_count, usize::MAX, 0))?;
        if rgb.len() < pixel_count * RGB_CHANNELS {
            return Err(Error::buffer_too_small(
                "input",
                pixel_count,
                pixel_count * RGB_CHANNELS,
                rgb.len(),
            ));
        }
        let mut cmyk = vec![0u16; len];
        self.convert(rgb, &mut cmyk, pixel_count)?;
        Ok(cmyk)
    }

    /// Convert a `width` x `height` image, splitting it into row bands that
    /// are converted in parallel with the same transform.
    ///
    /// Produces exactly what [`convert`](Self::convert) would for
    /// `width * height` pixels.
    pub fn convert_rows(
        &self,
        rgb: &[u16],
        cmyk: &mut [u16],
        width: usize,
        height: usize,
    ) -> Result<()> {
        let transform = &self.ready()?.transform;
        let Some(pixel_count) = width.checked_mul(height) else {
            return Err(Error::buffer_too_small("input", usize::MAX, usize::MAX, rgb.len()));
        };
        let (src, dst) = split_buffers(rgb, cmyk, pixel_count)?;
        if pixel_count == 0 {
            return Ok(());
        }

        let band = width * ROWS_PER_BAND;
        tracing::trace!(width, height, band_rows = ROWS_PER_BAND, "Converting in row bands");
        src.par_chunks(band)
            .zip(dst.par_chunks_mut(band))
            .try_for_each(|(s, d)| transform.apply(s, d))
    }
}

impl fmt::Debug for RgbToCmykConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgbToCmykConverter")
            .field("state", &self.state)
            .field("source", &self.source_profile())
            .field("destination", &self.destination_profile())
            .finish()
    }
}

fn split_buffers<'a, 'b>(
    rgb: &'a [u16],
    cmyk: &'b mut [u16],
    pixel_count: usize,
) -> Result<(&'a [RGB16], &'b mut [Cmyk16])> {
    // Overflowing counts can never fit a real buffer.
    let need_in = pixel_count.checked_mul(RGB_CHANNELS).unwrap_or(usize::MAX);
    let need_out = pixel_count.checked_mul(CMYK_CHANNELS).unwrap_or(usize::MAX);
    if rgb.len() < need_in {
        return Err(Error::buffer_too_small("input", pixel_count, need_in, rgb.len()));
    }
    if cmyk.len() < need_out {
        return Err(Error::buffer_too_small("output", pixel_count, need_out, cmyk.len()));
    }
    Ok((
        rgb[..need_in].as_rgb(),
        bytemuck::cast_slice_mut(&mut cmyk[..need_out]),
    ))
}
