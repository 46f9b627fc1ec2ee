//! RGB16 -> CMYK16 transform construction and application.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use clap::ValueEnum;
use lcms2::{DisallowCache, Flags, GlobalContext, Intent, PixelFormat, Transform};
use rgb::RGB16;

use crate::error::{Error, Result};
use crate::profile::{ColorProfile, HandleToken, ProfileRole};

/// Samples per pixel on the input side.
pub const RGB_CHANNELS: usize = 3;
/// Samples per pixel on the output side.
pub const CMYK_CHANNELS: usize = 4;

/// One 16-bit CMYK pixel, laid out as the engine's `CMYK_16` format.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Cmyk16 {
    pub c: u16,
    pub m: u16,
    pub y: u16,
    pub k: u16,
}

impl Cmyk16 {
    pub const fn new(c: u16, m: u16, y: u16, k: u16) -> Self {
        Self { c, m, y, k }
    }

    /// Channel values as percentages of full ink.
    pub fn percentages(&self) -> [f64; 4] {
        [self.c, self.m, self.y, self.k].map(|v| f64::from(v) * 100.0 / 65535.0)
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum RenderIntent {
    #[default]
    Perceptual,
    #[value(name = "relative")]
    RelativeColorimetric,
    Saturation,
    #[value(name = "absolute")]
    AbsoluteColorimetric,
}

impl From<RenderIntent> for Intent {
    fn from(v: RenderIntent) -> Self {
        match v {
            RenderIntent::Perceptual => Intent::Perceptual,
            RenderIntent::RelativeColorimetric => Intent::RelativeColorimetric,
            RenderIntent::Saturation => Intent::Saturation,
            RenderIntent::AbsoluteColorimetric => Intent::AbsoluteColorimetric,
        }
    }
}

impl fmt::Display for RenderIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RenderIntent::Perceptual => "perceptual",
            RenderIntent::RelativeColorimetric => "relative colorimetric",
            RenderIntent::Saturation => "saturation",
            RenderIntent::AbsoluteColorimetric => "absolute colorimetric",
        };
        f.write_str(s)
    }
}

/// Intent and quality flags fixed into a transform at build time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    pub intent: RenderIntent,
    /// Black Point Compensation (BPC).
    pub black_point_compensation: bool,
    /// Precalculate the device link on a denser grid.
    pub high_res_precalc: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            intent: RenderIntent::Perceptual,
            black_point_compensation: true,
            high_res_precalc: true,
        }
    }
}

impl TransformOptions {
    fn engine_flags(&self) -> Flags<DisallowCache> {
        // No single-pixel cache: the transform is shared across rayon workers.
        let mut flags = Flags::NO_CACHE;
        if self.black_point_compensation {
            flags = flags | Flags::BLACKPOINT_COMPENSATION;
        }
        if self.high_res_precalc {
            flags = flags | Flags::HIGHRES_PRECALC;
        }
        flags
    }
}

/// A built RGB_16 -> CMYK_16 transform.
///
/// Holds no mutable state while converting, so `&ColorTransform` may be used
/// from several threads on disjoint buffers.
pub struct ColorTransform {
    inner: Transform<RGB16, Cmyk16, GlobalContext, DisallowCache>,
    options: TransformOptions,
    _token: HandleToken,
}

impl ColorTransform {
    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Convert `src` into the first `src.len()` pixels of `dst` in one
    /// batched engine call.
    pub fn apply(&self, src: &[RGB16], dst: &mut [Cmyk16]) -> Result<()> {
        if dst.len() < src.len() {
            return Err(Error::buffer_too_small(
                "output",
                src.len(),
                src.len() * CMYK_CHANNELS,
                dst.len() * CMYK_CHANNELS,
            ));
        }
        if src.is_empty() {
            return Ok(());
        }

        // The engine takes a u32 pixel count.
        let max = u32::MAX as usize;
        for (s, d) in src.chunks(max).zip(dst[..src.len()].chunks_mut(max)) {
            self.inner.transform_pixels(s, d);
        }
        Ok(())
    }
}

impl fmt::Debug for ColorTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorTransform")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Drop for ColorTransform {
    fn drop(&mut self) {
        tracing::trace!("Releasing transform");
    }
}

fn check_role(profile: &ColorProfile, role: ProfileRole) -> Result<()> {
    let expected = role.expected_color_space();
    let actual = profile.color_space();
    if actual != expected {
        return Err(Error::TransformCreation {
            reason: format!(
                "{role} profile {} describes {actual:?}, expected {expected:?}",
                profile.origin()
            ),
            source: None,
        });
    }
    Ok(())
}

/// Combine a source RGB and a destination CMYK profile into a transform.
pub fn build_transform(
    source: &ColorProfile,
    destination: &ColorProfile,
    options: &TransformOptions,
) -> Result<ColorTransform> {
    check_role(source, ProfileRole::Source)?;
    check_role(destination, ProfileRole::Destination)?;

    let inner = Transform::new_flags_context(
        GlobalContext::new(),
        source.engine(),
        PixelFormat::RGB_16,
        destination.engine(),
        PixelFormat::CMYK_16,
        options.intent.into(),
        options.engine_flags(),
    )
    .map_err(|e| Error::TransformCreation {
        reason: format!(
            "engine refused {} -> {} ({})",
            source.origin(),
            destination.origin(),
            options.intent
        ),
        source: Some(e),
    })?;

    tracing::debug!(
        intent = %options.intent,
        bpc = options.black_point_compensation,
        high_res = options.high_res_precalc,
        "Built RGB_16 -> CMYK_16 transform"
    );

    Ok(ColorTransform {
        inner,
        options: *options,
        _token: HandleToken::acquire(),
    })
}

/// Stretch an 8-bit sample over the full 16-bit range (`v * 257`).
#[inline]
pub fn promote_8_to_16(v: u8) -> u16 {
    u16::from(v) * 257
}

/// Promote interleaved 8-bit samples to 16-bit. Linear, not gamma aware.
pub fn promote_rgb8(samples: &[u8]) -> Vec<u16> {
    samples.iter().copied().map(promote_8_to_16).collect()
}
