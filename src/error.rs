//! Error types for sepcon

use std::path::PathBuf;

use thiserror::Error;

use crate::converter::ConverterState;
use crate::profile::ProfileRole;

/// Boxed error used where the underlying cause comes from more than one crate.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for sepcon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading profiles, building transforms,
/// converting pixels or writing output.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A profile file is missing, unreadable or not a valid ICC profile.
    #[error("failed to load {role} profile from {}: {source}", path.display())]
    ProfileLoad {
        role: ProfileRole,
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Both profiles loaded, but the engine cannot connect them.
    #[error("cannot build RGB -> CMYK transform: {reason}")]
    TransformCreation {
        reason: String,
        #[source]
        source: Option<lcms2::Error>,
    },

    /// The engine could not serialize a loaded profile back to ICC bytes.
    #[error("failed to serialize {role} profile {origin}: {source}")]
    ProfileSerialize {
        role: ProfileRole,
        origin: String,
        #[source]
        source: lcms2::Error,
    },

    /// Conversion requested before a transform was built.
    #[error("converter is not ready (state: {state})")]
    TransformNotReady { state: ConverterState },

    /// `initialize` called on a converter that already left `Uninitialized`.
    #[error("converter cannot be initialized from the {state} state")]
    InvalidState { state: ConverterState },

    /// A caller-supplied buffer cannot hold the requested pixels.
    #[error("{buffer} buffer too small: {pixels} pixels need {required} samples, got {actual}")]
    BufferTooSmall {
        buffer: &'static str,
        pixels: usize,
        required: usize,
        actual: usize,
    },

    /// Source image could not be opened or decoded.
    #[error("failed to decode image {}: {source}", path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// TIFF output could not be created or written.
    #[error("failed to write TIFF {}: {source}", path.display())]
    TiffWrite {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn buffer_too_small(
        buffer: &'static str,
        pixels: usize,
        required: usize,
        actual: usize,
    ) -> Self {
        Error::BufferTooSmall {
            buffer,
            pixels,
            required,
            actual,
        }
    }
}
