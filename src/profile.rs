//! ICC profile loading.
//!
//! A [`ColorProfile`] owns exactly one LittleCMS profile handle. The handle is
//! released when the wrapper is dropped, so a loader that bails out halfway
//! (source loaded, destination failed) cannot leak.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use lcms2::{ColorSpaceSignature, InfoType, Locale, Profile, ProfileClassSignature};

use crate::error::{Error, Result};

static LIVE_HANDLES: AtomicUsize = AtomicUsize::new(0);

/// Number of engine handles (profiles and transforms) currently alive.
pub fn live_handle_count() -> usize {
    LIVE_HANDLES.load(Ordering::SeqCst)
}

/// Counts one live engine handle for as long as it exists.
#[derive(Debug)]
pub(crate) struct HandleToken(());

impl HandleToken {
    pub(crate) fn acquire() -> Self {
        LIVE_HANDLES.fetch_add(1, Ordering::SeqCst);
        HandleToken(())
    }
}

impl Drop for HandleToken {
    fn drop(&mut self) {
        LIVE_HANDLES.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Which side of the RGB -> CMYK conversion a profile serves.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProfileRole {
    Source,
    Destination,
}

impl ProfileRole {
    /// Color space a profile in this role must describe.
    pub fn expected_color_space(self) -> ColorSpaceSignature {
        match self {
            ProfileRole::Source => ColorSpaceSignature::RgbData,
            ProfileRole::Destination => ColorSpaceSignature::CmykData,
        }
    }
}

impl fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileRole::Source => write!(f, "source RGB"),
            ProfileRole::Destination => write!(f, "destination CMYK"),
        }
    }
}

/// Where a profile is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSource {
    /// An `.icc`/`.icm` file on disk.
    File(PathBuf),
    /// The engine's built-in sRGB profile.
    Srgb,
}

impl From<&Path> for ProfileSource {
    fn from(p: &Path) -> Self {
        ProfileSource::File(p.to_path_buf())
    }
}

impl From<PathBuf> for ProfileSource {
    fn from(p: PathBuf) -> Self {
        ProfileSource::File(p)
    }
}

impl From<&PathBuf> for ProfileSource {
    fn from(p: &PathBuf) -> Self {
        ProfileSource::File(p.clone())
    }
}

impl From<&str> for ProfileSource {
    fn from(p: &str) -> Self {
        ProfileSource::File(PathBuf::from(p))
    }
}

impl fmt::Display for ProfileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileSource::File(p) => write!(f, "{}", p.display()),
            ProfileSource::Srgb => write!(f, "built-in sRGB"),
        }
    }
}

/// An opened ICC profile, exclusively owned.
pub struct ColorProfile {
    inner: Profile,
    role: ProfileRole,
    origin: ProfileSource,
    _token: HandleToken,
}

impl ColorProfile {
    /// Open a profile from `source` for the given role.
    pub fn load(source: &ProfileSource, role: ProfileRole) -> Result<Self> {
        match source {
            ProfileSource::File(path) => load_profile(path, role),
            ProfileSource::Srgb => {
                tracing::debug!(%role, "Using built-in sRGB profile");
                Ok(Self::from_engine(Profile::new_srgb(), role, ProfileSource::Srgb))
            }
        }
    }

    fn from_engine(inner: Profile, role: ProfileRole, origin: ProfileSource) -> Self {
        Self {
            inner,
            role,
            origin,
            _token: HandleToken::acquire(),
        }
    }

    pub fn role(&self) -> ProfileRole {
        self.role
    }

    pub fn origin(&self) -> &ProfileSource {
        &self.origin
    }

    pub fn color_space(&self) -> ColorSpaceSignature {
        self.inner.color_space()
    }

    pub fn device_class(&self) -> ProfileClassSignature {
        self.inner.device_class()
    }

    /// ICC version as reported in the header, e.g. `2.1` or `4.3`.
    pub fn version(&self) -> f64 {
        self.inner.version()
    }

    /// The profile description tag, if present.
    pub fn description(&self) -> Option<String> {
        self.inner.info(InfoType::Description, Locale::none())
    }

    /// Serialize the profile through the engine, for embedding in output files.
    pub fn icc_bytes(&self) -> Result<Vec<u8>> {
        self.inner.icc().map_err(|source| Error::ProfileSerialize {
            role: self.role,
            origin: self.origin.to_string(),
            source,
        })
    }

    pub(crate) fn engine(&self) -> &Profile {
        &self.inner
    }
}

impl fmt::Debug for ColorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorProfile")
            .field("role", &self.role)
            .field("origin", &self.origin)
            .field("color_space", &self.color_space())
            .finish()
    }
}

impl Drop for ColorProfile {
    fn drop(&mut self) {
        tracing::trace!(role = %self.role, origin = %self.origin, "Releasing profile");
    }
}

/// Read and parse an ICC profile file.
///
/// The file is only read; a missing file, an I/O error or bytes the engine
/// rejects all surface as [`Error::ProfileLoad`] tagged with `role`.
pub fn load_profile(path: impl AsRef<Path>, role: ProfileRole) -> Result<ColorProfile> {
    let path = path.as_ref();
    let load_error = |source: crate::error::BoxError| Error::ProfileLoad {
        role,
        path: path.to_path_buf(),
        source,
    };

    let bytes = fs::read(path).map_err(|e| load_error(Box::new(e)))?;
    let inner = Profile::new_icc(&bytes).map_err(|e| load_error(Box::new(e)))?;

    tracing::debug!(
        %role,
        path = %path.display(),
        color_space = ?inner.color_space(),
        version = inner.version(),
        "Loaded profile"
    );

    Ok(ColorProfile::from_engine(
        inner,
        role,
        ProfileSource::File(path.to_path_buf()),
    ))
}
