/*!
===============================================================================
sepcon: ICC-managed RGB -> CMYK separation
-------------------------------------------------------------------------------
16-bit RGB to 16-bit CMYK conversion through LittleCMS 2 (safe `lcms2`
crate), with LZW-compressed CMYK TIFF output carrying the destination profile.

License: GPL-3.0-or-later
===============================================================================

```no_run
use sepcon::{RgbToCmykConverter, TransformOptions};

let converter = RgbToCmykConverter::open(
    "profiles/sRGB.icc",
    "profiles/output_CMYK.icc",
    &TransformOptions::default(),
)?;

let rgb: [u16; 6] = [0, 0, 0, 65535, 0, 0];
let mut cmyk = [0u16; 8];
converter.convert(&rgb, &mut cmyk, 2)?;
# Ok::<(), sepcon::Error>(())
```
*/

pub mod converter;
pub mod error;
pub mod image_input;
pub mod pipeline;
pub mod profile;
pub mod tiff_writer;
pub mod transform;

pub use converter::{ConverterState, RgbToCmykConverter};
pub use error::{Error, Result};
pub use pipeline::{ImageReport, convert_image_file};
pub use profile::{ColorProfile, ProfileRole, ProfileSource, live_handle_count, load_profile};
pub use tiff_writer::{TiffOptions, write_cmyk_tiff};
pub use transform::{
    Cmyk16, ColorTransform, RenderIntent, TransformOptions, build_transform, promote_8_to_16,
    promote_rgb8,
};

pub use rgb::RGB16;
