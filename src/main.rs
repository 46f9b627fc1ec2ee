/*!
===============================================================================
sepcon: ICC-managed RGB -> CMYK separation (command line)
-------------------------------------------------------------------------------
Converts RGB swatches or RGB images (PNG/JPEG/TIFF) into 16-bit CMYK using
LittleCMS 2 via the safe `lcms2` Rust crate, writing CMYK TIFFs with the
destination ICC profile embedded.

License: GPL-3.0-or-later
===============================================================================
*/

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use walkdir::WalkDir;

use sepcon::pipeline::ChannelStats;
use sepcon::{
    Cmyk16, ColorProfile, ProfileRole, ProfileSource, RGB16, RenderIntent, RgbToCmykConverter,
    TiffOptions, TransformOptions, convert_image_file, promote_8_to_16,
};

#[derive(Parser, Debug)]
#[command(
    name = "sepcon",
    version,
    about = "ICC-managed RGB -> CMYK separation (16-bit) using LittleCMS2 (lcms2 crate)."
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert RGB triplets and print the resulting CMYK values.
    Swatch(SwatchArgs),
    /// Convert an image, or a directory of images, into CMYK TIFFs.
    Image(ImageArgs),
    /// Print what the engine reports about ICC profiles.
    Info(InfoArgs),
}

#[derive(Args, Debug)]
struct TransformArgs {
    /// Source RGB ICC profile. Default: built-in sRGB.
    #[arg(long)]
    source_icc: Option<PathBuf>,

    /// Destination CMYK ICC profile.
    #[arg(long)]
    dest_icc: PathBuf,

    /// Rendering intent (ICC transform).
    #[arg(long, value_enum, default_value_t = RenderIntent::Perceptual)]
    intent: RenderIntent,

    /// Disable Black Point Compensation (BPC).
    #[arg(long, default_value_t = false)]
    no_bpc: bool,

    /// Disable high-resolution precalculation.
    #[arg(long, default_value_t = false)]
    no_high_res: bool,
}

impl TransformArgs {
    fn options(&self) -> TransformOptions {
        TransformOptions {
            intent: self.intent,
            black_point_compensation: !self.no_bpc,
            high_res_precalc: !self.no_high_res,
        }
    }

    fn source(&self) -> ProfileSource {
        match &self.source_icc {
            Some(p) => ProfileSource::File(p.clone()),
            None => ProfileSource::Srgb,
        }
    }

    fn open_converter(&self) -> Result<RgbToCmykConverter> {
        let converter =
            RgbToCmykConverter::open(self.source(), &self.dest_icc, &self.options())
                .context("Initialize RGB -> CMYK converter")?;
        Ok(converter)
    }
}

#[derive(Args, Debug)]
struct SwatchArgs {
    #[command(flatten)]
    transform: TransformArgs,

    /// RGB colors as `r,g,b` in 16-bit units (0-65535).
    /// Default: black, red, green, blue.
    #[arg(value_name = "R,G,B", value_parser = parse_rgb16)]
    colors: Vec<RGB16>,

    /// Interpret the values as 8-bit (0-255) and promote them to 16-bit.
    /// Requires explicit colors.
    #[arg(long, default_value_t = false, requires = "colors")]
    eight_bit: bool,
}

#[derive(Args, Debug)]
struct ImageArgs {
    #[command(flatten)]
    transform: TransformArgs,

    /// Input image (PNG/JPEG/TIFF) or directory of images.
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Output TIFF path. If INPUT is a directory, this must be an output directory path.
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// If INPUT is a directory, also scan its subdirectories.
    #[arg(short = 'r', long, default_value_t = false)]
    recursive: bool,

    /// When INPUT is a directory, append this suffix to each output filename stem.
    #[arg(long, default_value = "_cmyk")]
    suffix: String,

    /// Overwrite existing output files.
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Parallel jobs (0 = auto).
    #[arg(long, default_value_t = 0)]
    jobs: usize,

    /// Resolution written into the TIFF, in dpi.
    #[arg(long, default_value_t = TiffOptions::default().dpi)]
    dpi: u32,

    /// Print per-channel min/max/mean of each converted image.
    #[arg(long, default_value_t = false)]
    print_stats: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// ICC profile files.
    #[arg(required = true)]
    profiles: Vec<PathBuf>,
}

fn parse_rgb16(s: &str) -> std::result::Result<RGB16, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u16>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid channel value in {s:?}: {e}"))?;
    match parts.as_slice() {
        &[r, g, b] => Ok(RGB16::new(r, g, b)),
        _ => Err(format!("expected three comma-separated values, got {s:?}")),
    }
}

const REFERENCE_SWATCHES: [RGB16; 4] = [
    RGB16 { r: 0, g: 0, b: 0 },
    RGB16 { r: 65535, g: 0, b: 0 },
    RGB16 { r: 0, g: 65535, b: 0 },
    RGB16 { r: 0, g: 0, b: 65535 },
];

fn run_swatch(args: SwatchArgs) -> Result<()> {
    let converter = args.transform.open_converter()?;

    let colors: Vec<RGB16> = if args.colors.is_empty() {
        REFERENCE_SWATCHES.to_vec()
    } else if args.eight_bit {
        args.colors
            .iter()
            .map(|c| {
                let eight = |v: u16| {
                    u8::try_from(v)
                        .map(promote_8_to_16)
                        .map_err(|_| anyhow!("8-bit value out of range: {},{},{}", c.r, c.g, c.b))
                };
                Ok(RGB16::new(eight(c.r)?, eight(c.g)?, eight(c.b)?))
            })
            .collect::<Result<_>>()?
    } else {
        args.colors
    };

    let mut cmyk = vec![Cmyk16::default(); colors.len()];
    converter
        .convert_pixels(&colors, &mut cmyk)
        .context("Convert swatches")?;

    println!("Conversion successful ({} colors)", colors.len());
    for (rgb, out) in colors.iter().zip(&cmyk) {
        let [c, m, y, k] = out.percentages();
        println!(
            "RGB16 ({:>5}, {:>5}, {:>5}) -> CMYK16 ({:>5}, {:>5}, {:>5}, {:>5})  [{c:6.2}%, {m:6.2}%, {y:6.2}%, {k:6.2}%]",
            rgb.r, rgb.g, rgb.b, out.c, out.m, out.y, out.k
        );
    }
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let mut failed = 0usize;
    for path in &args.profiles {
        // Role only labels errors here; any color space is reported.
        match sepcon::load_profile(path, ProfileRole::Source) {
            Ok(profile) => print_profile(path, &profile),
            Err(e) => {
                tracing::error!("{e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} profiles could not be loaded", args.profiles.len());
    }
    Ok(())
}

fn print_profile(path: &Path, profile: &ColorProfile) {
    println!("{}", path.display());
    println!(
        "  description: {}",
        profile.description().as_deref().unwrap_or("(none)")
    );
    println!("  version:     {:.2}", profile.version());
    println!("  class:       {:?}", profile.device_class());
    println!("  color space: {:?}", profile.color_space());
    match profile.icc_bytes() {
        Ok(b) => println!("  serialized:  {} bytes", b.len()),
        Err(e) => println!("  serialized:  failed ({e})"),
    }
}

// ---------------- Image conversion ----------------

fn is_supported_image_ext(p: &Path) -> bool {
    match p
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) => matches!(ext.as_str(), "tif" | "tiff" | "png" | "jpg" | "jpeg"),
        None => false,
    }
}

fn collect_input_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if recursive {
        for e in WalkDir::new(root).follow_links(false) {
            let e = e?;
            if e.file_type().is_file() && is_supported_image_ext(e.path()) {
                files.push(e.path().to_path_buf());
            }
        }
    } else {
        for e in std::fs::read_dir(root)? {
            let p = e?.path();
            if p.is_file() && is_supported_image_ext(&p) {
                files.push(p);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn output_path_for(in_dir: &Path, out_dir: &Path, input: &Path, suffix: &str) -> Result<PathBuf> {
    let rel = input
        .strip_prefix(in_dir)
        .map_err(|_| anyhow!("Failed to compute relative path for {}", input.display()))?;
    let rel_parent = rel.parent().unwrap_or(Path::new(""));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Invalid file name: {}", input.display()))?;
    Ok(out_dir.join(rel_parent).join(format!("{stem}{suffix}.tif")))
}

fn print_stats(path: &Path, stats: &[ChannelStats; 4]) {
    println!("{}", path.display());
    for (name, s) in ["Cyan", "Magenta", "Yellow", "Key (Black)"].iter().zip(stats) {
        println!(
            "  {name:<12} min {:>5} ({:6.2}%)  max {:>5} ({:6.2}%)  mean {:>9.2} ({:6.2}%)",
            s.min,
            f64::from(s.min) * 100.0 / 65535.0,
            s.max,
            f64::from(s.max) * 100.0 / 65535.0,
            s.mean,
            s.mean * 100.0 / 65535.0
        );
    }
}

fn convert_one(args: &ImageArgs, input: &Path, output: &Path) -> Result<()> {
    // One converter per file keeps workers independent of each other.
    let converter = args.transform.open_converter()?;
    let tiff_opts = TiffOptions {
        dpi: args.dpi,
        ..TiffOptions::default()
    };

    let report = convert_image_file(&converter, input, output, &tiff_opts)
        .with_context(|| format!("Convert {} -> {}", input.display(), output.display()))?;

    tracing::debug!(
        input = %input.display(),
        width = report.width,
        height = report.height,
        "Converted"
    );
    if args.print_stats {
        print_stats(output, &report.stats);
    }
    Ok(())
}

fn process_batch_conversion(args: &ImageArgs, inputs: Vec<PathBuf>) -> Result<()> {
    let in_dir = &args.input;
    let out_dir = &args.output;

    let process_single = |input_path: &Path| -> Result<()> {
        let out_path = output_path_for(in_dir, out_dir, input_path, &args.suffix)?;
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        if out_path.exists() && !args.overwrite {
            tracing::warn!("Skipping existing: {}", out_path.display());
            return Ok(());
        }

        convert_one(args, input_path, &out_path)
    };

    let results: Vec<Result<()>> = inputs.par_iter().map(|p| process_single(p)).collect();

    // Aggregate errors (if any)
    let mut ok = 0usize;
    let mut errs = Vec::new();
    for r in results {
        match r {
            Ok(()) => ok += 1,
            Err(e) => errs.push(e),
        }
    }

    if !errs.is_empty() {
        tracing::error!("Completed with errors: ok={ok}, errors={}", errs.len());
        for e in errs.iter().take(20) {
            tracing::error!("  - {e:#}");
        }
        if errs.len() > 20 {
            tracing::error!("  ... and {} more errors", errs.len() - 20);
        }
        bail!("Batch conversion failed with {} errors.", errs.len());
    }

    tracing::info!("Batch conversion successful: {ok} files processed.");
    Ok(())
}

fn run_image(args: ImageArgs) -> Result<()> {
    let mut pool = rayon::ThreadPoolBuilder::new();
    if args.jobs > 0 {
        pool = pool.num_threads(args.jobs);
    }
    let pool = pool.build().context("Failed to create thread pool")?;

    pool.install(|| {
        if args.input.is_dir() {
            if args.output.exists() && !args.output.is_dir() {
                bail!(
                    "OUTPUT must be a directory when INPUT is a directory: {}",
                    args.output.display()
                );
            }
            std::fs::create_dir_all(&args.output).with_context(|| {
                format!("Failed to create output directory {}", args.output.display())
            })?;

            let inputs = collect_input_files(&args.input, args.recursive)?;
            if inputs.is_empty() {
                bail!("No supported images found in {}", args.input.display());
            }
            tracing::info!("Found {} files to process", inputs.len());

            process_batch_conversion(&args, inputs)
        } else {
            if args.output.is_dir() {
                bail!(
                    "OUTPUT must be a file when INPUT is a file: {}",
                    args.output.display()
                );
            }
            if args.output.exists() && !args.overwrite {
                bail!(
                    "Output file already exists: {}. Use --overwrite to replace.",
                    args.output.display()
                );
            }

            convert_one(&args, &args.input, &args.output)?;
            println!("Conversion successful, written to {}", args.output.display());
            Ok(())
        }
    })
}

fn init_logging(cli: &Cli) {
    if cli.quiet {
        tracing_subscriber::fmt()
            .with_max_level(tracing::level_filters::LevelFilter::ERROR)
            .with_writer(std::io::stderr)
            .init();
        return;
    }

    let filter = match cli.verbose {
        0 => tracing::level_filters::LevelFilter::INFO,
        1 => tracing::level_filters::LevelFilter::DEBUG,
        2.. => tracing::level_filters::LevelFilter::TRACE,
    };
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(filter.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Command::Swatch(args) => run_swatch(args),
        Command::Image(args) => run_image(args),
        Command::Info(args) => run_info(args),
    };

    if let Err(e) = result {
        tracing::error!("{e:#}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rgb_triplets() {
        assert_eq!(parse_rgb16("1,2,3").unwrap(), RGB16::new(1, 2, 3));
        assert_eq!(parse_rgb16(" 65535, 0 ,0").unwrap(), RGB16::new(65535, 0, 0));
        assert!(parse_rgb16("1,2").is_err());
        assert!(parse_rgb16("1,2,70000").is_err());
    }

    #[test]
    fn batch_output_mirrors_input_tree() {
        let out = output_path_for(
            Path::new("/in"),
            Path::new("/out"),
            Path::new("/in/a/b/photo.JPG"),
            "_cmyk",
        )
        .unwrap();
        assert_eq!(out, PathBuf::from("/out/a/b/photo_cmyk.tif"));
        assert!(output_path_for(Path::new("/in"), Path::new("/out"), Path::new("/x.png"), "").is_err());
    }

    #[test]
    fn supported_extensions() {
        assert!(is_supported_image_ext(Path::new("a.PNG")));
        assert!(is_supported_image_ext(Path::new("a.tiff")));
        assert!(!is_supported_image_ext(Path::new("a.icc")));
        assert!(!is_supported_image_ext(Path::new("noext")));
    }

    #[test]
    fn cli_defaults_follow_flagged_contract() {
        let cli = Cli::try_parse_from(["sepcon", "swatch", "--dest-icc", "out.icc"]).unwrap();
        match cli.command {
            Command::Swatch(a) => {
                assert_eq!(a.transform.options(), TransformOptions::default());
                assert_eq!(a.transform.source(), ProfileSource::Srgb);
                assert!(a.colors.is_empty());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn eight_bit_needs_explicit_colors() {
        let err = Cli::try_parse_from(["sepcon", "swatch", "--dest-icc", "o.icc", "--eight-bit"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from([
            "sepcon", "swatch", "--dest-icc", "o.icc", "--eight-bit", "255,0,128",
        ])
        .unwrap();
        match cli.command {
            Command::Swatch(a) => {
                assert!(a.eight_bit);
                assert_eq!(a.colors, vec![RGB16::new(255, 0, 128)]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
