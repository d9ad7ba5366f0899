// ============================================================================
// PixelReel CLI: headless project inspection and frame export
// ============================================================================
//
// Usage examples:
//   pixelreel --input walk.pxr --output-dir frames/
//   pixelreel -i walk.pxr --frame 2 --output third.png
//   pixelreel -i "anims/*.pxr" --info
//   pixelreel --new 32x32 --output blank.pxr

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::io::{self, FormatError};
use crate::reel::AnimationReel;
use crate::settings::{self, EngineSettings};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PixelReel headless frame exporter.
#[derive(Parser, Debug)]
#[command(
    name = "pixelreel",
    version,
    about = "PixelReel headless animation exporter",
    long_about = "Inspect PixelReel project files and flatten their frames to PNG\n\
                  without opening an editor.\n\n\
                  Example:\n  \
                  pixelreel --input walk.pxr --output-dir frames/\n  \
                  pixelreel --new 32x32 --output blank.pxr"
)]
pub struct CliArgs {
    /// Project file(s). Glob patterns accepted (e.g. "anims/*.pxr").
    #[arg(short, long, num_args = 1.., required_unless_present = "new")]
    pub input: Vec<String>,

    /// Output file. A PNG for a single exported frame, or the project path
    /// for `--new`.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory for exported frames, written as `<stem>_<index>.png`.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Export only this frame (0-based). All frames when omitted.
    #[arg(short, long, value_name = "INDEX")]
    pub frame: Option<usize>,

    /// Create a blank project of the given size instead of reading input.
    #[arg(long, value_name = "WxH", conflicts_with = "input")]
    pub new: Option<String>,

    /// Print frame and layer information instead of exporting.
    #[arg(long)]
    pub info: bool,

    /// Settings file. Defaults to `settings.cfg` in the data directory.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug-level logging and per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("PNG export failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame {index} is out of range (project has {count})")]
    FrameOutOfRange { index: usize, count: usize },
    #[error("invalid size '{0}', expected WxH")]
    InvalidSize(String),
    #[error("{0}")]
    Usage(String),
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = every file succeeded, `1` = one or more failed.
pub fn run(args: &CliArgs, settings: &EngineSettings) -> ExitCode {
    if let Some(size) = &args.new {
        return match create_project(size, args.output.as_deref(), settings) {
            Ok(path) => {
                println!("created {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }
    if inputs.len() > 1 && args.output.is_some() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir for batch export.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let mut any_failure = false;
    for (idx, input) in inputs.iter().enumerate() {
        if total > 1 || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input.display());
        }
        let start = Instant::now();
        match run_one(input, args) {
            Ok(written) => {
                for path in &written {
                    println!("  -> {}", path.display());
                }
                if args.verbose {
                    println!("  ({:.0}ms)", start.elapsed().as_secs_f64() * 1000.0);
                }
            }
            Err(e) => {
                warn!(input = %input.display(), error = %e, "processing failed");
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing
// ============================================================================

fn run_one(input: &Path, args: &CliArgs) -> Result<Vec<PathBuf>, CliError> {
    let reel = io::load_project(input)?;
    if args.info {
        print!("{}", describe(&reel));
        return Ok(Vec::new());
    }
    export_frames(&reel, input, args.frame, args.output.as_deref(), args.output_dir.as_deref())
}

/// Human-readable summary of a reel.
pub fn describe(reel: &AnimationReel) -> String {
    let first = reel.current_frame();
    let size = first.size();
    let mut out = format!(
        "  {}x{}, {} frame(s), {} ms/frame, loop {}\n",
        size.width,
        size.height,
        reel.frame_count(),
        reel.frame_time_ms,
        if reel.loop_playback { "on" } else { "off" }
    );
    for (i, frame) in reel.frames().iter().enumerate() {
        out.push_str(&format!("  frame {}: {} layer(s)\n", i, frame.layer_count()));
        for layer in frame.layers() {
            out.push_str(&format!(
                "    {:<20} opacity {:>3}%{}\n",
                layer.name,
                (layer.opacity * 100.0).round() as i32,
                if layer.visible { "" } else { " (hidden)" }
            ));
        }
    }
    out
}

/// Flatten frames to PNG. Returns the written paths in frame order.
pub fn export_frames(
    reel: &AnimationReel,
    input: &Path,
    only: Option<usize>,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> Result<Vec<PathBuf>, CliError> {
    let count = reel.frame_count();
    let indices: Vec<usize> = match only {
        Some(index) if index >= count => return Err(CliError::FrameOutOfRange { index, count }),
        Some(index) => vec![index],
        None => (0..count).collect(),
    };
    if output.is_some() && indices.len() > 1 {
        return Err(CliError::Usage(format!(
            "--output names one file but the project has {} frames; use --frame or --output-dir",
            count
        )));
    }

    let mut written = Vec::with_capacity(indices.len());
    for index in indices {
        let Some(frame) = reel.frame(index) else {
            continue;
        };
        let path = match output {
            Some(out) => out.to_path_buf(),
            None => frame_output_path(input, output_dir, index),
        };
        frame.flatten_image().to_rgba_image().save(&path)?;
        debug!(frame = index, path = %path.display(), "frame exported");
        written.push(path);
    }
    info!(input = %input.display(), frames = written.len(), "export complete");
    Ok(written)
}

/// Write a blank project of `size` (`WxH`) to `output`.
pub fn create_project(size: &str, output: Option<&Path>, settings: &EngineSettings) -> Result<PathBuf, CliError> {
    let size = settings::parse_size(size).ok_or_else(|| CliError::InvalidSize(size.to_string()))?;
    let path = output
        .map(Path::to_path_buf)
        .ok_or_else(|| CliError::Usage("--new needs --output".to_string()))?;
    let reel = AnimationReel::new(size, settings.frame_time_ms, settings.loop_playback);
    io::save_project(&reel, &path)?;
    Ok(path)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// `<dir or input dir>/<stem>_<index>.png`, index zero-padded to three digits.
fn frame_output_path(input: &Path, output_dir: Option<&Path>, index: usize) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    dir.join(format!("{}_{:03}.png", stem, index))
}
